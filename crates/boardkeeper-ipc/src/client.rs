//! Gateway side of the protocol
//!
//! A chat gateway holds two connections: a [`GatewayClient`] for forwarding
//! what administrators type, and a [`NotificationStream`] (a subscribed
//! client) for the warnings and completions it must relay to their chats.

use boardkeeper_api::{
    Caller, ChatInput, Command, Event, EventPayload, HealthStatus, Notification, Reply, Request,
    Response, ResponsePayload, ResponseResult,
};
use boardkeeper_util::{ClientId, UserId};
use std::path::Path;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use crate::frame::{read_frame, write_frame};
use crate::{IpcError, IpcResult};

/// Request/response connection to boardkeeperd
pub struct GatewayClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    buf: String,
    next_request_id: u64,
}

impl GatewayClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let (read_half, write_half) = UnixStream::connect(socket_path).await?.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            buf: String::new(),
            next_request_id: 1,
        })
    }

    /// Forward an already-typed interaction and return the reply for the chat
    pub async fn chat(&mut self, caller: &Caller, input: ChatInput) -> IpcResult<Reply> {
        let payload = self
            .call(Command::Chat {
                caller: caller.clone(),
                input,
            })
            .await?;
        expect_reply(payload)
    }

    /// Forward raw message text; the service parses commands and button labels
    pub async fn chat_text(&mut self, caller: &Caller, text: impl Into<String>) -> IpcResult<Reply> {
        let payload = self
            .call(Command::ChatText {
                caller: caller.clone(),
                text: text.into(),
            })
            .await?;
        expect_reply(payload)
    }

    pub async fn health(&mut self) -> IpcResult<HealthStatus> {
        match self.call(Command::GetHealth).await? {
            ResponsePayload::Health(health) => Ok(health),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn ping(&mut self) -> IpcResult<()> {
        match self.call(Command::Ping).await? {
            ResponsePayload::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Turn this connection into a notification feed
    pub async fn subscribe(mut self) -> IpcResult<NotificationStream> {
        let client_id = match self.call(Command::SubscribeEvents).await? {
            ResponsePayload::Subscribed { client_id } => client_id,
            other => return Err(unexpected(&other)),
        };

        Ok(NotificationStream {
            reader: self.reader,
            buf: self.buf,
            client_id,
            _writer: self.writer,
        })
    }

    async fn call(&mut self, command: Command) -> IpcResult<ResponsePayload> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        write_frame(&mut self.writer, &Request::new(request_id, command)).await?;

        let response: Response = read_frame(&mut self.reader, &mut self.buf)
            .await?
            .ok_or(IpcError::ConnectionClosed)?;

        if response.request_id != request_id {
            return Err(IpcError::ServerError(format!(
                "Response {} does not match request {}",
                response.request_id, request_id
            )));
        }

        match response.result {
            ResponseResult::Ok(payload) => Ok(payload),
            ResponseResult::Err(e) => Err(IpcError::ServerError(e.message)),
        }
    }
}

fn expect_reply(payload: ResponsePayload) -> IpcResult<Reply> {
    match payload {
        ResponsePayload::Reply(reply) => Ok(reply),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(payload: &ResponsePayload) -> IpcError {
    IpcError::ServerError(format!("Unexpected response: {:?}", payload))
}

/// What a subscribed gateway has to act on
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Send `notification` to `recipient`'s chat
    Notify {
        recipient: UserId,
        notification: Notification,
    },
    /// The service is stopping; reconnect later
    Shutdown,
}

impl From<Event> for GatewayEvent {
    fn from(event: Event) -> Self {
        match event.payload {
            EventPayload::Notification {
                recipient,
                notification,
            } => GatewayEvent::Notify {
                recipient,
                notification,
            },
            EventPayload::Shutdown => GatewayEvent::Shutdown,
        }
    }
}

/// Subscribed connection yielding notifications addressed to administrators
pub struct NotificationStream {
    reader: BufReader<OwnedReadHalf>,
    buf: String,
    client_id: ClientId,
    // Dropping the write half would half-close the socket
    _writer: OwnedWriteHalf,
}

impl NotificationStream {
    /// Id the service assigned to this subscription
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Wait for the next event
    pub async fn next(&mut self) -> IpcResult<GatewayEvent> {
        let event: Event = read_frame(&mut self.reader, &mut self.buf)
            .await?
            .ok_or(IpcError::ConnectionClosed)?;
        Ok(event.into())
    }
}
