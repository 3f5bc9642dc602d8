//! Gateway-facing IPC server
//!
//! Each connected gateway gets a reader task that forwards its requests to
//! the service loop, and a writer task that interleaves responses with
//! notification events once the gateway has subscribed.

use boardkeeper_api::{Command, Event, EventPayload, Notification, Request, Response};
use boardkeeper_util::{ClientId, UserId};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::frame::{encode, read_frame};
use crate::{IpcError, IpcResult};

/// Pending notifications per gateway before the slowest one starts missing them
const EVENT_BACKLOG: usize = 256;

/// Message from a gateway connection to the service loop
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        uid: Option<u32>,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

type Gateways = Arc<RwLock<HashMap<ClientId, GatewayHandle>>>;

struct GatewayHandle {
    outbox: mpsc::UnboundedSender<String>,
    subscribed: Arc<AtomicBool>,
}

/// Only root and the service's own user may talk to the service
pub fn is_peer_allowed(uid: Option<u32>, service_uid: u32) -> bool {
    matches!(uid, Some(u) if u == 0 || u == service_uid)
}

/// IPC server for chat gateways
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    gateways: Gateways,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl IpcServer {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BACKLOG);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            gateways: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
        }
    }

    /// Bind the socket, replacing a stale one left by a previous run
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o660))?;

        info!(path = %self.socket_path.display(), "IPC server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// The service loop's end of the request channel; only the first caller gets it
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept gateways until the task is dropped
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IpcError::ServerError("Server not started".into()))?;
        let service_uid = nix::unistd::getuid().as_raw();

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let uid = peer_uid(&stream);
            if !is_peer_allowed(uid, service_uid) {
                warn!(uid = ?uid, "Rejected connection from unauthorized peer");
                continue;
            }

            self.attach(stream, uid).await;
        }
    }

    async fn attach(&self, stream: UnixStream, uid: Option<u32>) {
        let client_id = ClientId::new();
        let (read_half, write_half) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let subscribed = Arc::new(AtomicBool::new(false));

        self.gateways.write().await.insert(
            client_id.clone(),
            GatewayHandle {
                outbox,
                subscribed: subscribed.clone(),
            },
        );

        let _ = self.message_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            uid,
        });

        tokio::spawn(read_requests(
            read_half,
            client_id.clone(),
            subscribed.clone(),
            self.message_tx.clone(),
        ));

        tokio::spawn(write_outgoing(
            write_half,
            client_id,
            subscribed,
            outbox_rx,
            self.event_tx.subscribe(),
            self.gateways.clone(),
            self.message_tx.clone(),
        ));
    }

    /// Queue a response for one gateway
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let line = encode(&response)?;

        let gateways = self.gateways.read().await;
        let handle = gateways.get(client_id).ok_or(IpcError::ConnectionClosed)?;
        handle.outbox.send(line).map_err(|_| IpcError::ConnectionClosed)
    }

    /// Hand a notification to every subscribed gateway; the gateway routes it
    /// to `recipient`'s chat. Fails when no gateway is listening.
    pub async fn deliver_notification(
        &self,
        recipient: UserId,
        notification: Notification,
    ) -> IpcResult<usize> {
        let listeners = self.subscriber_count().await;
        if listeners == 0 {
            return Err(IpcError::NoSubscribers);
        }

        let _ = self.event_tx.send(Event::new(EventPayload::Notification {
            recipient,
            notification,
        }));
        Ok(listeners)
    }

    /// Tell subscribed gateways the service is going away
    pub fn announce_shutdown(&self) {
        let _ = self.event_tx.send(Event::new(EventPayload::Shutdown));
    }

    /// Gateways that have subscribed to notifications
    pub async fn subscriber_count(&self) -> usize {
        self.gateways
            .read()
            .await
            .values()
            .filter(|g| g.subscribed.load(Ordering::Acquire))
            .count()
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_requests(
    read_half: OwnedReadHalf,
    client_id: ClientId,
    subscribed: Arc<AtomicBool>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();

    loop {
        let request: Request = match read_frame(&mut reader, &mut buf).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(client_id = %client_id, "Gateway closed the connection");
                break;
            }
            Err(IpcError::Json(e)) => {
                warn!(client_id = %client_id, error = %e, "Invalid request");
                continue;
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        };

        // Set before the service answers so no notification slips past
        if matches!(request.command, Command::SubscribeEvents) {
            subscribed.store(true, Ordering::Release);
        }

        if message_tx
            .send(ServerMessage::Request {
                client_id: client_id.clone(),
                request,
            })
            .is_err()
        {
            break;
        }
    }
}

async fn write_outgoing(
    mut writer: OwnedWriteHalf,
    client_id: ClientId,
    subscribed: Arc<AtomicBool>,
    mut outbox: mpsc::UnboundedReceiver<String>,
    mut events: broadcast::Receiver<Event>,
    gateways: Gateways,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        let line = tokio::select! {
            response = outbox.recv() => match response {
                Some(line) => line,
                None => break,
            },

            event = events.recv() => match event {
                Ok(event) if subscribed.load(Ordering::Acquire) => match encode(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(client_id = %client_id, error = %e, "Failed to encode event");
                        continue;
                    }
                },
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(client_id = %client_id, missed, "Gateway fell behind, notifications dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(client_id = %client_id, error = %e, "Write error");
            break;
        }
    }

    gateways.write().await.remove(&client_id);
    let _ = message_tx.send(ServerMessage::ClientDisconnected { client_id });
}

fn peer_uid(stream: &UnixStream) -> Option<u32> {
    use std::os::unix::io::AsFd;

    nix::sys::socket::getsockopt(&stream.as_fd(), nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayClient, GatewayEvent};
    use boardkeeper_api::{Caller, ChatInput, Reply, ResponsePayload};
    use boardkeeper_util::BoardId;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn peer_admission() {
        assert!(is_peer_allowed(Some(0), 1000));
        assert!(is_peer_allowed(Some(1000), 1000));
        assert!(!is_peer_allowed(Some(1001), 1000));
        assert!(!is_peer_allowed(None, 1000));
    }

    #[tokio::test]
    async fn test_server_start() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();

        assert!(socket_path.exists());
        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o660);
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_notification_without_gateway_fails() {
        let server = IpcServer::new("/nonexistent/boardkeeper.sock");
        let result = server
            .deliver_notification(
                UserId::new(1),
                Notification::Completed {
                    board_id: BoardId::new("1"),
                    board_name: "Alpha".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(IpcError::NoSubscribers)));
    }

    /// Starts a server whose service loop answers every chat with the board menu
    async fn serve(socket_path: &Path) -> Arc<IpcServer> {
        let mut server = IpcServer::new(socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut messages = server.take_message_receiver().await.unwrap();

        let accept = server.clone();
        tokio::spawn(async move { accept.run().await });

        let responder = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                let ServerMessage::Request { client_id, request } = msg else {
                    continue;
                };
                let payload = match request.command {
                    Command::SubscribeEvents => ResponsePayload::Subscribed {
                        client_id: client_id.clone(),
                    },
                    Command::Chat { .. } | Command::ChatText { .. } => {
                        ResponsePayload::Reply(Reply::NotAuthorized)
                    }
                    _ => ResponsePayload::Pong,
                };
                let response = Response::success(request.request_id, payload);
                responder.send_response(&client_id, response).await.unwrap();
            }
        });

        server
    }

    #[tokio::test]
    async fn test_gateway_chat_and_notifications() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = serve(&socket_path).await;

        let mut gateway = GatewayClient::connect(&socket_path).await.unwrap();
        gateway.ping().await.unwrap();

        let caller = Caller::new(UserId::new(5), "Mallory");
        assert_eq!(gateway.chat(&caller, ChatInput::Rent).await.unwrap(), Reply::NotAuthorized);
        assert_eq!(gateway.chat_text(&caller, "/rent").await.unwrap(), Reply::NotAuthorized);

        let mut notifications = GatewayClient::connect(&socket_path)
            .await
            .unwrap()
            .subscribe()
            .await
            .unwrap();

        // Only the subscribed connection counts
        assert_eq!(server.subscriber_count().await, 1);

        let listeners = server
            .deliver_notification(
                UserId::new(111),
                Notification::Completed {
                    board_id: BoardId::new("2"),
                    board_name: "Bravo".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(listeners, 1);

        match notifications.next().await.unwrap() {
            GatewayEvent::Notify {
                recipient,
                notification,
            } => {
                assert_eq!(recipient, UserId::new(111));
                assert_eq!(notification.board_id(), &BoardId::new("2"));
            }
            other => panic!("Expected a notification, got {:?}", other),
        }

        server.announce_shutdown();
        assert!(matches!(notifications.next().await.unwrap(), GatewayEvent::Shutdown));

        // The plain chat connection never sees events
        let pong = tokio::time::timeout(Duration::from_secs(1), gateway.ping()).await;
        assert!(matches!(pong, Ok(Ok(()))));
    }
}
