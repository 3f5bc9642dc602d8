//! Command types for the boardkeeper protocol

use boardkeeper_util::{BoardId, ClientId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Caller, HealthStatus, Reply, API_VERSION};

/// Main-menu button labels a gateway may forward verbatim as text
pub const RENT_BUTTON: &str = "Rent a board";
pub const FORCE_END_BUTTON: &str = "Force end rental";
pub const STATUS_BUTTON: &str = "Status";
pub const HELP_BUTTON: &str = "Help";

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Protocol-level error codes. Domain outcomes (bad duration, unknown
/// board, ...) are replies, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnsupportedVersion,
}

/// All possible commands from gateways
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// An already-typed chat interaction
    Chat { caller: Caller, input: ChatInput },

    /// Raw chat text; the service parses it with [`ChatInput::parse`]
    ChatText { caller: Caller, text: String },

    /// Subscribe to events (notifications for administrators)
    SubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Reply(Reply),
    Subscribed { client_id: ClientId },
    Health(HealthStatus),
    Pong,
}

/// Validated chat interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatInput {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/rent`: begin the booking dialogue
    Rent,
    /// `/status`: list active rentals
    Status,
    /// `/end [board_id]`: force-end a rental, prompting for the id if absent
    End { board_id: Option<BoardId> },
    /// `/export`: link to the mirror
    Export,
    /// `/history [board=ID] [admin=ID]`
    History(HistoryFilter),
    /// Board picked from the catalog menu
    SelectBoard { board_id: BoardId },
    /// Confirmation button
    Confirm,
    /// Cancellation button
    Cancel,
    /// Any other text (durations, board ids typed by hand)
    Text { text: String },
}

/// Errors raised while turning raw chat text into a [`ChatInput`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("admin filter must be a numeric user id, got '{0}'")]
    InvalidAdminFilter(String),
}

impl ChatInput {
    /// Parse raw chat text.
    ///
    /// Slash commands may carry a `@botname` suffix. Main-menu button labels
    /// map to their commands. Anything unrecognized becomes [`ChatInput::Text`].
    pub fn parse(text: &str) -> Result<Self, InputError> {
        let trimmed = text.trim();

        match trimmed {
            RENT_BUTTON => return Ok(ChatInput::Rent),
            FORCE_END_BUTTON => return Ok(ChatInput::End { board_id: None }),
            STATUS_BUTTON => return Ok(ChatInput::Status),
            HELP_BUTTON => return Ok(ChatInput::Help),
            _ => {}
        }

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(ChatInput::Text {
                text: trimmed.to_string(),
            });
        };

        let mut tokens = rest.split_whitespace();
        let head = tokens.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default();

        let input = match name {
            "start" => ChatInput::Start,
            "help" => ChatInput::Help,
            "rent" => ChatInput::Rent,
            "status" => ChatInput::Status,
            "export" => ChatInput::Export,
            "end" => ChatInput::End {
                board_id: tokens.next().map(BoardId::from),
            },
            "history" => ChatInput::History(HistoryFilter::parse(tokens)?),
            _ => ChatInput::Text {
                text: trimmed.to_string(),
            },
        };

        Ok(input)
    }
}

/// Filters for `/history`. Both are exact-match and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub board: Option<BoardId>,
    pub admin: Option<UserId>,
}

impl HistoryFilter {
    /// Parse `key=value` tokens. Unknown keys, tokens without `=` and empty
    /// values are ignored.
    pub fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, InputError> {
        let mut filter = HistoryFilter::default();

        for token in tokens {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            match key {
                "board" => filter.board = Some(BoardId::new(value)),
                "admin" => {
                    let admin = value
                        .parse::<UserId>()
                        .map_err(|_| InputError::InvalidAdminFilter(value.to_string()))?;
                    filter.admin = Some(admin);
                }
                _ => {}
            }
        }

        Ok(filter)
    }
}
