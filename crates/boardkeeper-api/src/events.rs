//! Event types for service -> gateway streaming

use boardkeeper_util::UserId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{Notification, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: boardkeeper_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to gateways
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Deliver a notification to one administrator's chat
    Notification {
        recipient: UserId,
        notification: Notification,
    },

    /// Service is shutting down
    Shutdown,
}
