//! Webhook-backed mirror
//!
//! Rows are POSTed as JSON to an endpoint that owns the spreadsheet
//! credentials (for example an Apps Script web app).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::{Mirror, MirrorError, MirrorResult, MirrorRow, HEADER};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for [`WebhookMirror`]
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub spreadsheet_id: String,
    /// Viewing URL with the sheet id already substituted
    pub view_url: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum WebhookRequest<'a> {
    EnsureHeader {
        spreadsheet_id: &'a str,
        values: &'a [&'a str],
    },
    AppendRow {
        spreadsheet_id: &'a str,
        values: &'a [&'a str],
    },
}

/// Mirror that appends rows through an HTTP webhook
#[derive(Debug, Clone)]
pub struct WebhookMirror {
    config: WebhookConfig,
    http: Client,
}

impl WebhookMirror {
    pub fn new(config: WebhookConfig) -> MirrorResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, http })
    }

    async fn post(&self, body: &WebhookRequest<'_>) -> MirrorResult<()> {
        let mut request = self.http.post(&self.config.endpoint).json(body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MirrorError::Rejected(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl Mirror for WebhookMirror {
    async fn ensure_header(&self) -> MirrorResult<()> {
        self.post(&WebhookRequest::EnsureHeader {
            spreadsheet_id: &self.config.spreadsheet_id,
            values: &HEADER,
        })
        .await?;
        debug!(endpoint = %self.config.endpoint, "Mirror header ensured");
        Ok(())
    }

    async fn append_row(&self, row: &MirrorRow) -> MirrorResult<()> {
        self.post(&WebhookRequest::AppendRow {
            spreadsheet_id: &self.config.spreadsheet_id,
            values: &row.cells(),
        })
        .await
    }

    fn view_url(&self) -> Option<String> {
        Some(self.config.view_url.clone())
    }
}
