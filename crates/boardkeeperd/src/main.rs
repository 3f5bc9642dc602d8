//! boardkeeperd - The boardkeeper background service
//!
//! This is the main entry point for the boardkeeperd service.
//! It wires together all the components:
//! - Configuration loading
//! - Ledger initialization
//! - Spreadsheet mirror and its delivery queue
//! - Rental service (dialogue, registry, reminders, history)
//! - IPC server for chat gateways

use anyhow::{Context, Result};
use async_trait::async_trait;
use boardkeeper_api::{
    Command, ErrorCode, ErrorInfo, Notification, Response, ResponsePayload, API_VERSION,
};
use boardkeeper_config::load_config;
use boardkeeper_core::{Notifier, NotifyError, RentalService};
use boardkeeper_ipc::{IpcServer, ServerMessage};
use boardkeeper_mirror::{
    DisabledMirror, Mirror, MirrorQueue, MirrorWorker, RetryPolicy, WebhookConfig, WebhookMirror,
};
use boardkeeper_store::{Ledger, SqliteLedger};
use boardkeeper_util::{default_config_path, ClientId, UserId};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long queued mirror rows may take to flush at shutdown
const MIRROR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// boardkeeperd - Board rental controller
#[derive(Parser, Debug)]
#[command(name = "boardkeeperd")]
#[command(about = "Board rental controller for chat-operated rental desks", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/boardkeeper/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set BOARDKEEPER_SOCKET env var)
    #[arg(short, long, env = "BOARDKEEPER_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set BOARDKEEPER_DATA_DIR env var)
    #[arg(short, long, env = "BOARDKEEPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Delivers notifications to subscribed chat gateways
struct IpcNotifier {
    ipc: Arc<IpcServer>,
}

#[async_trait]
impl Notifier for IpcNotifier {
    async fn notify(&self, recipient: UserId, notification: Notification) -> Result<(), NotifyError> {
        let board_id = notification.board_id().clone();
        let gateways = self
            .ipc
            .deliver_notification(recipient, notification)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        debug!(recipient = %recipient, board_id = %board_id, gateways, "Notification handed to gateways");
        Ok(())
    }
}

/// Main service state
struct Service {
    rentals: RentalService,
    ipc: Arc<IpcServer>,
    mirror_worker: MirrorWorker,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            boards = policy.catalog.len(),
            admins = policy.admins.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("rentals.db");
        let ledger: Arc<dyn Ledger> = Arc::new(
            SqliteLedger::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Ledger initialized");

        let (mirror, retry): (Arc<dyn Mirror>, RetryPolicy) = match &policy.mirror {
            Some(settings) => {
                let webhook = WebhookMirror::new(WebhookConfig {
                    endpoint: settings.endpoint.clone(),
                    spreadsheet_id: settings.spreadsheet_id.clone(),
                    view_url: settings.view_url(),
                    auth_token: settings.auth_token.clone(),
                })
                .context("Failed to build mirror client")?;
                info!(endpoint = %settings.endpoint, "Spreadsheet mirror enabled");
                (
                    Arc::new(webhook),
                    RetryPolicy::new(settings.max_attempts, settings.initial_backoff),
                )
            }
            None => {
                warn!("No mirror configured, /export is unavailable");
                (Arc::new(DisabledMirror), RetryPolicy::default())
            }
        };

        if let Err(e) = mirror.ensure_header().await {
            warn!(error = %e, "Failed to prepare mirror header, continuing");
        }

        let (mirror_queue, mirror_worker) = MirrorQueue::spawn(mirror, retry);

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;
        let ipc = Arc::new(ipc);

        info!(socket_path = %socket_path.display(), "IPC server started");

        let notifier = Arc::new(IpcNotifier { ipc: ipc.clone() });
        let rentals = RentalService::new(policy, ledger, mirror_queue, notifier);

        Ok(Self {
            rentals,
            ipc,
            mirror_worker,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let rentals = Arc::new(Mutex::new(self.rentals));

        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&rentals, &ipc_ref, msg).await;
                }
            }
        }

        info!("Shutting down boardkeeperd");

        {
            let mut rentals = rentals.lock().await;
            let active = rentals.shutdown();
            if active > 0 {
                warn!(active, "Reminder timers cancelled for rentals still in progress");
            }
        }

        ipc_ref.announce_shutdown();

        // The queue closes once the service, its last sender, is gone
        drop(rentals);
        if tokio::time::timeout(MIRROR_DRAIN_TIMEOUT, self.mirror_worker.finish())
            .await
            .is_err()
        {
            warn!("Mirror queue did not drain in time, pending rows dropped");
        }

        ipc_ref.shutdown();
        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        rentals: &Arc<Mutex<RentalService>>,
        ipc: &Arc<IpcServer>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let response = if request.api_version != API_VERSION {
                    Response::error(
                        request.request_id,
                        ErrorInfo::new(
                            ErrorCode::UnsupportedVersion,
                            format!("Expected API version {}", API_VERSION),
                        ),
                    )
                } else {
                    Self::handle_command(rentals, &client_id, request.request_id, request.command).await
                };

                if let Err(e) = ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, uid } => {
                info!(client_id = %client_id, uid = ?uid, "Gateway connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Gateway disconnected");
            }
        }
    }

    async fn handle_command(
        rentals: &Arc<Mutex<RentalService>>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = boardkeeper_util::now();

        match command {
            Command::Chat { caller, input } => {
                let reply = rentals.lock().await.handle(&caller, input, now).await;
                Response::success(request_id, ResponsePayload::Reply(reply))
            }

            Command::ChatText { caller, text } => {
                let reply = rentals.lock().await.handle_text(&caller, &text, now).await;
                Response::success(request_id, ResponsePayload::Reply(reply))
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::GetHealth => {
                let health = rentals.lock().await.health();
                Response::success(request_id, ResponsePayload::Health(health))
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "boardkeeperd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
