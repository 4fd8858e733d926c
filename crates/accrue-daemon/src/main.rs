//! accrue-daemon: the reward ledger service.
//!
//! Single OS process running a Tokio async runtime. Clients talk to the
//! daemon via newline-delimited JSON-RPC over a Unix socket. Every write
//! method runs inside one SQLite transaction, so ledger records and queued
//! payouts commit or roll back together.

mod commands;
mod config;
mod events;
mod rpc;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};

use accrue_ledger::{Clock, LedgerConfig, SystemClock};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Validated ledger accounts and limits.
    pub ledger_config: LedgerConfig,
    /// Source of record timestamps.
    pub clock: SystemClock,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Assemble the state around an open, migrated connection.
    pub fn new(conn: rusqlite::Connection, config: DaemonConfig) -> anyhow::Result<Self> {
        let ledger_config = config.ledger.to_ledger_config()?;
        let event_bus = EventBus::new(config.rpc.event_capacity);
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            ledger_config,
            clock: SystemClock::new(),
            event_bus,
            shutdown_tx,
        })
    }

    /// Current ledger time in Unix seconds.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing; RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("accrue={}", config.advanced.log_level))
    })?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Accrue daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database
    let db_path = config.db_path();
    let conn = accrue_db::open(&db_path)?;
    info!("Ledger database at {:?}", db_path);

    // 4. Build daemon state
    let socket_path = config.socket_path();
    let state = Arc::new(DaemonState::new(conn, config)?);

    // 5. Start IPC server
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    info!("Starting JSON-RPC server on {:?}", socket_path);

    state.event_bus.emit(events::Event::new(
        events::kind::DAEMON_STARTED,
        state.now(),
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    ));

    // 6. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
