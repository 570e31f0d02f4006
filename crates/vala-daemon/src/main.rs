//! vala-daemon: the Vala pulse engine daemon.
//!
//! Single OS process running a Tokio async runtime. UI clients (map,
//! list, radio surfaces) talk JSON-RPC over a Unix socket and observe
//! state through the event subscription; the daemon owns the pulse
//! store, the sync pipeline, the vote ledgers, and the radio queue.

mod commands;
mod config;
mod events;
mod rpc;
mod service;
mod sync;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info};

use vala_engine::playback::PlaybackQueue;
use vala_engine::reconcile::StoreUpdate;
use vala_engine::store::PulseStore;

use crate::config::DaemonConfig;
use crate::events::{Event, EventBus};
use crate::rpc::RpcServer;
use crate::service::{CoordinateGeocoder, DeviceStore, FsBlobStore, LocalPulseService};

/// Capacity of the serialized store-update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// In-memory pulse view.
    pub store: Arc<PulseStore>,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// The pulses collection service.
    pub remote: LocalPulseService,
    /// Audio blob storage.
    pub blobs: FsBlobStore,
    /// Reverse-geocoder fallback.
    pub geocoder: CoordinateGeocoder,
    /// Persisted device vote sets.
    pub sets: DeviceStore,
    /// Producer side of the serialized update channel.
    pub updates_tx: mpsc::Sender<StoreUpdate>,
    /// Radio-mode queue.
    pub radio: Mutex<PlaybackQueue>,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vala=info".parse()?),
        )
        .init();

    info!("Vala daemon starting");

    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();

    // Ensure data directories exist
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(config.blob_dir())?;

    // 2. Open database
    let db_path = data_dir.join("vala.db");
    let conn = vala_db::open(&db_path)?;
    let db = Arc::new(Mutex::new(conn));

    // 3. Create event bus and channels
    let event_bus = EventBus::new(config.sync.event_buffer);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

    // 4. Build services and state
    let store = Arc::new(PulseStore::new());
    let remote = LocalPulseService::new(db.clone());
    let blobs = FsBlobStore::new(config.blob_dir(), &config.storage.blob_base_url);
    let sets = DeviceStore::new(db.clone());

    let state = Arc::new(DaemonState {
        db,
        config,
        store,
        event_bus,
        remote,
        blobs,
        geocoder: CoordinateGeocoder,
        sets,
        updates_tx,
        radio: Mutex::new(PlaybackQueue::new()),
        shutdown_tx: shutdown_tx.clone(),
    });

    // 5. Start background sync tasks
    sync::spawn(&state, updates_rx);

    // 6. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 7. Emit DaemonStarted event
    state.event_bus.emit(Event::now(
        "DaemonStarted",
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    ));

    // 8. Run the RPC server until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
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

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
