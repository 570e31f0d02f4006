//! Background synchronization tasks.
//!
//! The realtime feed pump and the periodic full refresh are independent
//! producers feeding the one serialized update channel the reconciler
//! consumes. The refresh runs regardless of the feed's health, as the
//! correctness backstop for missed events and reconnect gaps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use vala_engine::reconcile::{Reconciler, StoreUpdate};
use vala_engine::remote::PulseService as _;
use vala_engine::unix_now;
use vala_types::DEFAULT_TTL_SECS;

use crate::events::Event;
use crate::DaemonState;

/// Spawn the reconciler, the feed pump, the refresh loop, and the
/// store-change bridge.
pub fn spawn(state: &Arc<DaemonState>, updates_rx: mpsc::Receiver<StoreUpdate>) {
    tokio::spawn(Reconciler::new(state.store.clone()).run(updates_rx));
    tokio::spawn(feed_pump(state.clone()));
    tokio::spawn(refresh_loop(state.clone()));
    tokio::spawn(change_bridge(state.clone()));
}

/// Forward push events from the remote subscription into the update
/// channel.
async fn feed_pump(state: Arc<DaemonState>) {
    let mut shutdown = state.shutdown_tx.subscribe();
    let mut feed = match state.remote.subscribe().await {
        Ok(rx) => rx,
        Err(e) => {
            // The refresh loop still converges the store without the feed.
            error!(error = %e, "realtime subscription failed");
            return;
        }
    };

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Some(event) => {
                    if state
                        .updates_tx
                        .send(StoreUpdate::Feed(event))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    info!("feed pump stopped");
}

/// Periodic full refresh: re-fetch the TTL window, push it through the
/// update channel, and prune rows no lifetime can still reach.
async fn refresh_loop(state: Arc<DaemonState>) {
    let mut shutdown = state.shutdown_tx.subscribe();
    let mut ticker =
        tokio::time::interval(Duration::from_secs(state.config.refresh_interval_secs()));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = unix_now();
                let threshold = now.saturating_sub(DEFAULT_TTL_SECS);

                match state.remote.select_since(threshold).await {
                    Ok(pulses) => {
                        let count = pulses.len();
                        if state
                            .updates_tx
                            .send(StoreUpdate::Refresh(pulses))
                            .await
                            .is_err()
                        {
                            break;
                        }
                        tracing::debug!(count, "full refresh applied");

                        let db = state.db.lock().await;
                        if let Err(e) = vala_db::queries::settings::set(
                            &db,
                            "last_full_refresh",
                            &now.to_string(),
                        ) {
                            warn!(error = %e, "failed to record refresh time");
                        }
                        match vala_db::queries::pulses::prune_before(&db, threshold) {
                            Ok(removed) if removed > 0 => {
                                info!(removed, "pruned expired pulse rows")
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "prune failed"),
                        }
                    }
                    Err(e) => warn!(error = %e, "full refresh failed"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    info!("refresh loop stopped");
}

/// Bridge store revisions onto the event bus so subscribed UIs re-read.
async fn change_bridge(state: Arc<DaemonState>) {
    let mut shutdown = state.shutdown_tx.subscribe();
    let mut revisions = state.store.subscribe();

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let revision = *revisions.borrow_and_update();
                state.event_bus.emit(Event::now(
                    "PulsesChanged",
                    serde_json::json!({"revision": revision}),
                ));
            }
            _ = shutdown.recv() => break,
        }
    }
    info!("change bridge stopped");
}
