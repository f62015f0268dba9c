//! Vigil - HTTP change detection and notification service
//!
//! Polls HTTP(S) resources on independent intervals, detects content
//! changes with conditional requests, and sends notifications when
//! per-item rules match.

pub mod checker;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod history;
pub mod io;
pub mod item;
pub mod matcher;
pub mod notifier;
pub mod outcome;
pub mod pushover;
pub mod scheduler;
pub mod snapshot;

pub use config::{load_config, Config};
pub use error::{Result, VigilError};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::checker::Checker;
use crate::engine::Engine;
use crate::io::ReqwestHttpClient;
use crate::item::MonitoredItem;
use crate::notifier::Notifier;
use crate::pushover::PushoverNotifier;
use crate::snapshot::{JsonFileStore, SnapshotStore};

/// Run the vigil service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    let timeout = Duration::from_secs(config.engine.request_timeout_seconds);
    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::new(timeout)?);
    let cancel = CancellationToken::new();

    // Build items, rejecting invalid entries up front
    let mut items: Vec<MonitoredItem> = Vec::new();
    for item_config in &config.items {
        items.push(item_config.clone().into_item()?);
    }

    // Restore saved state, matching items by url
    let store: Arc<dyn SnapshotStore> =
        Arc::new(JsonFileStore::new(config.engine.state_file.clone()));
    let items = match store.load() {
        Ok(Some(saved)) => snapshot::restore_items(items, saved, config.engine.history_size),
        Ok(None) => items,
        Err(e) => {
            tracing::warn!("Ignoring unreadable saved state: {}", e);
            items
        }
    };

    // Build notifiers
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    for notifier_config in &config.notifiers {
        let notifier: Arc<dyn Notifier> = match notifier_config {
            config::NotifierConfig::Pushover { .. } => {
                Arc::new(PushoverNotifier::new(notifier_config, Arc::clone(&http)))
            }
        };
        notifiers.push(notifier);
    }

    // Build scheduler and engine
    let scheduler = scheduler::new_scheduler_handle(items, config.engine.history_size);
    let engine = Engine::new(
        scheduler,
        Checker::new(http),
        notifiers,
        store,
        config.engine.include_history,
        cancel.clone(),
    );

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    // Run the engine (blocks until cancelled)
    engine.run().await;

    Ok(())
}
