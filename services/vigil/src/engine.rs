//! Engine: drives the scheduler and runs dispatched checks
//!
//! The engine ticks the scheduler once per second and spawns a task per
//! dispatched check. Network I/O happens with no lock held; the completion
//! re-acquires the write lock, notifications go out after it is released,
//! and every applied completion is followed by a snapshot save.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::checker::Checker;
use crate::notifier::{Notification, Notifier};
use crate::scheduler::{CheckCompletion, CheckDispatch, SchedulerHandle};
use crate::snapshot::{Snapshot, SnapshotStore};

/// The engine orchestrates polling, checks, notifications and persistence
pub struct Engine {
    scheduler: SchedulerHandle,
    checker: Arc<Checker>,
    notifiers: Vec<Arc<dyn Notifier>>,
    store: Arc<dyn SnapshotStore>,
    include_history: bool,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        scheduler: SchedulerHandle,
        checker: Checker,
        notifiers: Vec<Arc<dyn Notifier>>,
        store: Arc<dyn SnapshotStore>,
        include_history: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scheduler,
            checker: Arc::new(checker),
            notifiers,
            store,
            include_history,
            cancel,
        }
    }

    /// Run until the cancellation token is triggered
    ///
    /// Checks still in flight at shutdown finish in the background; their
    /// results may miss the final save.
    pub async fn run(&self) {
        tracing::info!("Engine started");
        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let dispatches = self.scheduler.write().await.tick();
                    for dispatch in dispatches {
                        tokio::spawn(run_check(
                            Arc::clone(&self.scheduler),
                            Arc::clone(&self.checker),
                            self.notifiers.clone(),
                            Arc::clone(&self.store),
                            self.include_history,
                            dispatch,
                        ));
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Engine loop cancelled");
                    break;
                }
            }
        }

        save_snapshot(&self.scheduler, self.store.as_ref(), self.include_history).await;
        tracing::info!("Engine stopped");
    }
}

/// Run one dispatched check to completion and apply its outcome
pub async fn run_check(
    scheduler: SchedulerHandle,
    checker: Arc<Checker>,
    notifiers: Vec<Arc<dyn Notifier>>,
    store: Arc<dyn SnapshotStore>,
    include_history: bool,
    dispatch: CheckDispatch,
) {
    let CheckDispatch {
        item_id,
        generation,
        url,
        cache,
    } = dispatch;

    let (result, cache) = checker.check(&url, cache).await;

    let completion = scheduler
        .write()
        .await
        .complete_check(item_id, generation, result, cache);

    match completion {
        CheckCompletion::Discarded => {}
        CheckCompletion::Applied { notification } => {
            if let Some(notification) = notification {
                dispatch_notification(&notifiers, &notification).await;
            }
            save_snapshot(&scheduler, store.as_ref(), include_history).await;
        }
    }
}

/// Send a notification through every configured sink
pub async fn dispatch_notification(notifiers: &[Arc<dyn Notifier>], notification: &Notification) {
    for notifier in notifiers {
        tracing::debug!(
            "Dispatching '{}' via {}",
            notification.title,
            notifier.type_name()
        );
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!("Notification via '{}' failed: {}", notifier.type_name(), e);
        }
    }
}

/// Capture the current items and persist them
///
/// Failures are logged; the next applied completion retries the save.
pub async fn save_snapshot(
    scheduler: &SchedulerHandle,
    store: &dyn SnapshotStore,
    include_history: bool,
) {
    let snapshot = {
        let scheduler = scheduler.read().await;
        Snapshot::capture(scheduler.items(), include_history)
    };
    if let Err(e) = store.save(&snapshot) {
        tracing::warn!("Failed to save state: {}", e);
    }
}
