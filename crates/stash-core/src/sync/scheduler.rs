//! Debounced auto-sync trigger

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use super::{SyncCoordinator, SyncReport};
use crate::auth::AuthState;

/// Delay between the first mutation of a burst and the sync run it triggers
pub const DEFAULT_AUTO_SYNC_DELAY: Duration = Duration::from_secs(3);

/// Dropping the sender cancels the timer it belongs to.
type CancelSlot = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Coalesces bursts of local mutations into a single [`SyncCoordinator::run`].
///
/// The first `notify` arms a timer; further calls are no-ops until that run
/// finishes. Reports are published on a watch channel.
pub struct AutoSyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    auth: Arc<dyn AuthState>,
    delay: Duration,
    scheduled: Arc<AtomicBool>,
    cancel: CancelSlot,
    reports: watch::Sender<Option<SyncReport>>,
}

impl AutoSyncScheduler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        auth: Arc<dyn AuthState>,
        delay: Duration,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            coordinator,
            auth,
            delay,
            scheduled: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(Mutex::new(None)),
            reports,
        }
    }

    /// Record that a local mutation happened. Must be called inside a tokio runtime.
    pub fn notify(&self) {
        if !self.auth.is_authenticated() {
            return;
        }
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *lock(&self.cancel) = Some(cancel_tx);

        let coordinator = Arc::clone(&self.coordinator);
        let scheduled = Arc::clone(&self.scheduled);
        let cancel = Arc::clone(&self.cancel);
        let reports = self.reports.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = cancel_rx => return,
            }
            // Whoever takes the sender owns the run; `None` means `flush` got here first.
            if lock(&cancel).take().is_none() {
                return;
            }

            let report = coordinator.run().await;
            scheduled.store(false, Ordering::SeqCst);
            reports.send_replace(Some(report));
        });
        tracing::debug!("Auto-sync armed for {:?}", self.delay);
    }

    /// Whether a run is armed or in progress
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Most recent report (if any), updated after every run
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncReport>> {
        self.reports.subscribe()
    }

    /// Cancel a pending timer and run immediately.
    ///
    /// Returns `None` when no user is signed in.
    pub async fn flush(&self) -> Option<SyncReport> {
        if lock(&self.cancel).take().is_some() {
            self.scheduled.store(false, Ordering::SeqCst);
        }
        if !self.auth.is_authenticated() {
            return None;
        }

        let report = self.coordinator.run().await;
        self.reports.send_replace(Some(report));
        Some(report)
    }
}

impl Drop for AutoSyncScheduler {
    fn drop(&mut self) {
        // A run already in progress finishes on its own.
        lock(&self.cancel).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnippetDraft;
    use crate::remote::mock::Call;
    use crate::sync::fixtures::harness;

    const DELAY: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn burst_of_mutations_triggers_one_run() {
        let h = harness().await;
        let scheduler = AutoSyncScheduler::new(h.coordinator.clone(), h.auth(), DELAY);
        let mut reports = scheduler.subscribe();

        for body in ["a", "b", "c"] {
            h.store.create_snippet(SnippetDraft::new(body)).await.unwrap();
            scheduler.notify();
            assert!(scheduler.is_scheduled());
        }

        reports.changed().await.unwrap();
        let report = reports.borrow_and_update().unwrap();
        assert_eq!(report.created, 3);
        assert!(!scheduler.is_scheduled());
        assert_eq!(
            h.remote.count_calls(|call| matches!(call, Call::Create(_))),
            3
        );

        // Armable again once the run has finished
        h.store.create_snippet(SnippetDraft::new("d")).await.unwrap();
        scheduler.notify();
        reports.changed().await.unwrap();
        assert_eq!(reports.borrow_and_update().unwrap().created, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_the_delay() {
        let h = harness().await;
        let scheduler = AutoSyncScheduler::new(h.coordinator.clone(), h.auth(), DELAY);
        h.store.create_snippet(SnippetDraft::new("a")).await.unwrap();
        scheduler.notify();

        tokio::time::sleep(DELAY / 2).await;
        assert!(h.remote.calls().is_empty());
        assert!(scheduler.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn notify_is_a_no_op_when_signed_out() {
        let h = harness().await;
        h.session.set(None);
        let scheduler = AutoSyncScheduler::new(h.coordinator.clone(), h.auth(), DELAY);

        h.store.create_snippet(SnippetDraft::new("a")).await.unwrap();
        scheduler.notify();
        assert!(!scheduler.is_scheduled());

        tokio::time::sleep(DELAY * 2).await;
        assert!(h.remote.calls().is_empty());
        assert_eq!(scheduler.flush().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_now_and_cancels_the_timer() {
        let h = harness().await;
        let scheduler = AutoSyncScheduler::new(h.coordinator.clone(), h.auth(), DELAY);
        h.store.create_snippet(SnippetDraft::new("a")).await.unwrap();
        scheduler.notify();

        let report = scheduler.flush().await.unwrap();
        assert_eq!(report.created, 1);
        assert!(!scheduler.is_scheduled());

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(h.remote.calls().len(), 1);
        assert_eq!(*scheduler.subscribe().borrow(), Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_the_timer() {
        let h = harness().await;
        let scheduler = AutoSyncScheduler::new(h.coordinator.clone(), h.auth(), DELAY);
        h.store.create_snippet(SnippetDraft::new("a")).await.unwrap();
        scheduler.notify();
        drop(scheduler);

        tokio::time::sleep(DELAY * 2).await;
        assert!(h.remote.calls().is_empty());
    }
}
