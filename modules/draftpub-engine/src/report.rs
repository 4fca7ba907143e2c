use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use draftpub_common::{LogEntry, LogLevel, RunState, RunStats, StateStore, StatusUpdate};

use crate::controller::Run;
use crate::events::{RunEvent, RunObserver};

/// Fans run progress out to the observer and the state store.
///
/// Status and stats are written to the store before delivery. Log entries go
/// to the observer and only reach the store directly when delivery fails or
/// nobody is listening.
pub struct Reporter {
    store: Arc<dyn StateStore>,
    observer: Option<Arc<dyn RunObserver>>,
    run: Mutex<Run>,
}

impl Reporter {
    pub fn new(store: Arc<dyn StateStore>, observer: Option<Arc<dyn RunObserver>>) -> Self {
        Self {
            store,
            observer,
            run: Mutex::new(Run::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Run {
        self.run().clone()
    }

    fn run(&self) -> MutexGuard<'_, Run> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn begin(&self, domain: &str, stats: RunStats) {
        *self.run() = Run {
            state: RunState::Initializing,
            stats,
            progress: 0.0,
            domain: Some(domain.to_string()),
        };
    }

    pub fn set_state(&self, state: RunState) {
        self.run().state = state;
    }

    pub async fn log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Info | LogLevel::Success => info!(%level, "{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }

        let entry = LogEntry::now(message, level);
        if !self.deliver(RunEvent::Log(entry.clone())).await {
            if let Err(e) = self.store.push_log(&entry) {
                warn!(error = %e, "Failed to persist log entry");
            }
        }
    }

    pub async fn status(&self, text: &str, progress: f64) {
        let status = StatusUpdate::new(text, progress);
        if let Err(e) = self.store.set_status(&status) {
            warn!(error = %e, "Failed to persist status");
        }
        self.run().progress = status.progress;
        self.deliver(RunEvent::Status(status)).await;
    }

    pub async fn stats(&self, stats: &RunStats) {
        if let Err(e) = self.store.set_stats(stats) {
            warn!(error = %e, "Failed to persist stats");
        }
        self.run().stats = *stats;
        self.deliver(RunEvent::Stats(*stats)).await;
    }

    pub async fn completed(&self, stats: &RunStats) {
        self.deliver(RunEvent::Completed { stats: *stats }).await;
    }

    pub async fn error(&self, message: &str) {
        self.deliver(RunEvent::Error {
            message: message.to_string(),
        })
        .await;
    }

    pub async fn session_initialized(&self) {
        self.deliver(RunEvent::SessionInitialized).await;
    }

    pub async fn session_error(&self, message: &str) {
        self.deliver(RunEvent::SessionError {
            message: message.to_string(),
        })
        .await;
    }

    /// True when an observer took the event.
    async fn deliver(&self, event: RunEvent) -> bool {
        let Some(observer) = &self.observer else {
            return false;
        };
        match observer.deliver(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Observer delivery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelObserver;
    use draftpub_common::MemoryStore;

    #[tokio::test]
    async fn logs_fall_back_to_store_without_observer() {
        let store = Arc::new(MemoryStore::new());
        let reporter = Reporter::new(store.clone(), None);

        reporter.log("hello", LogLevel::Warning).await;
        let state = store.snapshot();
        assert_eq!(state.logs.len(), 1);
        assert!(state.logs.last().unwrap().text.ends_with("] hello"));
    }

    #[tokio::test]
    async fn delivered_logs_are_not_persisted_by_the_engine() {
        let store = Arc::new(MemoryStore::new());
        let (observer, mut rx) = ChannelObserver::new();
        let reporter = Reporter::new(store.clone(), Some(Arc::new(observer)));

        reporter.log("hello", LogLevel::Info).await;
        assert!(store.snapshot().logs.is_empty());
        assert!(matches!(rx.recv().await, Some(RunEvent::Log(_))));
    }

    #[tokio::test]
    async fn status_and_stats_hit_store_even_when_delivery_fails() {
        let store = Arc::new(MemoryStore::new());
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        let reporter = Reporter::new(store.clone(), Some(Arc::new(observer)));

        reporter.status("Scanning pages...", 25.0).await;
        let stats = RunStats {
            processed: 1,
            published: 1,
            errors: 0,
        };
        reporter.stats(&stats).await;
        reporter.log("lost delivery", LogLevel::Error).await;

        let state = store.snapshot();
        assert_eq!(state.current_status.progress, 25.0);
        assert_eq!(state.stats, stats);
        assert_eq!(state.logs.len(), 1);
        assert_eq!(reporter.snapshot().progress, 25.0);
    }
}
