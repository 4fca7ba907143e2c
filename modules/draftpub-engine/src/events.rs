// Outbound events and the observers that receive them.
//
// The engine never depends on anyone listening: delivery is best-effort and
// Reporter falls back to the state store when it fails.
// - ChannelObserver: hands events to an in-process consumer over mpsc
// - StoreObserver: the background role, folding events into PersistedState

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use draftpub_common::{DraftpubError, LogEntry, LogLevel, RunStats, StateStore, StatusUpdate};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RunEvent {
    Status(StatusUpdate),
    Stats(RunStats),
    Log(LogEntry),
    Completed { stats: RunStats },
    Error { message: String },
    SessionInitialized,
    SessionError { message: String },
}

#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn deliver(&self, event: &RunEvent) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ChannelObserver
// ---------------------------------------------------------------------------

pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RunObserver for ChannelObserver {
    async fn deliver(&self, event: &RunEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| anyhow!("observer channel closed"))
    }
}

// ---------------------------------------------------------------------------
// StoreObserver
// ---------------------------------------------------------------------------

pub struct StoreObserver {
    store: Arc<dyn StateStore>,
}

impl StoreObserver {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn apply(&self, event: &RunEvent) -> std::result::Result<(), DraftpubError> {
        let store = &self.store;
        match event {
            RunEvent::Status(status) => store.set_status(status),
            RunEvent::Stats(stats) => store.set_stats(stats),
            RunEvent::Log(entry) => store.push_log(entry),
            RunEvent::Completed { .. } => store
                .update(&mut |s| {
                    s.enabled = false;
                    s.current_status = StatusUpdate::new("Completed", 100.0);
                })
                .map(drop),
            RunEvent::Error { message } => {
                store.update(&mut |s| {
                    s.enabled = false;
                    s.current_status = StatusUpdate::new("Error", 0.0);
                })?;
                store.push_log(&LogEntry::now(&format!("Error: {message}"), LogLevel::Error))
            }
            RunEvent::SessionInitialized => {
                store.push_log(&LogEntry::now(
                    "Session initialized successfully",
                    LogLevel::Info,
                ))?;
                store.set_status(&StatusUpdate::new(
                    "Session ready - Starting automation...",
                    20.0,
                ))
            }
            RunEvent::SessionError { message } => {
                store.update(&mut |s| {
                    s.enabled = false;
                    s.current_status = StatusUpdate::new("Session error", 0.0);
                })?;
                store.push_log(&LogEntry::now(
                    &format!("Session error: {message}"),
                    LogLevel::Error,
                ))
            }
        }
    }
}

#[async_trait]
impl RunObserver for StoreObserver {
    async fn deliver(&self, event: &RunEvent) -> Result<()> {
        self.apply(event)
            .with_context(|| format!("Failed to persist {event:?}"))
    }
}
