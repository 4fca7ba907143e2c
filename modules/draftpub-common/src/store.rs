//! Durable key-value view of the automation state.
//!
//! Writers and the operator view race freely; the model is last write wins.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::DraftpubError;
use crate::types::{LogEntry, PersistedState, RunStats, StatusUpdate};

type Result<T> = std::result::Result<T, DraftpubError>;

pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<PersistedState>;

    fn save(&self, state: &PersistedState) -> Result<()>;

    /// Read-modify-write. Not atomic with respect to other writers.
    fn update(&self, apply: &mut dyn FnMut(&mut PersistedState)) -> Result<PersistedState> {
        let mut state = self.load()?;
        apply(&mut state);
        self.save(&state)?;
        Ok(state)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update(&mut |s| s.enabled = enabled).map(drop)
    }

    fn set_status(&self, status: &StatusUpdate) -> Result<()> {
        self.update(&mut |s| s.current_status = status.clone()).map(drop)
    }

    fn set_stats(&self, stats: &RunStats) -> Result<()> {
        self.update(&mut |s| s.stats = *stats).map(drop)
    }

    fn push_log(&self, entry: &LogEntry) -> Result<()> {
        self.update(&mut |s| s.logs.push(entry.clone())).map(drop)
    }

    fn clear_logs(&self) -> Result<()> {
        self.update(&mut |s| s.logs.clear()).map(drop)
    }

    fn reset_stats(&self) -> Result<()> {
        self.update(&mut |s| s.stats = RunStats::default()).map(drop)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<PersistedState> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state.clone();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut PersistedState)) -> Result<PersistedState> {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard);
        Ok(guard.clone())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Pretty-printed JSON document on disk. A missing file reads as defaults.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            DraftpubError::Storage(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        if json.trim().is_empty() {
            return Ok(PersistedState::default());
        }
        serde_json::from_str(&json).map_err(|e| {
            DraftpubError::Storage(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        // Write-then-rename so a concurrent reader never sees half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}
