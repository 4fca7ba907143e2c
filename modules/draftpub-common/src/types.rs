use std::collections::VecDeque;
use std::fmt;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// How many log entries the persisted view keeps.
pub const LOG_CAPACITY: usize = 50;

/// Sentinel stored in `selectedDomain` when the custom host field applies.
pub const CUSTOM_DOMAIN_SENTINEL: &str = "custom";

pub const DEFAULT_SELECTED_DOMAIN: &str = "seller.shopee.ph";

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Initializing,
    Scanning,
    Publishing,
    Completed,
    Failed,
    Stopped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Stopped)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunState::Initializing | RunState::Scanning | RunState::Publishing
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Initializing => "initializing",
            RunState::Scanning => "scanning",
            RunState::Publishing => "publishing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Counters shown to the operator. They only ever grow, except through an
/// explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub processed: u64,
    pub published: u64,
    pub errors: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} published={} errors={}",
            self.processed, self.published, self.errors
        )
    }
}

// ---------------------------------------------------------------------------
// Status and logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub text: String,
    pub progress: f64,
}

impl StatusUpdate {
    pub fn new(text: impl Into<String>, progress: f64) -> Self {
        Self {
            text: text.into(),
            progress: progress.clamp(0.0, 100.0),
        }
    }
}

impl Default for StatusUpdate {
    fn default() -> Self {
        Self::new("Ready", 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Message prefixed with the local wall-clock time, `[HH:MM:SS] ...`.
    pub text: String,
    pub level: LogLevel,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LogEntry {
    pub fn now(message: &str, level: LogLevel) -> Self {
        Self {
            text: format!("[{}] {}", Local::now().format("%H:%M:%S"), message),
            level,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Ring buffer of the most recent [`LOG_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LogEntry>", into = "Vec<LogEntry>")]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

impl From<Vec<LogEntry>> for LogBuffer {
    fn from(entries: Vec<LogEntry>) -> Self {
        let mut buffer = LogBuffer::default();
        for entry in entries {
            buffer.push(entry);
        }
        buffer
    }
}

impl From<LogBuffer> for Vec<LogEntry> {
    fn from(buffer: LogBuffer) -> Self {
        buffer.entries.into()
    }
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// Everything the operator-facing view reads back. Field names match the
/// on-disk layout shared with that view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub enabled: bool,
    pub stats: RunStats,
    pub logs: LogBuffer,
    pub current_status: StatusUpdate,
    pub selected_domain: String,
    pub custom_domain: Option<String>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            enabled: false,
            stats: RunStats::default(),
            logs: LogBuffer::default(),
            current_status: StatusUpdate::default(),
            selected_domain: DEFAULT_SELECTED_DOMAIN.to_string(),
            custom_domain: None,
        }
    }
}

impl PersistedState {
    /// Host the operator picked: the custom field when "custom" is
    /// selected and non-empty, else the selected market.
    pub fn effective_domain(&self) -> &str {
        if self.selected_domain == CUSTOM_DOMAIN_SENTINEL {
            match self.custom_domain.as_deref().map(str::trim) {
                Some(custom) if !custom.is_empty() => custom,
                _ => DEFAULT_SELECTED_DOMAIN,
            }
        } else {
            &self.selected_domain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry {
            text: format!("entry {n}"),
            level: LogLevel::Info,
            timestamp: n as i64,
        }
    }

    #[test]
    fn log_buffer_evicts_oldest_first() {
        let mut buffer = LogBuffer::default();
        for n in 0..60 {
            buffer.push(entry(n));
        }
        assert_eq!(buffer.len(), LOG_CAPACITY);
        assert_eq!(buffer.iter().next().unwrap().text, "entry 10");
        assert_eq!(buffer.last().unwrap().text, "entry 59");
    }

    #[test]
    fn oversized_persisted_logs_are_trimmed_on_load() {
        let entries: Vec<LogEntry> = (0..75).map(entry).collect();
        let json = serde_json::to_string(&entries).unwrap();
        let buffer: LogBuffer = serde_json::from_str(&json).unwrap();
        assert_eq!(buffer.len(), LOG_CAPACITY);
        assert_eq!(buffer.iter().next().unwrap().timestamp, 25);
    }

    #[test]
    fn log_entry_text_carries_clock_prefix() {
        let entry = LogEntry::now("hello", LogLevel::Success);
        assert!(entry.text.starts_with('['));
        assert!(entry.text.ends_with("] hello"));
        assert_eq!(entry.level, LogLevel::Success);
    }

    #[test]
    fn persisted_state_uses_camel_case_layout() {
        let state = PersistedState {
            enabled: true,
            current_status: StatusUpdate::new("Scanning", 12.5),
            ..PersistedState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["currentStatus"]["text"], "Scanning");
        assert_eq!(json["selectedDomain"], "seller.shopee.ph");
        assert!(json["logs"].is_array());
        assert_eq!(json["stats"]["processed"], 0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let state: PersistedState = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert!(state.enabled);
        assert_eq!(state.current_status.text, "Ready");
        assert_eq!(state.stats, RunStats::default());
    }

    #[test]
    fn effective_domain_prefers_custom_when_selected() {
        let mut state = PersistedState {
            selected_domain: CUSTOM_DOMAIN_SENTINEL.into(),
            custom_domain: Some(" seller.shopee.vn ".into()),
            ..PersistedState::default()
        };
        assert_eq!(state.effective_domain(), "seller.shopee.vn");

        state.custom_domain = Some("  ".into());
        assert_eq!(state.effective_domain(), DEFAULT_SELECTED_DOMAIN);

        state.selected_domain = "seller.shopee.sg".into();
        assert_eq!(state.effective_domain(), "seller.shopee.sg");
    }

    #[test]
    fn status_progress_is_clamped() {
        assert_eq!(StatusUpdate::new("x", 140.0).progress, 100.0);
        assert_eq!(StatusUpdate::new("x", -3.0).progress, 0.0);
    }

    #[test]
    fn run_state_classification() {
        assert!(RunState::Scanning.is_active());
        assert!(!RunState::Idle.is_active());
        assert!(RunState::Stopped.is_terminal());
        assert!(!RunState::Publishing.is_terminal());
    }
}
