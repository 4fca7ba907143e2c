// Passive traffic observation.
//
// A TrafficObserver reports outbound requests the page made on its own. The
// acquirer lifts headers from the ones aimed at the seller API.
// - HarObserver: replays a HAR capture exported from the browser
// - RecordingObserver: filled in-process by whatever wraps the page's requests

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

pub trait TrafficObserver: Send + Sync {
    /// Requests seen so far, oldest first.
    fn observed(&self) -> Vec<ObservedRequest>;
}

// ---------------------------------------------------------------------------
// HarObserver
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Har {
    log: HarLog,
}

#[derive(Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Deserialize)]
struct HarEntry {
    request: HarRequest,
}

#[derive(Deserialize)]
struct HarRequest {
    url: String,
    #[serde(default)]
    headers: Vec<HarHeader>,
}

#[derive(Deserialize)]
struct HarHeader {
    name: String,
    value: String,
}

pub struct HarObserver {
    requests: Vec<ObservedRequest>,
}

impl HarObserver {
    pub fn from_json(json: &str) -> Result<Self> {
        let har: Har = serde_json::from_str(json).context("Failed to parse HAR capture")?;
        let requests = har
            .log
            .entries
            .into_iter()
            .map(|entry| ObservedRequest {
                url: entry.request.url,
                headers: entry
                    .request
                    .headers
                    .into_iter()
                    // HTTP/2 pseudo-headers are not real request headers.
                    .filter(|h| !h.name.starts_with(':'))
                    .map(|h| (h.name, h.value))
                    .collect(),
            })
            .collect();
        Ok(Self { requests })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HAR file: {}", path.display()))?;
        let observer = Self::from_json(&json)
            .with_context(|| format!("Invalid HAR file: {}", path.display()))?;
        info!(
            path = %path.display(),
            requests = observer.requests.len(),
            "Loaded HAR capture"
        );
        Ok(observer)
    }
}

impl TrafficObserver for HarObserver {
    fn observed(&self) -> Vec<ObservedRequest> {
        self.requests.clone()
    }
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingObserver {
    requests: Mutex<Vec<ObservedRequest>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: &str, headers: &[(&str, &str)]) {
        let request = ObservedRequest {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        };
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
    }
}

impl TrafficObserver for RecordingObserver {
    fn observed(&self) -> Vec<ObservedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
