// Test doubles for the engine's seams.
//
// - MockSellerApi (SellerApi): scripted replies per endpoint, call log
// - MockConnector (ApiConnector): hands out one shared MockSellerApi
// - StaticSource (CredentialSource): fixed credentials or a fixed failure
// - RecordingSleeper (Sleeper): records every pause, can trip a stop flag
// - EventRecorder (RunObserver): collects events, can refuse them
// - FixedTokens (TokenSynthesizer): deterministic values
//
// Plus envelope builders for draft pages, quality info and product detail.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};

use seller_client::{
    ApiEnvelope, MetricsReport, PublishRequest, SellerDomain, SellerError, SessionCredentials,
    Sleeper, TokenSynthesizer,
};

use crate::error::{Result as RunResult, RunError};
use crate::events::{RunEvent, RunObserver};
use crate::session::CredentialSource;
use crate::traits::{ApiConnector, SellerApi};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Envelope builders
// ---------------------------------------------------------------------------

/// One page of the draft list. Products are `(id, name)`.
pub fn draft_page<S: AsRef<str>>(
    products: &[(u64, S)],
    total: u64,
    page_size: u32,
    page: u32,
) -> ApiEnvelope {
    let products: Vec<Value> = products
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name.as_ref()}))
        .collect();
    ApiEnvelope::ok(json!({
        "products": products,
        "page_info": {"total": total, "page_size": page_size, "page_number": page}
    }))
}

/// `count` products with ids starting at `first_id`, named "Draft <id>".
pub fn numbered_products(first_id: u64, count: u64) -> Vec<(u64, String)> {
    (first_id..first_id + count)
        .map(|id| (id, format!("Draft {id}")))
        .collect()
}

pub fn quality_info(levels: &[(u64, i64)]) -> ApiEnvelope {
    let map: serde_json::Map<String, Value> = levels
        .iter()
        .map(|(id, level)| (id.to_string(), json!({"quality_level": level})))
        .collect();
    ApiEnvelope::ok(json!({"content_quality_info": map}))
}

pub fn product_detail(id: u64, name: &str) -> ApiEnvelope {
    ApiEnvelope::ok(json!({
        "product_info": {
            "id": id,
            "name": name,
            "category_path": [100017, 100075],
            "images": ["img-1"],
            "brand_info": {"brand_id": 0, "brand_name": "No brand"}
        }
    }))
}

// ---------------------------------------------------------------------------
// MockSellerApi
// ---------------------------------------------------------------------------

/// A canned reply. Cloneable so one script can answer many calls.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(ApiEnvelope),
    RateLimited { status: u16 },
    Http { status: u16, message: String },
    Network(String),
}

impl Reply {
    pub fn code(code: i64, message: &str) -> Self {
        Reply::Ok(ApiEnvelope::failure(code, message))
    }

    fn into_result(self) -> seller_client::Result<ApiEnvelope> {
        match self {
            Reply::Ok(envelope) => Ok(envelope),
            Reply::RateLimited { status } => Err(SellerError::RateLimited { status }),
            Reply::Http { status, message } => Err(SellerError::Http { status, message }),
            Reply::Network(message) => Err(SellerError::Network(message)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DraftList { page: u32, page_size: u32 },
    QualityInfo(Vec<u64>),
    ProductInfo(u64),
    Publish(u64),
    Metrics(u64),
    Delete(Vec<u64>),
}

/// Draft pages answer by page number (missing pages are empty). Quality
/// levels come from a per-id table. Detail defaults to [`product_detail`].
/// Publish, metrics and delete succeed unless a reply is queued.
pub struct MockSellerApi {
    domain: SellerDomain,
    pages: HashMap<u32, Reply>,
    quality_levels: HashMap<u64, i64>,
    quality_override: Option<Reply>,
    details: HashMap<u64, Reply>,
    publish_replies: Mutex<HashMap<u64, VecDeque<Reply>>>,
    metrics_replies: Mutex<VecDeque<Reply>>,
    delete_replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    published: Mutex<Vec<PublishRequest>>,
    reports: Mutex<Vec<MetricsReport>>,
}

impl MockSellerApi {
    pub fn new() -> Self {
        Self::for_domain(SellerDomain::default())
    }

    pub fn for_domain(domain: SellerDomain) -> Self {
        Self {
            domain,
            pages: HashMap::new(),
            quality_levels: HashMap::new(),
            quality_override: None,
            details: HashMap::new(),
            publish_replies: Mutex::new(HashMap::new()),
            metrics_replies: Mutex::new(VecDeque::new()),
            delete_replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(mut self, page: u32, reply: Reply) -> Self {
        self.pages.insert(page, reply);
        self
    }

    pub fn with_quality(mut self, id: u64, level: i64) -> Self {
        self.quality_levels.insert(id, level);
        self
    }

    /// Every quality lookup answers with `reply` instead of the table.
    pub fn on_quality(mut self, reply: Reply) -> Self {
        self.quality_override = Some(reply);
        self
    }

    pub fn on_detail(mut self, id: u64, reply: Reply) -> Self {
        self.details.insert(id, reply);
        self
    }

    /// Queue replies for successive publish attempts of one product.
    pub fn on_publish(self, id: u64, replies: Vec<Reply>) -> Self {
        lock(&self.publish_replies)
            .entry(id)
            .or_default()
            .extend(replies);
        self
    }

    pub fn on_metrics(self, reply: Reply) -> Self {
        lock(&self.metrics_replies).push_back(reply);
        self
    }

    pub fn on_delete(self, reply: Reply) -> Self {
        lock(&self.delete_replies).push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| matches(c)).count()
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        lock(&self.published).clone()
    }

    pub fn reports(&self) -> Vec<MetricsReport> {
        lock(&self.reports).clone()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }
}

impl Default for MockSellerApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SellerApi for MockSellerApi {
    fn domain(&self) -> &SellerDomain {
        &self.domain
    }

    async fn draft_products(&self, page: u32, page_size: u32) -> seller_client::Result<ApiEnvelope> {
        self.record(Call::DraftList { page, page_size });
        self.pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| Reply::Ok(draft_page::<&str>(&[], 0, page_size, page)))
            .into_result()
    }

    async fn content_quality_info(&self, product_ids: &[u64]) -> seller_client::Result<ApiEnvelope> {
        self.record(Call::QualityInfo(product_ids.to_vec()));
        if let Some(reply) = &self.quality_override {
            return reply.clone().into_result();
        }
        let levels: Vec<(u64, i64)> = product_ids
            .iter()
            .filter_map(|id| self.quality_levels.get(id).map(|level| (*id, *level)))
            .collect();
        Ok(quality_info(&levels))
    }

    async fn product_info(&self, product_id: u64) -> seller_client::Result<ApiEnvelope> {
        self.record(Call::ProductInfo(product_id));
        self.details
            .get(&product_id)
            .cloned()
            .unwrap_or_else(|| Reply::Ok(product_detail(product_id, &format!("Draft {product_id}"))))
            .into_result()
    }

    async fn create_product_info_for_draft(
        &self,
        request: &PublishRequest,
    ) -> seller_client::Result<ApiEnvelope> {
        self.record(Call::Publish(request.product_id));
        lock(&self.published).push(request.clone());
        lock(&self.publish_replies)
            .get_mut(&request.product_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Ok(ApiEnvelope::ok(json!({}))))
            .into_result()
    }

    async fn report_business_metrics(&self, report: &MetricsReport) -> seller_client::Result<ApiEnvelope> {
        let id = report.metrics.first().map(|m| m.product_id).unwrap_or(0);
        self.record(Call::Metrics(id));
        lock(&self.reports).push(report.clone());
        lock(&self.metrics_replies)
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(ApiEnvelope::ok(json!({}))))
            .into_result()
    }

    async fn delete_drafts(&self, product_ids: &[u64]) -> seller_client::Result<ApiEnvelope> {
        self.record(Call::Delete(product_ids.to_vec()));
        lock(&self.delete_replies)
            .pop_front()
            .unwrap_or_else(|| Reply::Ok(ApiEnvelope::ok(json!({}))))
            .into_result()
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

pub struct MockConnector {
    api: Arc<MockSellerApi>,
    connected: Mutex<Vec<(String, SessionCredentials)>>,
}

impl MockConnector {
    pub fn new(api: Arc<MockSellerApi>) -> Self {
        Self {
            api,
            connected: Mutex::new(Vec::new()),
        }
    }

    /// Domains and credentials each run connected with.
    pub fn connections(&self) -> Vec<(String, SessionCredentials)> {
        lock(&self.connected).clone()
    }
}

impl ApiConnector for MockConnector {
    fn connect(&self, domain: SellerDomain, credentials: SessionCredentials) -> Arc<dyn SellerApi> {
        lock(&self.connected).push((domain.to_string(), credentials));
        self.api.clone()
    }
}

// ---------------------------------------------------------------------------
// StaticSource
// ---------------------------------------------------------------------------

pub enum StaticSource {
    Credentials(SessionCredentials),
    MissingCds,
}

impl StaticSource {
    /// Fully captured credentials with CDS token "cds-test".
    pub fn valid() -> Self {
        let mut creds = SessionCredentials::new("cds-test");
        for (name, value) in [
            ("sc-fe-session", "0123456789ABCDEF"),
            ("sc-fe-ver", "21.105196"),
            ("x-sap-ri", "ri"),
            ("x-sap-sec", "sec"),
            ("sz-dfp", "dfp"),
            ("af-ac-enc-sz-token", "af"),
        ] {
            creds.capture(name, value);
        }
        StaticSource::Credentials(creds)
    }
}

#[async_trait]
impl CredentialSource for StaticSource {
    async fn acquire(&self, _domain: &SellerDomain) -> RunResult<SessionCredentials> {
        match self {
            StaticSource::Credentials(creds) => Ok(creds.clone()),
            StaticSource::MissingCds => Err(RunError::MissingCredential(
                "SPC_CDS cookie not found".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

/// Returns immediately. Optionally raises a flag once `n` pauses happened,
/// standing in for an operator pressing stop mid-run.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    trigger: Mutex<Option<(usize, Arc<AtomicBool>)>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip_after(sleeps: usize, flag: Arc<AtomicBool>) -> Self {
        let sleeper = Self::default();
        sleeper.arm(sleeps, flag);
        sleeper
    }

    /// Raise `flag` once `sleeps` pauses have been recorded in total.
    pub fn arm(&self, sleeps: usize, flag: Arc<AtomicBool>) {
        *lock(&self.trigger) = Some((sleeps, flag));
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = lock(&self.sleeps);
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((after, flag)) = lock(&self.trigger).as_ref() {
            if count >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventRecorder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<RunEvent>>,
    refuse: bool,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer whose every delivery fails.
    pub fn refusing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            refuse: true,
        }
    }

    pub fn events(&self) -> Vec<RunEvent> {
        lock(&self.events).clone()
    }

    /// Log texts without their clock prefix.
    pub fn log_messages(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                RunEvent::Log(entry) => Some(
                    entry
                        .text
                        .split_once("] ")
                        .map(|(_, msg)| msg.to_string())
                        .unwrap_or_else(|| entry.text.clone()),
                ),
                _ => None,
            })
            .collect()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                RunEvent::Status(status) => Some(status.progress),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RunObserver for EventRecorder {
    async fn deliver(&self, event: &RunEvent) -> anyhow::Result<()> {
        if self.refuse {
            bail!("observer unavailable");
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FixedTokens
// ---------------------------------------------------------------------------

pub struct FixedTokens;

impl TokenSynthesizer for FixedTokens {
    fn session_id(&self) -> String {
        "FEEDFACECAFEBEEF".to_string()
    }

    fn request_integrity(&self) -> String {
        "a".repeat(52)
    }

    fn security_blob(&self) -> String {
        "fixed-security-blob=".to_string()
    }

    fn device_fingerprint(&self) -> String {
        "fixed-dfp".to_string()
    }

    fn anti_forgery_token(&self) -> String {
        "fixed-af".to_string()
    }

    fn upload_session_id(&self) -> String {
        "1700000000000abcdefghi".to_string()
    }

    fn metrics_session_id(&self) -> String {
        "1700000000000424242".to_string()
    }
}
