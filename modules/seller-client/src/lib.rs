pub mod credentials;
pub mod domain;
pub mod error;
pub mod pacing;
pub mod tokens;
pub mod types;

pub use credentials::{Provenance, SessionCredentials, POST_HEADERS, REQUIRED_HEADERS, SESSION_HEADERS};
pub use domain::{SellerDomain, DEFAULT_DOMAIN};
pub use error::{mentions_rate_limit, Result, SellerError};
pub use pacing::{ClientPacing, Sleeper, TokioSleeper};
pub use tokens::{RandomTokens, TokenSynthesizer, FRONTEND_VERSION};
pub use types::{
    ApiEnvelope, BrandInfo, DeleteRequest, DraftPage, DraftProduct, MetricsEntry, MetricsReport,
    PageInfo, ProductDetail, ProductInfo, PublishProductInfo, PublishRequest, QualityInfo,
};

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const DRAFT_LIST_PATH: &str = "/v3/mpsku/list/v2/get_draft_product_list";
const QUALITY_INFO_PATH: &str = "/v3/mpsku/list/v2/get_content_quality_info";
const PRODUCT_INFO_PATH: &str = "/v3/product/get_product_info";
const PUBLISH_PATH: &str = "/v3/product/create_product_info_for_draft";
const METRICS_PATH: &str = "/v3/general/report_upload_business_metrics";
const DELETE_PATH: &str = "/tool/mass_product/delete_product/";

const CDS_VERSION: &str = "2";
const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

pub struct SellerClient {
    http: reqwest::Client,
    domain: SellerDomain,
    base_url: String,
    referer: String,
    credentials: SessionCredentials,
    tokens: Arc<dyn TokenSynthesizer>,
    sleeper: Arc<dyn Sleeper>,
    pacing: ClientPacing,
}

impl SellerClient {
    pub fn new(domain: SellerDomain, credentials: SessionCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: domain.api_base_url(),
            referer: domain.draft_page_url(),
            domain,
            credentials,
            tokens: Arc::new(RandomTokens),
            sleeper: Arc::new(TokioSleeper),
            pacing: ClientPacing::default(),
        }
    }

    /// Point the client somewhere other than `https://<domain>/api`.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = referer.to_string();
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenSynthesizer>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_pacing(mut self, pacing: ClientPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn domain(&self) -> &SellerDomain {
        &self.domain
    }

    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    /// List one page of drafts.
    pub async fn draft_products(&self, page: u32, page_size: u32) -> Result<ApiEnvelope> {
        self.request(
            Method::GET,
            DRAFT_LIST_PATH,
            &[
                ("page_number", page.to_string()),
                ("page_size", page_size.to_string()),
                ("qc_status", "all".to_string()),
            ],
            None,
        )
        .await
    }

    /// Quality levels for a batch of draft ids.
    pub async fn content_quality_info(&self, product_ids: &[u64]) -> Result<ApiEnvelope> {
        let ids = product_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.request(
            Method::GET,
            QUALITY_INFO_PATH,
            &[("product_ids", ids), ("is_draft", "true".to_string())],
            None,
        )
        .await
    }

    pub async fn product_info(&self, product_id: u64) -> Result<ApiEnvelope> {
        self.request(
            Method::GET,
            PRODUCT_INFO_PATH,
            &[
                ("product_id", product_id.to_string()),
                ("is_draft", "true".to_string()),
            ],
            None,
        )
        .await
    }

    /// Submit a draft for publication.
    pub async fn create_product_info_for_draft(
        &self,
        request: &PublishRequest,
    ) -> Result<ApiEnvelope> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, PUBLISH_PATH, &[], Some(body)).await
    }

    pub async fn report_business_metrics(&self, report: &MetricsReport) -> Result<ApiEnvelope> {
        let body = serde_json::to_value(report)?;
        self.request(Method::POST, METRICS_PATH, &[], Some(body)).await
    }

    pub async fn delete_drafts(&self, product_ids: &[u64]) -> Result<ApiEnvelope> {
        let body = serde_json::to_value(DeleteRequest {
            unpublished_ids: product_ids.to_vec(),
        })?;
        self.request(Method::POST, DELETE_PATH, &[], Some(body)).await
    }

    /// Issue one call and parse the envelope.
    ///
    /// Every failure is followed by a cooldown before it is returned: longer
    /// after a rate limit, shorter otherwise.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<ApiEnvelope> {
        let result = self.send(method.clone(), path, query, body).await;

        if let Err(ref e) = result {
            let cooldown = if e.is_rate_limited() {
                self.pacing.rate_limit_cooldown
            } else {
                self.pacing.failure_cooldown
            };
            warn!(
                %method,
                path,
                error = %e,
                cooldown_ms = cooldown.as_millis() as u64,
                "Seller API call failed, cooling down"
            );
            self.sleeper.sleep(cooldown).await;
        }

        result
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<ApiEnvelope> {
        let url = self.endpoint_url(path, query)?;
        let headers = self.headers(&method, body.is_some());
        debug!(%method, path, "Seller API request");

        let mut builder = self.http.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(&body)?);
        }

        let resp = builder.send().await?;
        let status = resp.status();

        if status.as_u16() == 403 || status.as_u16() == 429 {
            let detail = resp.text().await.unwrap_or_default();
            let wait = self.pacing.rate_limit_wait();
            warn!(
                %method,
                path,
                status = status.as_u16(),
                wait_ms = wait.as_millis() as u64,
                detail = %truncate(&detail, 200),
                "Rate limited, waiting before surfacing failure"
            );
            self.sleeper.sleep(wait).await;
            return Err(SellerError::RateLimited {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("Unknown Status");
            let message = match describe_error_body(&text) {
                Some(detail) => format!("{reason} - {detail}"),
                None => reason.to_string(),
            };
            return Err(SellerError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        let envelope: ApiEnvelope = serde_json::from_str(&text)?;
        debug!(%method, path, code = envelope.code, "Seller API response");
        Ok(envelope)
    }

    /// Endpoint URL with the CDS pair first, then the call's own query.
    fn endpoint_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| SellerError::InvalidDomain(format!("{}: {e}", self.base_url)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("SPC_CDS", self.credentials.cds_token())
                .append_pair("SPC_CDS_VER", CDS_VERSION);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn headers(&self, method: &Method, has_body: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("locale", HeaderValue::from_static(self.domain.locale()));
        if let Ok(referer) = HeaderValue::from_str(&self.referer) {
            headers.insert(REFERER, referer);
        }
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        for (name, value) in self.credentials.session_headers() {
            insert_dynamic(&mut headers, name, value);
        }

        if *method == Method::POST {
            let upload_session_id = self.tokens.upload_session_id();
            insert_dynamic(&mut headers, "upload-session-id", &upload_session_id);
            for (name, value) in self.credentials.post_headers() {
                insert_dynamic(&mut headers, name, value);
            }
        }

        headers
    }
}

fn insert_dynamic(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(header = name, "Skipping header with invalid name or value"),
    }
}

/// Extract the most useful detail from a non-2xx body: a structured
/// `message`/`msg`/`error` field, the raw JSON, or the raw text.
fn describe_error_body(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<Value>(text) {
        for key in ["message", "msg", "error"] {
            match json.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                _ => {}
            }
        }
        return Some(json.to_string());
    }
    Some(text.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
