// Trait seams for the engine's remote dependencies.
//
// SellerApi wraps the six back-office endpoints. ApiConnector builds one per
// run once credentials exist. Tests swap in MockSellerApi from testing.rs.

use std::sync::Arc;

use async_trait::async_trait;

use seller_client::{
    ApiEnvelope, ClientPacing, MetricsReport, PublishRequest, Result, SellerClient, SellerDomain,
    SessionCredentials, Sleeper,
};

// ---------------------------------------------------------------------------
// SellerApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SellerApi: Send + Sync {
    fn domain(&self) -> &SellerDomain;

    async fn draft_products(&self, page: u32, page_size: u32) -> Result<ApiEnvelope>;

    async fn content_quality_info(&self, product_ids: &[u64]) -> Result<ApiEnvelope>;

    async fn product_info(&self, product_id: u64) -> Result<ApiEnvelope>;

    async fn create_product_info_for_draft(&self, request: &PublishRequest) -> Result<ApiEnvelope>;

    async fn report_business_metrics(&self, report: &MetricsReport) -> Result<ApiEnvelope>;

    async fn delete_drafts(&self, product_ids: &[u64]) -> Result<ApiEnvelope>;
}

#[async_trait]
impl SellerApi for SellerClient {
    fn domain(&self) -> &SellerDomain {
        SellerClient::domain(self)
    }

    async fn draft_products(&self, page: u32, page_size: u32) -> Result<ApiEnvelope> {
        SellerClient::draft_products(self, page, page_size).await
    }

    async fn content_quality_info(&self, product_ids: &[u64]) -> Result<ApiEnvelope> {
        SellerClient::content_quality_info(self, product_ids).await
    }

    async fn product_info(&self, product_id: u64) -> Result<ApiEnvelope> {
        SellerClient::product_info(self, product_id).await
    }

    async fn create_product_info_for_draft(&self, request: &PublishRequest) -> Result<ApiEnvelope> {
        SellerClient::create_product_info_for_draft(self, request).await
    }

    async fn report_business_metrics(&self, report: &MetricsReport) -> Result<ApiEnvelope> {
        SellerClient::report_business_metrics(self, report).await
    }

    async fn delete_drafts(&self, product_ids: &[u64]) -> Result<ApiEnvelope> {
        SellerClient::delete_drafts(self, product_ids).await
    }
}

// ---------------------------------------------------------------------------
// ApiConnector
// ---------------------------------------------------------------------------

pub trait ApiConnector: Send + Sync {
    fn connect(&self, domain: SellerDomain, credentials: SessionCredentials) -> Arc<dyn SellerApi>;
}

/// Builds a real [`SellerClient`] per run.
pub struct ReqwestConnector {
    pacing: ClientPacing,
    sleeper: Arc<dyn Sleeper>,
    referer: Option<String>,
    base_url: Option<String>,
}

impl ReqwestConnector {
    pub fn new(pacing: ClientPacing, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            pacing,
            sleeper,
            referer: None,
            base_url: None,
        }
    }

    /// Page URL the session was captured on, sent as the referer.
    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

impl ApiConnector for ReqwestConnector {
    fn connect(&self, domain: SellerDomain, credentials: SessionCredentials) -> Arc<dyn SellerApi> {
        let mut client = SellerClient::new(domain, credentials)
            .with_pacing(self.pacing.clone())
            .with_sleeper(self.sleeper.clone());
        if let Some(referer) = &self.referer {
            client = client.with_referer(referer);
        }
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url);
        }
        Arc::new(client)
    }
}
