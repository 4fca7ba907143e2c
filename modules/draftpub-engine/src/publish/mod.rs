pub mod metrics;
pub mod payload;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use draftpub_common::{LogLevel, PipelineConfig, RunStats};
use seller_client::{
    mentions_rate_limit, ApiEnvelope, ProductDetail, ProductInfo, PublishRequest, SellerError,
    Sleeper, TokenSynthesizer,
};

use crate::report::Reporter;
use crate::scan::DraftCandidate;
use crate::traits::SellerApi;

use self::metrics::{build_metrics_report, MetricsTiming};
use self::payload::build_publish_request;

/// Why one candidate did not get published.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Failed to get product info: {0}")]
    Detail(String),

    #[error("Publish failed (code: {code}) - {message}")]
    Rejected { code: i64, message: String },

    #[error(transparent)]
    Api(#[from] SellerError),
}

impl CandidateError {
    /// Worth another attempt after backing off.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            CandidateError::Detail(_) => false,
            CandidateError::Rejected { code, message } => *code == 403 || mentions_rate_limit(message),
            CandidateError::Api(e) => e.is_rate_limited(),
        }
    }
}

/// Publishes candidates one at a time: detail, publish with retry, then
/// best-effort metrics and draft deletion.
pub struct PublishPipeline<'a> {
    api: &'a dyn SellerApi,
    config: &'a PipelineConfig,
    sleeper: &'a dyn Sleeper,
    tokens: &'a dyn TokenSynthesizer,
    reporter: &'a Reporter,
    cancelled: &'a AtomicBool,
}

impl<'a> PublishPipeline<'a> {
    pub fn new(
        api: &'a dyn SellerApi,
        config: &'a PipelineConfig,
        sleeper: &'a dyn Sleeper,
        tokens: &'a dyn TokenSynthesizer,
        reporter: &'a Reporter,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self {
            api,
            config,
            sleeper,
            tokens,
            reporter,
            cancelled,
        }
    }

    pub async fn run(&self, candidates: &[DraftCandidate], stats: &mut RunStats) {
        let total = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            if self.cancelled.load(Ordering::Relaxed) {
                info!(remaining = total - index, "Publishing halted by stop signal");
                break;
            }

            self.reporter
                .log(&format!("Processing: {}", candidate.name), LogLevel::Info)
                .await;

            if let Err(e) = self.process(candidate, stats).await {
                self.reporter
                    .log(
                        &format!("Failed to publish {}: {e}", candidate.name),
                        LogLevel::Error,
                    )
                    .await;
                stats.errors += 1;
            }

            stats.processed += 1;
            self.reporter.stats(stats).await;

            let done = index + 1;
            let progress = 50.0 + done as f64 / total as f64 * 50.0;
            self.reporter
                .status(&format!("Publishing products... ({done}/{total})"), progress)
                .await;

            self.sleeper.sleep(self.config.inter_candidate_delay()).await;
        }
    }

    async fn process(
        &self,
        candidate: &DraftCandidate,
        stats: &mut RunStats,
    ) -> Result<(), CandidateError> {
        let envelope = self.api.product_info(candidate.id).await?;
        if !envelope.is_ok() {
            return Err(CandidateError::Detail(envelope.describe()));
        }
        let detail: ProductDetail = envelope.into_data()?;

        let request = build_publish_request(&detail.product_info, self.api.domain());
        self.publish_with_retry(&request).await?;

        stats.published += 1;
        self.reporter
            .log(
                &format!("Successfully published: {}", candidate.name),
                LogLevel::Success,
            )
            .await;

        self.after_publish(candidate, &detail.product_info).await;
        Ok(())
    }

    async fn publish_with_retry(&self, request: &PublishRequest) -> Result<(), CandidateError> {
        let max_attempts = self.config.max_publish_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.publish_once(request).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_rate_limited() => e,
                Err(e) => return Err(e),
            };

            let wait = self.backoff(attempt);
            let secs = (wait.as_millis() as f64 / 1000.0).round();
            let message = if attempt < max_attempts {
                format!("Rate limited, waiting {secs}s before retry {attempt}/{max_attempts}...")
            } else {
                format!("Rate limited, waiting {secs}s after final attempt {attempt}/{max_attempts}...")
            };
            self.reporter.log(&message, LogLevel::Warning).await;
            self.sleeper.sleep(wait).await;

            if attempt >= max_attempts {
                return Err(err);
            }
        }
    }

    async fn publish_once(&self, request: &PublishRequest) -> Result<(), CandidateError> {
        let envelope = self.api.create_product_info_for_draft(request).await?;
        if envelope.is_ok() {
            Ok(())
        } else {
            Err(CandidateError::Rejected {
                code: envelope.code,
                message: envelope.describe(),
            })
        }
    }

    /// `base × attempt` plus up to `jitter` of noise.
    fn backoff(&self, attempt: u32) -> Duration {
        let jitter = match self.config.backoff_jitter_ms {
            0 => 0,
            max => rand::rng().random_range(0..=max),
        };
        self.config.backoff_base(attempt) + Duration::from_millis(jitter)
    }

    /// Metrics then deletion. Neither failure touches the stats.
    async fn after_publish(&self, candidate: &DraftCandidate, info: &ProductInfo) {
        self.sleeper.sleep(self.config.metrics_delay()).await;
        let report = build_metrics_report(
            candidate.id,
            &candidate.name,
            Some(info),
            &self.tokens.metrics_session_id(),
            MetricsTiming::random(),
        );
        match outcome(self.api.report_business_metrics(&report).await) {
            Ok(()) => {
                self.reporter
                    .log(
                        &format!("Reported metrics for: {}", candidate.name),
                        LogLevel::Info,
                    )
                    .await
            }
            Err(e) => {
                warn!(product_id = candidate.id, error = %e, "Metrics report failed");
                self.reporter
                    .log(&format!("Metrics reporting failed: {e}"), LogLevel::Warning)
                    .await
            }
        }

        self.sleeper.sleep(self.config.delete_delay()).await;
        match outcome(self.api.delete_drafts(&[candidate.id]).await) {
            Ok(()) => {
                self.reporter
                    .log(
                        &format!("Deleted draft product: {}", candidate.name),
                        LogLevel::Success,
                    )
                    .await
            }
            Err(e) => {
                warn!(product_id = candidate.id, error = %e, "Draft deletion failed");
                self.reporter
                    .log(&format!("Product deletion failed: {e}"), LogLevel::Warning)
                    .await
            }
        }
    }
}

fn outcome(result: seller_client::Result<ApiEnvelope>) -> Result<(), SellerError> {
    let envelope = result?;
    if envelope.is_ok() {
        Ok(())
    } else {
        Err(SellerError::Application {
            code: envelope.code,
            message: envelope.describe(),
        })
    }
}
