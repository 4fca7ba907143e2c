use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use draftpub_common::{LogLevel, PipelineConfig, RunStats};
use seller_client::{DraftPage, QualityInfo, SellerError, Sleeper};

use crate::report::Reporter;
use crate::traits::SellerApi;

/// A draft that passed the quality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCandidate {
    pub id: u64,
    pub name: String,
    pub quality_level: i64,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<DraftCandidate>,
    pub pages_fetched: u32,
    /// A page or quality fetch failed and the scan stopped early.
    pub aborted: bool,
}

#[derive(Debug, Error)]
enum PageError {
    #[error("Failed to get draft products: {0}")]
    DraftList(String),

    #[error("Failed to get quality info: {0}")]
    QualityInfo(String),

    #[error(transparent)]
    Api(#[from] SellerError),
}

enum PageScan {
    Empty,
    Scanned {
        item_count: u64,
        total: u64,
        page_size: u32,
        qualified: Vec<DraftCandidate>,
    },
}

/// Walks the draft list page by page, keeping drafts at the qualifying
/// quality level.
pub struct ScanStage<'a> {
    api: &'a dyn SellerApi,
    config: &'a PipelineConfig,
    sleeper: &'a dyn Sleeper,
    reporter: &'a Reporter,
    cancelled: &'a AtomicBool,
}

impl<'a> ScanStage<'a> {
    pub fn new(
        api: &'a dyn SellerApi,
        config: &'a PipelineConfig,
        sleeper: &'a dyn Sleeper,
        reporter: &'a Reporter,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self {
            api,
            config,
            sleeper,
            reporter,
            cancelled,
        }
    }

    pub async fn run(&self, stats: &mut RunStats) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut page = 1u32;
        let mut consumed = 0u64;

        self.reporter
            .log("Fetching draft products...", LogLevel::Info)
            .await;

        while !self.cancelled.load(Ordering::Relaxed) {
            let scan = self.scan_page(page).await;
            outcome.pages_fetched += 1;

            match scan {
                Ok(PageScan::Empty) => break,
                Ok(PageScan::Scanned {
                    item_count,
                    total,
                    page_size,
                    qualified,
                }) => {
                    self.reporter
                        .log(
                            &format!(
                                "Found {} qualified products on page {page}",
                                qualified.len()
                            ),
                            LogLevel::Success,
                        )
                        .await;
                    consumed += item_count;
                    outcome.candidates.extend(qualified);

                    let more = u64::from(page) * u64::from(page_size) < total;
                    if total > 0 {
                        let progress = consumed.min(total) as f64 / total as f64 * 50.0;
                        self.reporter
                            .status(
                                &format!(
                                    "Scanning pages... ({} qualified found)",
                                    outcome.candidates.len()
                                ),
                                progress,
                            )
                            .await;
                    }

                    self.sleeper.sleep(self.config.inter_page_delay()).await;
                    if !more {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    self.reporter
                        .log(&format!("Error on page {page}: {e}"), LogLevel::Error)
                        .await;
                    stats.errors += 1;
                    self.reporter.stats(stats).await;
                    self.sleeper.sleep(self.config.inter_page_delay()).await;
                    outcome.aborted = true;
                    break;
                }
            }
        }

        info!(
            pages = outcome.pages_fetched,
            candidates = outcome.candidates.len(),
            aborted = outcome.aborted,
            "Scan finished"
        );
        outcome
    }

    async fn scan_page(&self, page: u32) -> Result<PageScan, PageError> {
        let envelope = self.api.draft_products(page, self.config.page_size).await?;
        if !envelope.is_ok() {
            return Err(PageError::DraftList(envelope.describe()));
        }
        let draft_page: DraftPage = envelope.into_data()?;
        let products = draft_page.products;

        self.reporter
            .log(
                &format!("Page {page}: Found {} products", products.len()),
                LogLevel::Info,
            )
            .await;
        if products.is_empty() {
            return Ok(PageScan::Empty);
        }

        let ids: Vec<u64> = products.iter().map(|p| p.id).collect();
        let envelope = self.api.content_quality_info(&ids).await?;
        if !envelope.is_ok() {
            return Err(PageError::QualityInfo(envelope.describe()));
        }
        let quality: QualityInfo = envelope.into_data()?;

        let threshold = self.config.quality_threshold;
        let qualified: Vec<DraftCandidate> = products
            .iter()
            .filter(|p| quality.level_of(p.id) == Some(threshold))
            .map(|p| DraftCandidate {
                id: p.id,
                name: p.name.clone(),
                quality_level: threshold,
            })
            .collect();
        debug!(page, items = products.len(), qualified = qualified.len(), "Page scanned");

        let page_size = match draft_page.page_info.page_size {
            0 => self.config.page_size.max(1),
            n => n,
        };

        Ok(PageScan::Scanned {
            item_count: products.len() as u64,
            total: draft_page.page_info.total,
            page_size,
            qualified,
        })
    }
}
