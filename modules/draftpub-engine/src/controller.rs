use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use draftpub_common::{LogLevel, PipelineConfig, RunState, RunStats, StateStore};
use seller_client::{SellerDomain, Sleeper, TokenSynthesizer};

use crate::error::{Result, RunError};
use crate::events::RunObserver;
use crate::publish::PublishPipeline;
use crate::report::Reporter;
use crate::scan::ScanStage;
use crate::session::CredentialSource;
use crate::traits::ApiConnector;

/// The current (or last) automation session as the controller sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Run {
    pub state: RunState,
    pub stats: RunStats,
    pub progress: f64,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSignal {
    Start { domain: String },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another run held the guard; nothing happened.
    AlreadyRunning,
    /// `resume()` found automation switched off.
    NotEnabled,
    Completed(RunStats),
    Stopped(RunStats),
    Failed { message: String, stats: RunStats },
}

/// Owns the single-run guard and sequences a run: credentials, scan, publish.
pub struct RunController {
    source: Arc<dyn CredentialSource>,
    connector: Arc<dyn ApiConnector>,
    reporter: Reporter,
    sleeper: Arc<dyn Sleeper>,
    tokens: Arc<dyn TokenSynthesizer>,
    config: PipelineConfig,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

/// Clears the running flag however the run ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RunController {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        connector: Arc<dyn ApiConnector>,
        store: Arc<dyn StateStore>,
        observer: Option<Arc<dyn RunObserver>>,
        sleeper: Arc<dyn Sleeper>,
        tokens: Arc<dyn TokenSynthesizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            connector,
            reporter: Reporter::new(store, observer),
            sleeper,
            tokens,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Run {
        self.reporter.snapshot()
    }

    /// Shared cancel flag, for wiring into a signal handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_requested.clone()
    }

    pub async fn handle(&self, signal: RunSignal) -> Result<RunOutcome> {
        match signal {
            RunSignal::Start { domain } => self.start(&domain).await,
            RunSignal::Stop => {
                self.stop().await?;
                Ok(RunOutcome::Stopped(self.snapshot().stats))
            }
        }
    }

    /// Run to completion. A no-op while another run holds the guard.
    pub async fn start(&self, domain: &str) -> Result<RunOutcome> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!(domain, "Run already active, ignoring start");
            return Ok(RunOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(self.running.clone());
        self.stop_requested.store(false, Ordering::SeqCst);

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, domain);
        self.execute(domain).instrument(span).await
    }

    /// Start a run if the persisted state says automation is switched on.
    pub async fn resume(&self) -> Result<RunOutcome> {
        let state = self.reporter.store().load()?;
        if !state.enabled {
            return Ok(RunOutcome::NotEnabled);
        }
        let domain = state.effective_domain().to_string();
        info!(domain = domain.as_str(), "Resuming enabled automation");
        self.start(&domain).await
    }

    /// Switch automation on for `domain`. Nothing is persisted unless the
    /// host parses.
    pub fn enable(&self, domain: &str) -> Result<SellerDomain> {
        let parsed =
            SellerDomain::parse(domain).map_err(|_| RunError::InvalidDomain(domain.to_string()))?;
        let selected = parsed.to_string();
        self.reporter.store().update(&mut |s| {
            s.enabled = true;
            s.selected_domain = selected.clone();
        })?;
        info!(domain = selected.as_str(), "Automation enabled");
        Ok(parsed)
    }

    /// Cooperative: the run notices between pages and between candidates.
    pub async fn stop(&self) -> Result<()> {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.reporter
            .log("Automation stopped by user", LogLevel::Info)
            .await;
        self.reporter.status("Stopped", 0.0).await;
        self.reporter.store().set_enabled(false)?;
        if self.is_running() {
            self.reporter.set_state(RunState::Stopped);
        }
        Ok(())
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.reporter.store().reset_stats()?;
        info!("Stats reset");
        Ok(())
    }

    pub fn clear_logs(&self) -> Result<()> {
        self.reporter.store().clear_logs()?;
        info!("Logs cleared");
        Ok(())
    }

    async fn execute(&self, domain: &str) -> Result<RunOutcome> {
        let mut stats = match self.reporter.store().load() {
            Ok(state) => state.stats,
            Err(e) => {
                warn!(error = %e, "Could not load persisted stats, starting from zero");
                RunStats::default()
            }
        };
        self.reporter.begin(domain, stats);

        match self.run_inner(domain, &mut stats).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Run failed");
                self.reporter.set_state(RunState::Failed);
                self.reporter
                    .log(&format!("Automation failed: {message}"), LogLevel::Error)
                    .await;
                self.reporter.error("Automation process failed").await;
                self.reporter.session_error(&message).await;
                if let Err(e) = self.reporter.store().set_enabled(false) {
                    warn!(error = %e, "Failed to clear enabled flag");
                }
                Ok(RunOutcome::Failed { message, stats })
            }
        }
    }

    async fn run_inner(&self, domain: &str, stats: &mut RunStats) -> Result<RunOutcome> {
        self.reporter
            .log("Starting automation process...", LogLevel::Info)
            .await;
        self.reporter
            .log(
                "Using slow mode to prevent rate limiting (long delays between products)",
                LogLevel::Warning,
            )
            .await;
        self.reporter.status("Initializing...", 0.0).await;

        let domain =
            SellerDomain::parse(domain).map_err(|_| RunError::InvalidDomain(domain.to_string()))?;

        self.reporter
            .log("Extracting session tokens from browser...", LogLevel::Info)
            .await;
        let credentials = self.source.acquire(&domain).await?;
        self.reporter
            .log(
                &format!("Using headers: {}", credentials.header_names().join(", ")),
                LogLevel::Info,
            )
            .await;
        self.reporter.session_initialized().await;
        self.reporter
            .log(
                "Session initialized successfully - Starting automation process",
                LogLevel::Info,
            )
            .await;

        let api = self.connector.connect(domain, credentials);
        let cancelled = self.stop_requested.as_ref();

        self.reporter.set_state(RunState::Scanning);
        let scan = ScanStage::new(
            api.as_ref(),
            &self.config,
            self.sleeper.as_ref(),
            &self.reporter,
            cancelled,
        )
        .run(stats)
        .await;

        if self.is_stopped() {
            return Ok(self.stopped(stats).await);
        }

        self.reporter
            .log(
                &format!("Total qualified products found: {}", scan.candidates.len()),
                LogLevel::Success,
            )
            .await;

        if scan.candidates.is_empty() {
            self.reporter
                .log("No qualified products to publish", LogLevel::Info)
                .await;
            return Ok(self.complete(stats).await);
        }

        self.reporter.set_state(RunState::Publishing);
        PublishPipeline::new(
            api.as_ref(),
            &self.config,
            self.sleeper.as_ref(),
            self.tokens.as_ref(),
            &self.reporter,
            cancelled,
        )
        .run(&scan.candidates, stats)
        .await;

        if self.is_stopped() {
            return Ok(self.stopped(stats).await);
        }
        Ok(self.complete(stats).await)
    }

    fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    async fn stopped(&self, stats: &RunStats) -> RunOutcome {
        // The candidate in flight at stop time may have overwritten the status.
        self.reporter.status("Stopped", 0.0).await;
        self.reporter.set_state(RunState::Stopped);
        info!(%stats, "Run stopped");
        RunOutcome::Stopped(*stats)
    }

    async fn complete(&self, stats: &RunStats) -> RunOutcome {
        self.reporter.status("Completed", 100.0).await;
        if let Err(e) = self.reporter.store().set_enabled(false) {
            warn!(error = %e, "Failed to clear enabled flag");
        }
        self.reporter.set_state(RunState::Completed);
        self.reporter.completed(stats).await;
        self.reporter
            .log(
                &format!(
                    "Automation completed. Published: {}, Errors: {}",
                    stats.published, stats.errors
                ),
                LogLevel::Success,
            )
            .await;
        RunOutcome::Completed(*stats)
    }
}
