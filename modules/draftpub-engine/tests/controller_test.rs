//! End-to-end runs through the controller with every remote seam mocked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use draftpub_common::{
    MemoryStore, PersistedState, PipelineConfig, RunState, RunStats, StateStore,
};
use draftpub_engine::testing::{
    draft_page, numbered_products, Call, EventRecorder, FixedTokens, MockConnector,
    MockSellerApi, RecordingSleeper, Reply, StaticSource,
};
use draftpub_engine::{RunController, RunEvent, RunOutcome, RunSignal};
use seller_client::Sleeper;

const DOMAIN: &str = "seller.shopee.ph";

/// 60 drafts over two pages, six of them at the publishable level.
fn two_page_api() -> MockSellerApi {
    let mut api = MockSellerApi::new()
        .on_page(1, Reply::Ok(draft_page(&numbered_products(1, 50), 60, 50, 1)))
        .on_page(2, Reply::Ok(draft_page(&numbered_products(51, 10), 60, 50, 2)));
    for id in 1..=60 {
        let level = if matches!(id, 1..=3 | 51..=53) { 2 } else { 1 };
        api = api.with_quality(id, level);
    }
    api
}

struct Harness {
    api: Arc<MockSellerApi>,
    connector: Arc<MockConnector>,
    store: Arc<MemoryStore>,
    observer: Arc<EventRecorder>,
    controller: Arc<RunController>,
}

impl Harness {
    fn new(api: MockSellerApi, source: StaticSource, sleeper: Arc<dyn Sleeper>) -> Self {
        Self::with_store(api, source, sleeper, MemoryStore::new(), EventRecorder::new())
    }

    fn with_store(
        api: MockSellerApi,
        source: StaticSource,
        sleeper: Arc<dyn Sleeper>,
        store: MemoryStore,
        observer: EventRecorder,
    ) -> Self {
        let api = Arc::new(api);
        let connector = Arc::new(MockConnector::new(api.clone()));
        let store = Arc::new(store);
        let observer = Arc::new(observer);
        let controller = Arc::new(RunController::new(
            Arc::new(source),
            connector.clone(),
            store.clone(),
            Some(observer.clone()),
            sleeper,
            Arc::new(FixedTokens),
            PipelineConfig::default(),
        ));
        Self {
            api,
            connector,
            store,
            observer,
            controller,
        }
    }

    fn logged(&self, message: &str) -> bool {
        self.observer.log_messages().iter().any(|l| l == message)
    }
}

#[tokio::test]
async fn full_run_publishes_every_qualified_draft() {
    let h = Harness::new(
        two_page_api(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
    );
    h.store.set_enabled(true).unwrap();

    let outcome = h.controller.start(DOMAIN).await.unwrap();

    let expected = RunStats {
        processed: 6,
        published: 6,
        errors: 0,
    };
    assert_eq!(outcome, RunOutcome::Completed(expected));
    assert!(!h.controller.is_running());

    let run = h.controller.snapshot();
    assert_eq!(run.state, RunState::Completed);
    assert_eq!(run.stats, expected);
    assert_eq!(run.progress, 100.0);
    assert_eq!(run.domain.as_deref(), Some(DOMAIN));

    let state = h.store.snapshot();
    assert!(!state.enabled);
    assert_eq!(state.stats, expected);
    assert_eq!(state.current_status.text, "Completed");
    assert_eq!(state.current_status.progress, 100.0);

    assert_eq!(h.api.count(|c| matches!(c, Call::Publish(_))), 6);
    assert_eq!(h.api.count(|c| matches!(c, Call::Delete(_))), 6);
    assert_eq!(h.connector.connections()[0].0, DOMAIN);

    let events = h.observer.events();
    assert!(events.contains(&RunEvent::SessionInitialized));
    assert!(events.contains(&RunEvent::Completed { stats: expected }));
    assert!(h.logged("Total qualified products found: 6"));
    assert!(h.logged("Automation completed. Published: 6, Errors: 0"));

    let progress = h.observer.progress_values();
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&100.0));
}

#[tokio::test]
async fn run_without_qualified_drafts_completes_immediately() {
    let api = MockSellerApi::new()
        .on_page(1, Reply::Ok(draft_page(&numbered_products(1, 5), 5, 50, 1)));
    let h = Harness::new(api, StaticSource::valid(), Arc::new(RecordingSleeper::new()));

    let outcome = h.controller.start(DOMAIN).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed(RunStats::default()));
    assert!(h.logged("No qualified products to publish"));
    assert_eq!(h.api.count(|c| matches!(c, Call::ProductInfo(_))), 0);
}

#[tokio::test]
async fn stop_mid_run_ends_in_stopped() {
    let sleeper = Arc::new(RecordingSleeper::new());
    let h = Harness::new(two_page_api(), StaticSource::valid(), sleeper.clone());
    // Two page delays, then metrics, delete and the gap after the first draft.
    sleeper.arm(5, h.controller.stop_flag());

    let outcome = h.controller.start(DOMAIN).await.unwrap();

    let stats = RunStats {
        processed: 1,
        published: 1,
        errors: 0,
    };
    assert_eq!(outcome, RunOutcome::Stopped(stats));
    assert_eq!(h.controller.snapshot().state, RunState::Stopped);
    assert_eq!(h.api.count(|c| matches!(c, Call::ProductInfo(_))), 1);
    assert!(!h.controller.is_running());

    let status = h.store.snapshot().current_status;
    assert_eq!(status.text, "Stopped");
    assert_eq!(status.progress, 0.0);
}

#[tokio::test]
async fn stop_signal_records_the_request() {
    let h = Harness::new(
        MockSellerApi::new(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
    );
    h.store.set_enabled(true).unwrap();

    h.controller.handle(RunSignal::Stop).await.unwrap();

    let state = h.store.snapshot();
    assert!(!state.enabled);
    assert_eq!(state.current_status.text, "Stopped");
    assert_eq!(state.current_status.progress, 0.0);
    assert!(h.logged("Automation stopped by user"));
    assert!(h.controller.stop_flag().load(Ordering::SeqCst));
}

/// Blocks the first pause until released.
#[derive(Default)]
struct GateSleeper {
    blocked: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Sleeper for GateSleeper {
    async fn sleep(&self, _duration: Duration) {
        if !self.blocked.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[tokio::test]
async fn second_start_while_running_is_a_no_op() {
    let gate = Arc::new(GateSleeper::default());
    let h = Harness::new(two_page_api(), StaticSource::valid(), gate.clone());

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.start(DOMAIN).await });

    gate.entered.notified().await;
    assert!(h.controller.is_running());
    let second = h
        .controller
        .handle(RunSignal::Start {
            domain: DOMAIN.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(second, RunOutcome::AlreadyRunning);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(stats) if stats.published == 6));
    assert_eq!(h.api.count(|c| matches!(c, Call::DraftList { page: 1, .. })), 1);
    assert!(!h.controller.is_running());
}

#[tokio::test]
async fn missing_cds_token_fails_the_run() {
    let h = Harness::new(
        two_page_api(),
        StaticSource::MissingCds,
        Arc::new(RecordingSleeper::new()),
    );
    h.store.set_enabled(true).unwrap();

    let outcome = h.controller.start(DOMAIN).await.unwrap();

    match outcome {
        RunOutcome::Failed { message, stats } => {
            assert_eq!(message, "Missing credential: SPC_CDS cookie not found");
            assert_eq!(stats, RunStats::default());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(h.api.calls().is_empty());
    assert!(!h.controller.is_running());
    assert_eq!(h.controller.snapshot().state, RunState::Failed);
    assert!(!h.store.snapshot().enabled);

    let events = h.observer.events();
    assert!(events.contains(&RunEvent::Error {
        message: "Automation process failed".to_string()
    }));
    assert!(events.contains(&RunEvent::SessionError {
        message: "Missing credential: SPC_CDS cookie not found".to_string()
    }));
    assert!(!events.contains(&RunEvent::SessionInitialized));
    assert!(h.logged("Automation failed: Missing credential: SPC_CDS cookie not found"));
}

#[tokio::test]
async fn invalid_domain_fails_before_any_request() {
    let h = Harness::new(
        two_page_api(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
    );

    let outcome = h.controller.start("not a host").await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(h.api.calls().is_empty());
    assert!(h.connector.connections().is_empty());
}

#[tokio::test]
async fn enabling_an_invalid_domain_persists_nothing() {
    let store = MemoryStore::with_state(PersistedState {
        selected_domain: DOMAIN.to_string(),
        ..PersistedState::default()
    });
    let h = Harness::with_store(
        two_page_api(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
        store,
        EventRecorder::new(),
    );

    let err = h.controller.enable("not a host").unwrap_err();
    assert_eq!(err.to_string(), "Invalid domain: not a host");

    let state = h.store.snapshot();
    assert!(!state.enabled);
    assert_eq!(state.selected_domain, DOMAIN);
    assert_eq!(h.controller.resume().await.unwrap(), RunOutcome::NotEnabled);

    let domain = h.controller.enable("seller.shopee.co.th").unwrap();
    assert_eq!(domain.as_str(), "seller.shopee.co.th");
    let state = h.store.snapshot();
    assert!(state.enabled);
    assert_eq!(state.selected_domain, "seller.shopee.co.th");

    assert!(matches!(
        h.controller.resume().await.unwrap(),
        RunOutcome::Completed(_)
    ));
    assert_eq!(h.connector.connections()[0].0, "seller.shopee.co.th");
}

#[tokio::test]
async fn stats_carry_over_from_the_store() {
    let store = MemoryStore::with_state(PersistedState {
        stats: RunStats {
            processed: 10,
            published: 8,
            errors: 2,
        },
        ..PersistedState::default()
    });
    let h = Harness::with_store(
        two_page_api(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
        store,
        EventRecorder::new(),
    );

    let outcome = h.controller.start(DOMAIN).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed(RunStats {
            processed: 16,
            published: 14,
            errors: 2
        })
    );

    h.controller.reset_stats().unwrap();
    h.controller.clear_logs().unwrap();
    let state = h.store.snapshot();
    assert_eq!(state.stats, RunStats::default());
    assert!(state.logs.is_empty());
}

#[tokio::test]
async fn resume_only_runs_when_enabled() {
    let h = Harness::new(
        two_page_api(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
    );

    assert_eq!(h.controller.resume().await.unwrap(), RunOutcome::NotEnabled);
    assert!(h.api.calls().is_empty());

    h.store
        .update(&mut |s| {
            s.enabled = true;
            s.selected_domain = "custom".to_string();
            s.custom_domain = Some("seller.shopee.co.th".to_string());
        })
        .unwrap();

    let outcome = h.controller.resume().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(h.connector.connections()[0].0, "seller.shopee.co.th");
    assert_eq!(
        h.controller.snapshot().domain.as_deref(),
        Some("seller.shopee.co.th")
    );
}

#[tokio::test]
async fn refused_deliveries_still_reach_the_store() {
    let h = Harness::with_store(
        MockSellerApi::new(),
        StaticSource::valid(),
        Arc::new(RecordingSleeper::new()),
        MemoryStore::new(),
        EventRecorder::refusing(),
    );

    h.controller.start(DOMAIN).await.unwrap();

    let state = h.store.snapshot();
    let texts: Vec<&str> = state.logs.iter().map(|e| e.text.as_str()).collect();
    assert!(texts.iter().any(|t| t.ends_with("] Starting automation process...")));
    assert!(texts
        .iter()
        .any(|t| t.ends_with("] Automation completed. Published: 0, Errors: 0")));
    assert_eq!(state.current_status.text, "Completed");
}
