//! Publish pipeline: per-candidate flow, rate-limit backoff and the
//! best-effort follow-up calls.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use draftpub_common::{MemoryStore, PipelineConfig, RunStats};
use draftpub_engine::publish::PublishPipeline;
use draftpub_engine::report::Reporter;
use draftpub_engine::scan::DraftCandidate;
use draftpub_engine::testing::{
    Call, EventRecorder, FixedTokens, MockSellerApi, RecordingSleeper, Reply,
};

const METRICS: Duration = Duration::from_millis(1_000);
const DELETE: Duration = Duration::from_millis(500);
const BETWEEN: Duration = Duration::from_millis(5_000);

fn candidate(id: u64) -> DraftCandidate {
    DraftCandidate {
        id,
        name: format!("Draft {id}"),
        quality_level: 2,
    }
}

struct Harness {
    observer: Arc<EventRecorder>,
    reporter: Reporter,
    sleeper: RecordingSleeper,
    config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
}

impl Harness {
    fn new() -> Self {
        let observer = Arc::new(EventRecorder::new());
        Self {
            reporter: Reporter::new(Arc::new(MemoryStore::new()), Some(observer.clone())),
            observer,
            sleeper: RecordingSleeper::new(),
            config: PipelineConfig::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn run(&self, api: &MockSellerApi, candidates: &[DraftCandidate]) -> RunStats {
        let mut stats = RunStats::default();
        PublishPipeline::new(
            api,
            &self.config,
            &self.sleeper,
            &FixedTokens,
            &self.reporter,
            &self.cancelled,
        )
        .run(candidates, &mut stats)
        .await;
        stats
    }

    fn logged(&self, message: &str) -> bool {
        self.observer.log_messages().iter().any(|l| l == message)
    }
}

#[tokio::test]
async fn each_candidate_is_published_reported_and_deleted() {
    let h = Harness::new();
    let api = MockSellerApi::new();

    let stats = h.run(&api, &[candidate(1), candidate(2)]).await;

    assert_eq!(
        stats,
        RunStats {
            processed: 2,
            published: 2,
            errors: 0
        }
    );
    assert_eq!(
        api.calls(),
        vec![
            Call::ProductInfo(1),
            Call::Publish(1),
            Call::Metrics(1),
            Call::Delete(vec![1]),
            Call::ProductInfo(2),
            Call::Publish(2),
            Call::Metrics(2),
            Call::Delete(vec![2]),
        ]
    );
    assert_eq!(
        h.sleeper.sleeps(),
        vec![METRICS, DELETE, BETWEEN, METRICS, DELETE, BETWEEN]
    );
    assert_eq!(h.observer.progress_values(), vec![75.0, 100.0]);

    assert!(h.logged("Processing: Draft 1"));
    assert!(h.logged("Successfully published: Draft 1"));
    assert!(h.logged("Reported metrics for: Draft 1"));
    assert!(h.logged("Deleted draft product: Draft 2"));

    let published = api.published();
    assert_eq!(published[0].product_id, 1);
    assert!(published[0].is_draft);
    let report = &api.reports()[0].metrics[0];
    let payload: serde_json::Value = serde_json::from_str(&report.payload).unwrap();
    assert_eq!(payload["session_id"], "1700000000000424242");
}

#[tokio::test]
async fn repeated_rate_limits_back_off_three_times_then_count_one_error() {
    let h = Harness::new();
    let api = MockSellerApi::new().on_publish(7, vec![Reply::RateLimited { status: 403 }; 3]);

    let stats = h.run(&api, &[candidate(7)]).await;

    assert_eq!(
        stats,
        RunStats {
            processed: 1,
            published: 0,
            errors: 1
        }
    );
    assert_eq!(api.count(|c| matches!(c, Call::Publish(7))), 3);
    assert_eq!(api.count(|c| matches!(c, Call::Metrics(_))), 0);
    assert_eq!(api.count(|c| matches!(c, Call::Delete(_))), 0);

    let sleeps = h.sleeper.sleeps();
    assert_eq!(sleeps.len(), 4);
    for (attempt, wait) in sleeps[..3].iter().enumerate() {
        let base = Duration::from_secs(30 * (attempt as u64 + 1));
        assert!(*wait >= base, "attempt {attempt}: {wait:?}");
        assert!(*wait <= base + Duration::from_secs(10), "attempt {attempt}: {wait:?}");
    }
    assert!(sleeps[0] < sleeps[1] && sleeps[1] < sleeps[2]);
    assert_eq!(sleeps[3], BETWEEN);

    let logs = h.observer.log_messages();
    assert!(logs.iter().any(|l| l.starts_with("Rate limited, waiting")
        && l.ends_with("before retry 1/3...")));
    assert!(logs.iter().any(|l| l.ends_with("after final attempt 3/3...")));
    assert!(logs.iter().any(|l| l.starts_with("Failed to publish Draft 7: Rate limited")));
}

#[tokio::test]
async fn rate_limit_then_success_publishes() {
    let h = Harness::new();
    let api = MockSellerApi::new().on_publish(
        3,
        vec![Reply::code(1, "Too many requests, slow down")],
    );

    let stats = h.run(&api, &[candidate(3)]).await;

    assert_eq!(stats.published, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(api.count(|c| matches!(c, Call::Publish(3))), 2);
    let sleeps = h.sleeper.sleeps();
    assert_eq!(sleeps.len(), 4);
    assert!(sleeps[0] >= Duration::from_secs(30) && sleeps[0] <= Duration::from_secs(40));
    assert_eq!(&sleeps[1..], &[METRICS, DELETE, BETWEEN]);
}

#[tokio::test]
async fn other_rejections_fail_without_retry() {
    let h = Harness::new();
    let api = MockSellerApi::new().on_publish(4, vec![Reply::code(10004, "category invalid")]);

    let stats = h.run(&api, &[candidate(4), candidate(5)]).await;

    assert_eq!(
        stats,
        RunStats {
            processed: 2,
            published: 1,
            errors: 1
        }
    );
    assert_eq!(api.count(|c| matches!(c, Call::Publish(4))), 1);
    assert!(h.logged("Failed to publish Draft 4: Publish failed (code: 10004) - category invalid"));
    assert_eq!(h.sleeper.sleeps()[0], BETWEEN);
}

#[tokio::test]
async fn detail_failure_skips_publish() {
    let h = Harness::new();
    let api = MockSellerApi::new().on_detail(9, Reply::code(404, "product not found"));

    let stats = h.run(&api, &[candidate(9)]).await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(api.calls(), vec![Call::ProductInfo(9)]);
    assert!(h.logged("Failed to publish Draft 9: Failed to get product info: product not found"));
}

#[tokio::test]
async fn follow_up_failures_only_warn() {
    let h = Harness::new();
    let api = MockSellerApi::new()
        .on_metrics(Reply::code(2, "bad report"))
        .on_delete(Reply::Http {
            status: 500,
            message: "boom".into(),
        });

    let stats = h.run(&api, &[candidate(6)]).await;

    assert_eq!(
        stats,
        RunStats {
            processed: 1,
            published: 1,
            errors: 0
        }
    );
    assert_eq!(api.count(|c| matches!(c, Call::Delete(_))), 1);
    assert!(h.logged("Metrics reporting failed: bad report (code: 2)"));
    assert!(h.logged("Product deletion failed: HTTP 500: boom"));
}

#[tokio::test]
async fn stop_between_candidates_leaves_the_rest() {
    let h = Harness::new();
    let api = MockSellerApi::new();
    h.sleeper.arm(3, h.cancelled.clone());

    let stats = h.run(&api, &[candidate(1), candidate(2), candidate(3)]).await;

    assert_eq!(stats.processed, 1);
    assert_eq!(api.count(|c| matches!(c, Call::ProductInfo(_))), 1);
}
