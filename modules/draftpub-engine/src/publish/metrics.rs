//! Synthetic usage telemetry sent after a publish, shaped like what the
//! seller centre's own editor reports.

use rand::Rng;
use serde_json::{json, Value};

use seller_client::{MetricsEntry, MetricsReport, ProductInfo};

pub const REPORT_MODULE: &str = "mpsku-detail-page";
/// Event operation code for "publish".
pub const PUBLISH_OPERATION: u32 = 8;
pub const DEFAULT_CATEGORY_PATH: [u64; 3] = [100639, 100737, 101386];
pub const AB_TEST_GROUPS: [u64; 11] = [
    539604, 506718, 506722, 530960, 507514, 531129, 493412, 506724, 517185, 0, 490408,
];

const NAME_LIMIT: usize = 50;

/// The randomized parts of one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsTiming {
    /// Total editing time, 3000..=9999 ms.
    pub event_duration_ms: u64,
    /// Basic-info panel latency, 500..=2499 ms.
    pub panel_latency_ms: u64,
}

impl MetricsTiming {
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            event_duration_ms: rng.random_range(3_000..10_000),
            panel_latency_ms: rng.random_range(500..2_500),
        }
    }
}

pub fn build_metrics_report(
    product_id: u64,
    product_name: &str,
    info: Option<&ProductInfo>,
    session_id: &str,
    timing: MetricsTiming,
) -> MetricsReport {
    let duration = timing.event_duration_ms;

    let category_path: Vec<u64> = info
        .and_then(|i| i.category_path.clone())
        .unwrap_or_else(|| DEFAULT_CATEGORY_PATH.to_vec());
    let attributes: Vec<Value> = info.and_then(|i| i.attributes.clone()).unwrap_or_default();
    let brand = info.and_then(|i| i.brand_info.as_ref());
    let brand_name = brand
        .and_then(|b| b.brand_name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "No brand".to_string());
    let brand_id = brand.and_then(|b| b.brand_id).unwrap_or(0);
    let short_name: String = product_name.chars().take(NAME_LIMIT).collect();

    let payload = json!({
        "session_id": session_id,
        "tss_action": "",
        "event_duration_old": duration,
        "event_duration_v2": duration * 6 / 10,
        "abnormal_tracker": {},
        "items": [{
            "item_id": 0,
            "item_status": 10,
            "category_id": category_path,
            "panels": [{"name": "basicInfoPanel", "latency": timing.panel_latency_ms}],
            "fields": [],
            "rcmd": [
                {"name": "name", "group_id": "", "final_val": short_name},
                {"name": "categoryPath", "group_id": "", "final_val": category_path},
                {"name": "attribute", "group_id": "", "final_val": attributes},
                {"name": "variation", "group_id": "", "final_val": []},
                {"name": "brand", "final_val": {"brand_name": brand_name, "brand_id": brand_id}}
            ],
            "preqc": {"snapshots": [], "final": {"rules": []}}
        }],
        "execute_ab_test_group": AB_TEST_GROUPS,
    });

    MetricsReport {
        metrics: vec![MetricsEntry {
            product_id,
            report_module: REPORT_MODULE.to_string(),
            event_duration: duration,
            success_count: 1,
            total_count: 1,
            payload: payload.to_string(),
            event_operation: PUBLISH_OPERATION,
        }],
    }
}
