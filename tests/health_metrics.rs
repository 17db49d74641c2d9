use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use moto_transport::application::health::{
    HealthAggregator, METRIC_HEALTH_STATUS, METRIC_PROBE_MS, METRIC_PROBE_TOTAL, Probe, ProbeError,
};

struct Fixed {
    name: &'static str,
    healthy: bool,
}

#[async_trait]
impl Probe for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<(), ProbeError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ProbeError::unreachable("connection reset"))
        }
    }
}

#[tokio::test]
async fn health_checks_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let aggregator = HealthAggregator::new(Duration::from_secs(1))
        .register(Arc::new(Fixed {
            name: "database",
            healthy: true,
        }))
        .and_then(|agg| {
            agg.register(Arc::new(Fixed {
                name: "redis",
                healthy: false,
            }))
        })
        .expect("unique probe names");

    let report = aggregator.check_health().await;
    assert!(!report.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [METRIC_PROBE_TOTAL, METRIC_PROBE_MS, METRIC_HEALTH_STATUS] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<(String, String)> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == METRIC_PROBE_TOTAL)
        .map(|(composite_key, _, _, _)| {
            let label = |name: &str| {
                composite_key
                    .key()
                    .labels()
                    .find(|l| l.key() == name)
                    .map(|l| l.value().to_string())
                    .unwrap_or_default()
            };
            (label("probe"), label("status"))
        })
        .collect();

    assert!(outcomes.contains(&("database".to_string(), "up".to_string())));
    assert!(outcomes.contains(&("redis".to_string(), "down".to_string())));
}
