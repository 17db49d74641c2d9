//! Health aggregation: run every registered probe concurrently and fold the
//! outcomes into one report.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::domain::health::{AggregateReport, ProbeResult};

pub const METRIC_PROBE_TOTAL: &str = "moto_health_probe_total";
pub const METRIC_PROBE_MS: &str = "moto_health_probe_ms";
pub const METRIC_HEALTH_STATUS: &str = "moto_health_status";

/// Why a probe reported its dependency as down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Unreachable(String),
    #[error("unexpected reply: expected `{expected}`, got `{actual}`")]
    UnexpectedReply { expected: String, actual: String },
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
    #[error("probe panicked")]
    Panicked,
    #[error("probe was cancelled")]
    Cancelled,
}

impl ProbeError {
    pub fn unreachable(err: impl std::fmt::Display) -> Self {
        Self::Unreachable(err.to_string())
    }

    pub fn unexpected_reply(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// A named, read-only availability check of one dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> Result<(), ProbeError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("probe `{0}` is already registered")]
    Duplicate(String),
}

/// Runs the registered probes and reports the combined outcome.
#[derive(Clone)]
pub struct HealthAggregator {
    probes: Arc<Vec<Arc<dyn Probe>>>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probes: Arc::new(Vec::new()),
            timeout,
        }
    }

    /// Add a probe. Names must be unique since results are keyed by them.
    pub fn register(mut self, probe: Arc<dyn Probe>) -> Result<Self, RegistryError> {
        if self.probes.iter().any(|p| p.name() == probe.name()) {
            return Err(RegistryError::Duplicate(probe.name().to_string()));
        }
        Arc::make_mut(&mut self.probes).push(probe);
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|p| p.name())
    }

    /// Run every probe concurrently, each bounded by the configured timeout.
    ///
    /// Never fails: errors, timeouts and panics inside a probe become a
    /// `Down` result for that probe only. Results follow registration order.
    pub async fn check_health(&self) -> AggregateReport {
        let runs = self
            .probes
            .iter()
            .cloned()
            .map(|probe| run_probe(probe, self.timeout));
        let report = AggregateReport::from_results(join_all(runs).await);

        gauge!(METRIC_HEALTH_STATUS).set(if report.is_ok() { 1.0 } else { 0.0 });
        debug!(
            target = "moto_transport::health",
            status = %report.status(),
            probes = report.results().len(),
            failed = report.failures().count(),
            "health check complete"
        );

        report
    }
}

async fn run_probe(probe: Arc<dyn Probe>, limit: Duration) -> ProbeResult {
    let name = probe.name().to_string();
    let started_at = Instant::now();

    let task = tokio::spawn(async move { probe.check().await });
    let abort = task.abort_handle();

    let outcome = match timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(ProbeError::Panicked),
        Ok(Err(_)) => Err(ProbeError::Cancelled),
        Err(_) => {
            abort.abort();
            Err(ProbeError::TimedOut(limit))
        }
    };

    let result = match outcome {
        Ok(()) => ProbeResult::up(name),
        Err(err) => {
            warn!(
                target = "moto_transport::health",
                probe = %name,
                error = %err,
                "probe reported dependency down"
            );
            ProbeResult::down(name, err.to_string())
        }
    };

    record_probe_metrics(&result, started_at.elapsed());
    result
}

fn record_probe_metrics(result: &ProbeResult, elapsed: Duration) {
    counter!(
        METRIC_PROBE_TOTAL,
        "probe" => result.name.clone(),
        "status" => result.status.as_str()
    )
    .increment(1);
    histogram!(METRIC_PROBE_MS, "probe" => result.name.clone())
        .record(elapsed.as_secs_f64() * 1000.0);
}
