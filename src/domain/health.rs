//! Health outcomes: per-probe results and the aggregate report built from them.

use std::fmt;

/// Whether a single dependency answered its probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub status: ProbeStatus,
    pub detail: Option<String>,
}

impl ProbeResult {
    pub fn up(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Up,
            detail: None,
        }
    }

    pub fn down(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProbeStatus::Down,
            detail: Some(detail.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Up
    }
}

/// Overall verdict across every probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateStatus {
    Ok,
    Error,
}

impl AggregateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateStatus::Ok => "ok",
            AggregateStatus::Error => "error",
        }
    }
}

impl fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe results plus the overall status derived from them.
///
/// The status is computed on construction and cannot be set independently:
/// it is `Error` exactly when at least one result is `Down`. Results keep the
/// order they were supplied in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    status: AggregateStatus,
    results: Vec<ProbeResult>,
}

impl AggregateReport {
    pub fn from_results(results: Vec<ProbeResult>) -> Self {
        let status = if results.iter().all(ProbeResult::is_up) {
            AggregateStatus::Ok
        } else {
            AggregateStatus::Error
        };
        Self { status, results }
    }

    pub fn status(&self) -> AggregateStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == AggregateStatus::Ok
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|result| result.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|result| !result.is_up())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_up_is_ok() {
        let report =
            AggregateReport::from_results(vec![ProbeResult::up("database"), ProbeResult::up("redis")]);

        assert!(report.is_ok());
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn single_down_flips_status() {
        let report = AggregateReport::from_results(vec![
            ProbeResult::down("database", "connection refused"),
            ProbeResult::up("redis"),
        ]);

        assert_eq!(report.status(), AggregateStatus::Error);
        let failed: Vec<_> = report.failures().map(|r| r.name.as_str()).collect();
        assert_eq!(failed, ["database"]);
        assert_eq!(
            report.result("redis").map(|r| r.status),
            Some(ProbeStatus::Up)
        );
    }

    #[test]
    fn empty_report_is_ok() {
        let report = AggregateReport::from_results(Vec::new());
        assert!(report.is_ok());
        assert!(report.results().is_empty());
    }
}
