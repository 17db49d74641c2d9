use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use moto_api_types::{ComponentHealth, HealthResponse, HealthState, LivenessResponse};

use crate::application::error::ErrorReport;
use crate::domain::health::{AggregateReport, AggregateStatus, ProbeResult, ProbeStatus};

use super::HttpState;

const SOURCE: &str = "infra::http::health";

pub(super) async fn readiness(State(state): State<HttpState>) -> Response {
    let report = state.health.check_health().await;
    health_response(&report)
}

pub(super) async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: HealthState::Ok,
    })
}

/// HTTP status for a report: 200 when everything is up, 503 otherwise.
pub fn status_code(report: &AggregateReport) -> StatusCode {
    match report.status() {
        AggregateStatus::Ok => StatusCode::OK,
        AggregateStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn health_body(report: &AggregateReport) -> HealthResponse {
    let mut body = HealthResponse {
        status: match report.status() {
            AggregateStatus::Ok => HealthState::Ok,
            AggregateStatus::Error => HealthState::Error,
        },
        info: Default::default(),
        error: Default::default(),
        details: Default::default(),
    };

    for result in report.results() {
        let component = component_health(result);
        match result.status {
            ProbeStatus::Up => body.info.insert(result.name.clone(), component.clone()),
            ProbeStatus::Down => body.error.insert(result.name.clone(), component.clone()),
        };
        body.details.insert(result.name.clone(), component);
    }

    body
}

fn component_health(result: &ProbeResult) -> ComponentHealth {
    match result.status {
        ProbeStatus::Up => ComponentHealth::up(),
        ProbeStatus::Down => {
            ComponentHealth::down(result.detail.clone().unwrap_or_else(|| "down".to_string()))
        }
    }
}

pub fn health_response(report: &AggregateReport) -> Response {
    let status = status_code(report);
    let mut response = (status, Json(health_body(report))).into_response();

    if !report.is_ok() {
        ErrorReport::from_messages(
            SOURCE,
            status,
            report.failures().map(|result| {
                format!(
                    "{}: {}",
                    result.name,
                    result.detail.as_deref().unwrap_or("down")
                )
            }),
        )
        .attach(&mut response);
    }

    response
}

#[cfg(test)]
mod tests {
    use moto_api_types::ComponentStatus;

    use super::*;

    #[test]
    fn healthy_report_maps_to_ok_body() {
        let report =
            AggregateReport::from_results(vec![ProbeResult::up("database"), ProbeResult::up("redis")]);

        let body = health_body(&report);

        assert_eq!(status_code(&report), StatusCode::OK);
        assert_eq!(body.status, HealthState::Ok);
        assert_eq!(body.info.len(), 2);
        assert!(body.error.is_empty());
        assert_eq!(body.details["database"], ComponentHealth::up());
        assert_eq!(body.details["redis"], ComponentHealth::up());
    }

    #[test]
    fn failed_probe_lands_in_error_and_details() {
        let report = AggregateReport::from_results(vec![
            ProbeResult::down("database", "connection refused"),
            ProbeResult::up("redis"),
        ]);

        let body = health_body(&report);

        assert_eq!(status_code(&report), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, HealthState::Error);
        assert_eq!(
            body.error.get("database").and_then(|c| c.message.as_deref()),
            Some("connection refused")
        );
        assert!(body.info.contains_key("redis"));
        assert!(!body.info.contains_key("database"));
        assert_eq!(body.details["database"].status, ComponentStatus::Down);
        assert_eq!(body.details["redis"].status, ComponentStatus::Up);
    }

    #[test]
    fn unhealthy_response_carries_error_report() {
        let report =
            AggregateReport::from_results(vec![ProbeResult::down("redis", "timed out after 3000ms")]);

        let response = health_response(&report);
        let attached = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");

        assert_eq!(attached.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(attached.messages, ["redis: timed out after 3000ms"]);
    }
}
