use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use moto_api_types::{ComponentStatus, HealthResponse, HealthState, LivenessResponse};
use moto_transport::application::health::{HealthAggregator, ProbeError};
use moto_transport::application::probes::{CachePing, CacheProbe, DatabasePing, DatabaseProbe};
use moto_transport::infra::http::{HttpState, REQUEST_ID_HEADER, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

enum DbBehaviour {
    Healthy,
    Refused,
    Hang,
}

struct FakeDatabase(DbBehaviour);

#[async_trait]
impl DatabasePing for FakeDatabase {
    async fn ping(&self) -> Result<(), ProbeError> {
        match self.0 {
            DbBehaviour::Healthy => Ok(()),
            DbBehaviour::Refused => Err(ProbeError::unreachable(
                "error communicating with database: Connection refused (os error 111)",
            )),
            DbBehaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

struct FakeCache(&'static str);

#[async_trait]
impl CachePing for FakeCache {
    async fn ping(&self) -> Result<String, ProbeError> {
        Ok(self.0.to_string())
    }
}

fn router(db: DbBehaviour, cache_reply: &'static str, timeout: Duration) -> Router {
    let health = HealthAggregator::new(timeout)
        .register(Arc::new(DatabaseProbe::new(Arc::new(FakeDatabase(db)))))
        .and_then(|agg| agg.register(Arc::new(CacheProbe::new(Arc::new(FakeCache(cache_reply))))))
        .expect("unique probe names");

    build_router(HttpState { health })
}

async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn json_body(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be json")
}

#[tokio::test]
async fn all_dependencies_up_returns_ok() {
    let app = router(DbBehaviour::Healthy, "PONG", Duration::from_secs(3));

    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "info": {
                "database": { "status": "up" },
                "redis": { "status": "up" }
            },
            "error": {},
            "details": {
                "database": { "status": "up" },
                "redis": { "status": "up" }
            }
        })
    );
}

#[tokio::test]
async fn refused_database_returns_service_unavailable() {
    let app = router(DbBehaviour::Refused, "PONG", Duration::from_secs(3));

    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: HealthResponse =
        serde_json::from_value(json_body(response).await).expect("health response shape");
    assert_eq!(body.status, HealthState::Error);

    let database = body.component("database").expect("database entry");
    assert_eq!(database.status, ComponentStatus::Down);
    assert!(
        database
            .message
            .as_deref()
            .is_some_and(|m| m.contains("Connection refused"))
    );
    assert_eq!(
        body.component("redis").map(|c| c.status),
        Some(ComponentStatus::Up)
    );
    assert!(body.error.contains_key("database"));
    assert!(body.info.contains_key("redis"));
}

#[tokio::test]
async fn unexpected_cache_reply_marks_redis_down() {
    let app = router(DbBehaviour::Healthy, "LOADING", Duration::from_secs(3));

    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["details"]["database"]["status"], "up");
    assert_eq!(body["details"]["redis"]["status"], "down");
    assert_eq!(
        body["details"]["redis"]["message"],
        "unexpected reply: expected `PONG`, got `LOADING`"
    );
}

#[tokio::test(start_paused = true)]
async fn hanging_database_is_reported_after_timeout() {
    let app = router(DbBehaviour::Hang, "PONG", Duration::from_secs(2));

    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["details"]["database"]["status"], "down");
    assert_eq!(
        body["details"]["database"]["message"],
        "timed out after 2000ms"
    );
    assert_eq!(body["details"]["redis"]["status"], "up");
}

#[tokio::test]
async fn repeated_requests_report_the_same_state() {
    let app = router(DbBehaviour::Refused, "PONG", Duration::from_secs(3));

    let first = get(&app, "/health").await;
    let first_status = first.status();
    let first_body = json_body(first).await;
    let second = get(&app, "/health").await;
    let second_status = second.status();
    let second_body = json_body(second).await;

    assert_eq!(first_status, second_status);
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn liveness_does_not_probe_dependencies() {
    let app = router(DbBehaviour::Refused, "LOADING", Duration::from_secs(3));

    let response = get(&app, "/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: LivenessResponse =
        serde_json::from_value(json_body(response).await).expect("liveness shape");
    assert_eq!(body.status, HealthState::Ok);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = router(DbBehaviour::Healthy, "PONG", Duration::from_secs(3));

    let response = get(&app, "/healthz").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
