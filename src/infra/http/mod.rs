mod health;
mod middleware;

pub use health::{health_body, health_response, status_code};
pub use middleware::REQUEST_ID_HEADER;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::health::HealthAggregator;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub health: HealthAggregator,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health::readiness))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
