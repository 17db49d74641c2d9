//! Wire types for the moto-transport HTTP surface.
//!
//! The health body follows the `status` / `info` / `error` / `details`
//! convention so existing readiness tooling can read it unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overall state reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Error,
}

/// State of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn up() -> Self {
        Self {
            status: ComponentStatus::Up,
            message: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Down,
            message: Some(message.into()),
        }
    }
}

/// Body of `GET /health`.
///
/// `info` holds the components that are up, `error` the ones that are down,
/// and `details` every component regardless of state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthState,
    #[serde(default)]
    pub info: BTreeMap<String, ComponentHealth>,
    #[serde(default)]
    pub error: BTreeMap<String, ComponentHealth>,
    pub details: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == HealthState::Ok
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.details.get(name)
    }
}

/// Body of `GET /health/live`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: HealthState,
}
