//! moto-transport backend: validated startup configuration and dependency health checks.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
