//! Dependency probes built on narrow ping capabilities of the clients.

use std::sync::Arc;

use async_trait::async_trait;

use super::health::{Probe, ProbeError};

pub const DATABASE_PROBE: &str = "database";
pub const CACHE_PROBE: &str = "redis";

/// Reply a healthy cache sends to `PING`.
pub const CACHE_PING_SENTINEL: &str = "PONG";

/// Connectivity check against the relational database.
#[async_trait]
pub trait DatabasePing: Send + Sync {
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// Round-trip check against the cache; returns the raw reply.
#[async_trait]
pub trait CachePing: Send + Sync {
    async fn ping(&self) -> Result<String, ProbeError>;
}

/// Reports the database up whenever its ping returns without error.
pub struct DatabaseProbe {
    client: Arc<dyn DatabasePing>,
}

impl DatabaseProbe {
    pub fn new(client: Arc<dyn DatabasePing>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    fn name(&self) -> &str {
        DATABASE_PROBE
    }

    async fn check(&self) -> Result<(), ProbeError> {
        self.client.ping().await
    }
}

/// Reports the cache up only when its ping reply equals the sentinel.
///
/// Stricter than [`DatabaseProbe`]: a reply that arrives but carries the
/// wrong content still counts as down.
pub struct CacheProbe {
    client: Arc<dyn CachePing>,
    sentinel: String,
}

impl CacheProbe {
    pub fn new(client: Arc<dyn CachePing>) -> Self {
        Self::with_sentinel(client, CACHE_PING_SENTINEL)
    }

    pub fn with_sentinel(client: Arc<dyn CachePing>, sentinel: impl Into<String>) -> Self {
        Self {
            client,
            sentinel: sentinel.into(),
        }
    }
}

#[async_trait]
impl Probe for CacheProbe {
    fn name(&self) -> &str {
        CACHE_PROBE
    }

    async fn check(&self) -> Result<(), ProbeError> {
        let reply = self.client.ping().await?;
        if reply == self.sentinel {
            Ok(())
        } else {
            Err(ProbeError::unexpected_reply(&self.sentinel, reply))
        }
    }
}
