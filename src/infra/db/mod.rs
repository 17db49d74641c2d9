//! Postgres connectivity used by the database health probe.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode},
    query,
};

use crate::application::{health::ProbeError, probes::DatabasePing};
use crate::config::DatabaseSettings;

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Build a pool that opens connections on first use, so an unavailable
    /// database shows up in health reports instead of aborting startup.
    pub fn connect_lazy(settings: &DatabaseSettings) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(Self::connect_options(settings));
        Self::new(pool)
    }

    pub fn connect_options(settings: &DatabaseSettings) -> PgConnectOptions {
        let ssl_mode = if settings.require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.username)
            .password(settings.password.expose())
            .database(&settings.name)
            .ssl_mode(ssl_mode)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DatabasePing for PostgresDatabase {
    async fn ping(&self) -> Result<(), ProbeError> {
        self.health_check().await.map_err(ProbeError::unreachable)
    }
}
