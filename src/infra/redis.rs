//! Redis connectivity used by the cache health probe.

use async_trait::async_trait;
use url::Url;

use crate::application::{health::ProbeError, probes::CachePing};
use crate::config::RedisSettings;

use super::error::InfraError;

/// Redis handle that opens its own connection for every ping.
///
/// Nothing is dialled at construction, so startup never blocks on Redis.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn open(settings: &RedisSettings) -> Result<Self, InfraError> {
        let url = Self::connection_url(settings)?;
        let client = redis::Client::open(url.as_str())
            .map_err(|err| InfraError::cache(format!("invalid redis connection info: {err}")))?;
        Ok(Self { client })
    }

    pub fn connection_url(settings: &RedisSettings) -> Result<Url, InfraError> {
        let base = format!("redis://{}:{}", settings.host, settings.port);
        let mut url = Url::parse(&base).map_err(|err| {
            InfraError::configuration(format!("invalid redis address `{base}`: {err}"))
        })?;

        if let Some(password) = settings.password.as_ref() {
            url.set_password(Some(password.expose())).map_err(|_| {
                InfraError::configuration(format!("cannot attach password to `{base}`"))
            })?;
        }

        Ok(url)
    }
}

#[async_trait]
impl CachePing for RedisCache {
    async fn ping(&self) -> Result<String, ProbeError> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(ProbeError::unreachable)?;

        let reply: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(ProbeError::unreachable)?;

        Ok(reply)
    }
}
