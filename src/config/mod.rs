//! Configuration layer: typed settings with layered precedence (file → env → CLI).
//!
//! The PostgreSQL connection variables are required. Startup stops with an
//! error naming the first absent one before any listener is bound.

use std::{fmt, net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "moto";
const ENV_PREFIX: &str = "MOTO";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 3_000;

/// Command-line arguments for the moto-transport binary.
#[derive(Debug, Parser)]
#[command(name = "moto-transport", version, about = "moto-transport backend service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "MOTO_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service.
    Serve,
    /// Probe every dependency once, print the health report and exit non-zero when unhealthy.
    Check,
}

/// Values read from CLI flags or their well-known environment variables.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// PostgreSQL host.
    #[arg(long = "db-host", env = "DB_HOST", value_name = "HOST", global = true)]
    pub db_host: Option<String>,

    /// PostgreSQL port.
    #[arg(long = "db-port", env = "DB_PORT", value_name = "PORT", global = true)]
    pub db_port: Option<String>,

    /// PostgreSQL user.
    #[arg(long = "db-username", env = "DB_USERNAME", value_name = "USER", global = true)]
    pub db_username: Option<String>,

    /// PostgreSQL password.
    #[arg(
        long = "db-password",
        env = "DB_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub db_password: Option<String>,

    /// PostgreSQL database name.
    #[arg(long = "db-name", env = "DB_NAME", value_name = "NAME", global = true)]
    pub db_name: Option<String>,

    /// Redis host.
    #[arg(long = "redis-host", env = "REDIS_HOST", value_name = "HOST", global = true)]
    pub redis_host: Option<String>,

    /// Redis port.
    #[arg(long = "redis-port", env = "REDIS_PORT", value_name = "PORT", global = true)]
    pub redis_port: Option<String>,

    /// Redis password.
    #[arg(
        long = "redis-password",
        env = "REDIS_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub redis_password: Option<String>,

    /// HTTP listener host.
    #[arg(long = "host", value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// HTTP listener port.
    #[arg(long = "port", env = "PORT", value_name = "PORT", global = true)]
    pub port: Option<String>,

    /// Deployment environment (development|production|test).
    #[arg(long = "env", env = "APP_ENV", value_name = "ENV", global = true)]
    pub environment: Option<String>,

    /// Per-probe timeout for health checks, in milliseconds.
    #[arg(
        long = "health-timeout-ms",
        env = "HEALTH_TIMEOUT_MS",
        value_name = "MILLIS",
        global = true
    )]
    pub health_timeout_ms: Option<u64>,

    /// Base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", env = "LOG_LEVEL", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        env = "LOG_JSON",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: AppEnvironment,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub health: HealthSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
    Test,
}

impl AppEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, AppEnvironment::Production)
    }
}

impl FromStr for AppEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "unknown environment `{other}` (expected development, production or test)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// A credential whose value never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret,
    pub name: String,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
    pub require_tls: bool,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<Secret>,
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("missing required environment variable: {env}")]
    Missing { key: &'static str, env: &'static str },
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    pub(crate) fn missing(key: &'static str, env: &'static str) -> Self {
        Self::Missing { key, env }
    }

    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    environment: Option<String>,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    health: RawHealthSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(value) = overrides.db_host.as_ref() {
            self.database.host = Some(value.clone());
        }
        if let Some(value) = overrides.db_port.as_ref() {
            self.database.port = Some(value.clone());
        }
        if let Some(value) = overrides.db_username.as_ref() {
            self.database.username = Some(value.clone());
        }
        if let Some(value) = overrides.db_password.as_ref() {
            self.database.password = Some(value.clone());
        }
        if let Some(value) = overrides.db_name.as_ref() {
            self.database.name = Some(value.clone());
        }
        if let Some(value) = overrides.redis_host.as_ref() {
            self.redis.host = Some(value.clone());
        }
        if let Some(value) = overrides.redis_port.as_ref() {
            self.redis.port = Some(value.clone());
        }
        if let Some(value) = overrides.redis_password.as_ref() {
            self.redis.password = Some(value.clone());
        }
        if let Some(value) = overrides.host.as_ref() {
            self.server.host = Some(value.clone());
        }
        if let Some(value) = overrides.port.as_ref() {
            self.server.port = Some(value.clone());
        }
        if let Some(value) = overrides.environment.as_ref() {
            self.environment = Some(value.clone());
        }
        if let Some(value) = overrides.health_timeout_ms {
            self.health.timeout_ms = Some(value);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            environment,
            server,
            logging,
            database,
            redis,
            health,
        } = raw;

        let health_timeout_ms = health.timeout_ms.unwrap_or(DEFAULT_HEALTH_TIMEOUT_MS);

        // Database first so a missing variable is reported ahead of anything else.
        let mut database = build_database_settings(database, health_timeout_ms)?;
        let environment = build_environment(environment)?;
        database.require_tls = environment.is_production();
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let redis = build_redis_settings(redis)?;
        let health = build_health_settings(health)?;

        Ok(Self {
            environment,
            server,
            logging,
            database,
            redis,
            health,
        })
    }
}

fn build_environment(environment: Option<String>) -> Result<AppEnvironment, LoadError> {
    match non_blank(environment) {
        Some(value) => AppEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("environment", reason)),
        None => Ok(AppEnvironment::Development),
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = non_blank(server.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match non_blank(server.port) {
        Some(value) => parse_port(&value, "server.port")?,
        None => DEFAULT_PORT,
    };

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(
    database: RawDatabaseSettings,
    health_timeout_ms: u64,
) -> Result<DatabaseSettings, LoadError> {
    let host = require(database.host, "database.host", "DB_HOST")?;
    let port = require(database.port, "database.port", "DB_PORT")?;
    let username = require(database.username, "database.username", "DB_USERNAME")?;
    let password = require(database.password, "database.password", "DB_PASSWORD")?;
    let name = require(database.name, "database.name", "DB_NAME")?;

    let port = parse_port(&port, "database.port")?;

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS.into()),
        "database.max_connections",
    )?;

    // The pool retries refused connections until the acquire timeout, so it has
    // to give up before the probe deadline for the real error to surface.
    let acquire_timeout_ms = match database.acquire_timeout_ms {
        Some(0) => {
            return Err(LoadError::invalid(
                "database.acquire_timeout_ms",
                "must be greater than zero",
            ));
        }
        Some(ms) if ms >= health_timeout_ms => {
            return Err(LoadError::invalid(
                "database.acquire_timeout_ms",
                format!("must be below the health timeout ({health_timeout_ms}ms)"),
            ));
        }
        Some(ms) => ms,
        None => default_acquire_timeout_ms(health_timeout_ms),
    };

    Ok(DatabaseSettings {
        host,
        port,
        username,
        password: Secret::new(password),
        name,
        max_connections,
        acquire_timeout: Duration::from_millis(acquire_timeout_ms),
        require_tls: false,
    })
}

fn default_acquire_timeout_ms(health_timeout_ms: u64) -> u64 {
    (health_timeout_ms.saturating_mul(2) / 3).max(1)
}

fn build_redis_settings(redis: RawRedisSettings) -> Result<RedisSettings, LoadError> {
    let host = non_blank(redis.host).unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());
    let port = match non_blank(redis.port) {
        Some(value) => parse_port(&value, "redis.port")?,
        None => DEFAULT_REDIS_PORT,
    };
    let password = non_blank(redis.password).map(Secret::new);

    Ok(RedisSettings {
        host,
        port,
        password,
    })
}

fn build_health_settings(health: RawHealthSettings) -> Result<HealthSettings, LoadError> {
    let timeout_ms = health.timeout_ms.unwrap_or(DEFAULT_HEALTH_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "health.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(HealthSettings {
        timeout: Duration::from_millis(timeout_ms),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    host: Option<String>,
    port: Option<String>,
    username: Option<String>,
    password: Option<String>,
    name: Option<String>,
    max_connections: Option<u64>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    host: Option<String>,
    port: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHealthSettings {
    timeout_ms: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn require(
    value: Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, LoadError> {
    non_blank(value).ok_or_else(|| LoadError::missing(key, env))
}

fn parse_port(value: &str, key: &'static str) -> Result<u16, LoadError> {
    let port: u16 = value
        .trim()
        .parse()
        .map_err(|err| LoadError::invalid(key, format!("`{value}` is not a valid port: {err}")))?;
    if port == 0 {
        return Err(LoadError::invalid(key, "port must be greater than zero"));
    }
    Ok(port)
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
