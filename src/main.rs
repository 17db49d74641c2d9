use std::{process, sync::Arc};

use moto_transport::{
    application::{
        error::AppError,
        health::HealthAggregator,
        probes::{CacheProbe, DatabaseProbe},
    },
    config,
    infra::{
        db::PostgresDatabase,
        error::InfraError,
        http::{self, HttpState},
        redis::RedisCache,
        telemetry,
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(error) => {
            report_application_error(&error);
            process::exit(1);
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<i32, AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command.unwrap_or(config::Command::Serve) {
        config::Command::Serve => run_serve(settings).await.map(|()| 0),
        config::Command::Check => run_check(settings).await,
    }
}

struct ApplicationContext {
    database: PostgresDatabase,
    health: HealthAggregator,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let database = PostgresDatabase::connect_lazy(&settings.database);
    let cache = RedisCache::open(&settings.redis)?;

    let health = HealthAggregator::new(settings.health.timeout)
        .register(Arc::new(DatabaseProbe::new(Arc::new(database.clone()))))?
        .register(Arc::new(CacheProbe::new(Arc::new(cache))))?;

    Ok(ApplicationContext { database, health })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "moto_transport::serve",
        addr = %settings.server.addr,
        environment = ?settings.environment,
        probes = ?app.health.probe_names().collect::<Vec<_>>(),
        health_timeout_ms = app.health.timeout().as_millis() as u64,
        "Listening"
    );

    let router = http::build_router(HttpState {
        health: app.health.clone(),
    });

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    app.database.close().await;
    result
}

async fn run_check(settings: config::Settings) -> Result<i32, AppError> {
    let app = build_application_context(&settings)?;

    let report = app.health.check_health().await;
    let body = serde_json::to_string_pretty(&http::health_body(&report))
        .map_err(|err| AppError::unexpected(format!("failed to encode health report: {err}")))?;
    println!("{body}");

    info!(
        target = "moto_transport::check",
        status = %report.status(),
        "Health check finished"
    );

    app.database.close().await;
    Ok(if report.is_ok() { 0 } else { 1 })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "moto_transport::serve", "Shutdown signal received");
}
