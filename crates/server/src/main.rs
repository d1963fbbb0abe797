//! Storeforge domain service - custom domain connection API.
//!
//! This binary serves the domain API on port 3002 behind the dashboard's
//! auth proxy, which supplies the `x-owner-id` header.
//!
//! # Architecture
//!
//! - Axum JSON API
//! - `PostgreSQL` domain store
//! - Hosting provider gateway with per-call timeout and bounded retries
//! - Optional background verification task (`VERIFY_INTERVAL_SECS`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::watch;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storeforge_server::config::ServerConfig;
use storeforge_server::db::{self, PgDomainStore};
use storeforge_server::gateway::{HostingClient, RetryPolicy, RetryingGateway};
use storeforge_server::services::{CheckOptions, DomainService, spawn_refresh_task};
use storeforge_server::state::AppState;

/// Start Sentry when a DSN is configured. The guard flushes events on drop.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;

    let options = sentry::ClientOptions {
        release: sentry::release_name!(),
        environment: config.sentry_environment.clone().map(Into::into),
        sample_rate: config.sentry_sample_rate,
        traces_sample_rate: config.sentry_traces_sample_rate,
        attach_stacktrace: true,
        send_default_pii: false,
        ..Default::default()
    };
    let guard = sentry::init((dsn, options));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the global subscriber: JSON lines on Fly.io, human-readable text elsewhere.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storeforge_server=info,tower_http=debug".into());

    let on_fly = std::env::var_os("FLY_APP_NAME").is_some();
    let json_layer = on_fly.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!on_fly).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Sentry goes first so the tracing layer has a client to report to
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // Schema changes are applied with `sf-cli migrate`, never here

    let client = HostingClient::new(&config.hosting).expect("Failed to create hosting client");
    let gateway = RetryingGateway::new(client, RetryPolicy::from_config(&config.hosting));
    tracing::info!(
        project = %config.hosting.account.project_id,
        api_url = %config.hosting.api_url,
        "Hosting gateway configured"
    );

    let service = DomainService::new(
        Arc::new(PgDomainStore::new(pool)),
        Arc::new(gateway),
        &config.verification,
    );

    // Background verification stops with the server
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_task = config.verification.interval.map(|interval| {
        spawn_refresh_task(
            service.clone(),
            interval,
            CheckOptions {
                include_errors: config.verification.include_errors,
            },
            shutdown_rx,
        )
    });

    let app = storeforge_server::app(AppState::new(service))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        // Outermost, so the Sentry hub spans the whole request
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storeforge-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    let _ = shutdown_tx.send(true);
    if let Some(task) = refresh_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "Background verification task panicked");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
