//! Storeforge custom domain service.
//!
//! Lets a merchant point their own hostname at a generated storefront:
//! register it with the hosting provider, verify DNS, choose a primary
//! domain and publish a theme to it.
//!
//! # Layers
//!
//! - [`routes`] - axum JSON API, owner taken from the upstream auth proxy
//! - [`services`] - Domain service, verification engine, publication binder
//! - [`gateway`] - Hosting provider client with timeouts and retries
//! - [`db`] - Domain store (`PostgreSQL` or in-memory)
//!
//! The store is the single source of truth for domain status; nothing above
//! it caches.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Build the application router with request-scoped middleware.
///
/// Tracing and Sentry layers are added by the binary so tests can drive the
/// router without a subscriber.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .with_state(state)
}
