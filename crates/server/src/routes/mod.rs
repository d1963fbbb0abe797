//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness check
//! GET    /health/ready                    - Readiness check (store reachable)
//!
//! # Domains (owner from x-owner-id)
//! GET    /api/domains                     - List the owner's domains
//! POST   /api/domains                     - Add a domain
//! POST   /api/domains/refresh             - Re-check pending domains (?include_errors=true)
//! GET    /api/domains/primary             - The owner's primary domain, or null
//! GET    /api/domains/{id}                - Domain detail
//! DELETE /api/domains/{id}                - Delete a domain
//! POST   /api/domains/{id}/refresh        - Re-check one domain
//! POST   /api/domains/{id}/requirements   - Re-fetch DNS requirements
//! POST   /api/domains/{id}/primary        - Make primary
//!
//! # Theme publication
//! GET    /api/domains/{id}/publication    - Publication status
//! PUT    /api/domains/{id}/publication    - Publish a theme
//! DELETE /api/domains/{id}/publication    - Unpublish
//! ```

pub mod domains;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the router with all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/domains", domain_routes())
}

fn domain_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(domains::list).post(domains::add))
        .route("/refresh", post(domains::refresh_owner))
        .route("/primary", get(domains::primary))
        .route("/{id}", get(domains::show).delete(domains::delete))
        .route("/{id}/refresh", post(domains::refresh))
        .route("/{id}/requirements", post(domains::refresh_requirements))
        .route("/{id}/primary", post(domains::set_primary))
        .route(
            "/{id}/publication",
            get(domains::publication_status)
                .put(domains::publish)
                .delete(domains::unpublish),
        )
}
