//! Integration tests for Storeforge.
//!
//! The tests run the domain service end to end against the in-memory store
//! and a scripted hosting gateway, so they need neither a database nor
//! network access.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storeforge-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `domain_lifecycle` - Service-level scenarios and invariants
//! - `domain_api` - HTTP API through the router

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use storeforge_core::{DomainId, OwnerId};
use storeforge_server::config::VerificationConfig;
use storeforge_server::db::MemoryStore;
use storeforge_server::gateway::{RetryPolicy, RetryingGateway, ScriptedCheck, ScriptedGateway};
use storeforge_server::middleware::OWNER_ID_HEADER;
use storeforge_server::models::Domain;
use storeforge_server::services::DomainService;
use storeforge_server::state::AppState;

/// Everything a test needs, sharing one store and one gateway script.
pub struct TestContext {
    pub store: MemoryStore,
    pub gateway: ScriptedGateway,
    pub service: DomainService,
}

impl TestContext {
    /// A fresh context. Gateway calls time out after 50ms and are retried once.
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = ScriptedGateway::new();
        let retrying = RetryingGateway::new(
            gateway.clone(),
            RetryPolicy {
                timeout: Duration::from_millis(50),
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            },
        );
        let service = DomainService::new(
            Arc::new(store.clone()),
            Arc::new(retrying),
            &VerificationConfig::default(),
        );

        Self {
            store,
            gateway,
            service,
        }
    }

    /// The HTTP app over this context's service.
    #[must_use]
    pub fn router(&self) -> Router {
        storeforge_server::app(AppState::new(self.service.clone()))
    }

    /// Add a domain and script its next check as verified, then run it.
    pub async fn verified_domain(&self, owner: i32, hostname: &str) -> Domain {
        let domain = self
            .service
            .add_domain(OwnerId::new(owner), hostname)
            .await
            .unwrap();
        self.gateway
            .set_check(domain.hostname.as_str(), ScriptedCheck::Verified);
        self.service
            .refresh_domain(OwnerId::new(owner), domain.id)
            .await
            .unwrap()
    }

    /// Send a request through the router as `owner` (or anonymously).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        owner: Option<i32>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header(OWNER_ID_HEADER, owner.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Plain-text bodies (e.g. `/health`) come back as a JSON string
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Primary domain IDs among `domains`.
#[must_use]
pub fn primaries(domains: &[Domain]) -> Vec<DomainId> {
    domains.iter().filter(|d| d.is_primary).map(|d| d.id).collect()
}
