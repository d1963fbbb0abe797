//! Application state shared across handlers.

use std::sync::Arc;

use crate::services::DomainService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable; everything handlers need goes through the domain
/// service so that no handler touches the store or gateway directly.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    domains: DomainService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(domains: DomainService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { domains }),
        }
    }

    /// Get a reference to the domain service.
    #[must_use]
    pub fn domains(&self) -> &DomainService {
        &self.inner.domains
    }
}
