//! Unified error handling for domain operations.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use storeforge_core::{Hostname, HostnameError};

use crate::db::StoreError;
use crate::gateway::GatewayError;

/// Errors surfaced by the domain service to API and CLI callers.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Hostname failed local or provider-side validation.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Another domain record already holds this hostname.
    #[error("{0} is already connected to a storefront")]
    DuplicateHostname(Hostname),

    /// The hosting provider has this hostname bound elsewhere.
    #[error("Hostname is already in use by another hosting project")]
    AlreadyRegistered,

    /// Provider could not be reached after retries.
    #[error("Hosting provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Primary selection on an unverified domain.
    #[error("Domain must be verified before it can be made primary")]
    NotVerified,

    /// Theme publication on an unverified domain.
    #[error("Domain must be verified before a theme can be published to it")]
    DomainNotVerified,

    /// Domain missing or owned by someone else.
    #[error("Domain not found")]
    NotFound,

    /// The provider reports the DNS setup is not complete.
    #[error("{message}")]
    VerificationFailed { message: String },

    /// Database failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl DomainError {
    /// Stable machine-readable code for API clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidHostname(_) => "invalid_hostname",
            Self::DuplicateHostname(_) => "duplicate_hostname",
            Self::AlreadyRegistered => "already_registered",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::NotVerified => "not_verified",
            Self::DomainNotVerified => "domain_not_verified",
            Self::NotFound => "not_found",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::Storage(_) => "storage",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidHostname(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateHostname(_) | Self::AlreadyRegistered => StatusCode::CONFLICT,
            Self::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::NotVerified | Self::DomainNotVerified => StatusCode::PRECONDITION_FAILED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::VerificationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateHostname(hostname) => Self::DuplicateHostname(hostname),
            StoreError::NotFound => Self::NotFound,
            StoreError::NotVerified => Self::NotVerified,
            other @ (StoreError::Database(_) | StoreError::DataCorruption(_)) => {
                Self::Storage(other)
            }
        }
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidHostname(message) => Self::InvalidHostname(message),
            GatewayError::AlreadyRegistered => Self::AlreadyRegistered,
            GatewayError::NotFound => Self::NotFound,
            GatewayError::ProviderUnavailable(message) => Self::ProviderUnavailable(message),
            other @ (GatewayError::Rejected { .. }
            | GatewayError::InvalidResponse(_)
            | GatewayError::Configuration(_)) => Self::ProviderUnavailable(other.to_string()),
        }
    }
}

impl From<HostnameError> for DomainError {
    fn from(err: HostnameError) -> Self {
        Self::InvalidHostname(err.to_string())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Storage(_) | Self::ProviderUnavailable(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Domain request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Storage(_) => "Internal server error".to_string(),
            Self::ProviderUnavailable(_) => {
                "Could not reach the hosting provider. Try again in a few minutes.".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Set the Sentry user context from the calling owner.
pub fn set_sentry_owner(owner_id: i32) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(owner_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::DuplicateHostname(Hostname::parse("example.com").unwrap());
        assert_eq!(err.to_string(), "example.com is already connected to a storefront");

        let err = DomainError::VerificationFailed {
            message: "Add a CNAME record".to_string(),
        };
        assert_eq!(err.to_string(), "Add a CNAME record");
    }

    #[test]
    fn test_domain_error_status_codes() {
        fn get_status(err: DomainError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(DomainError::InvalidHostname("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(DomainError::AlreadyRegistered), StatusCode::CONFLICT);
        assert_eq!(
            get_status(DomainError::ProviderUnavailable("timeout".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(DomainError::NotVerified),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            get_status(DomainError::DomainNotVerified),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(get_status(DomainError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(DomainError::VerificationFailed {
                message: "missing".to_string()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(DomainError::Storage(StoreError::DataCorruption("x".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            DomainError::from(StoreError::NotVerified),
            DomainError::NotVerified
        ));
        assert!(matches!(
            DomainError::from(StoreError::NotFound),
            DomainError::NotFound
        ));
        assert!(matches!(
            DomainError::from(StoreError::DataCorruption("bad".to_string())),
            DomainError::Storage(_)
        ));
    }

    #[test]
    fn test_gateway_error_mapping() {
        assert!(matches!(
            DomainError::from(GatewayError::AlreadyRegistered),
            DomainError::AlreadyRegistered
        ));
        assert!(matches!(
            DomainError::from(GatewayError::Rejected {
                status: 403,
                message: "forbidden".to_string()
            }),
            DomainError::ProviderUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_storage_error_body_hides_details() {
        let err = DomainError::Storage(StoreError::DataCorruption("secret detail".to_string()));
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["code"], "storage");
        assert_eq!(body["error"], "Internal server error");
    }
}
