//! Owner identity extractor.
//!
//! Authentication happens upstream. The auth proxy forwards the merchant's
//! store identity in the `x-owner-id` header, which is trusted as-is.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use storeforge_core::OwnerId;

use crate::error::set_sentry_owner;

/// The HTTP header carrying the authenticated owner ID.
pub const OWNER_ID_HEADER: &str = "x-owner-id";

/// Extractor that requires an owner identity on the request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireOwner(owner_id): RequireOwner) -> impl IntoResponse {
///     format!("Hello, store {owner_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireOwner(pub OwnerId);

/// Rejection when the owner header is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRejection {
    /// No `x-owner-id` header.
    Missing,
    /// Header present but not a positive integer.
    Invalid,
}

impl IntoResponse for OwnerRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "Missing owner identity",
            Self::Invalid => "Invalid owner identity",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": message, "code": "unauthorized" })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireOwner
where
    S: Send + Sync,
{
    type Rejection = OwnerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_ID_HEADER)
            .ok_or(OwnerRejection::Missing)?;

        let id = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .ok_or(OwnerRejection::Invalid)?;

        set_sentry_owner(id);
        Ok(Self(OwnerId::new(id)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<RequireOwner, OwnerRejection> {
        let mut builder = Request::builder().uri("/api/domains");
        if let Some(value) = header {
            builder = builder.header(OWNER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        RequireOwner::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_parses_owner_header() {
        let RequireOwner(owner) = extract(Some("42")).await.unwrap();
        assert_eq!(owner, OwnerId::new(42));
    }

    #[tokio::test]
    async fn test_rejects_missing_and_invalid() {
        assert_eq!(extract(None).await.unwrap_err(), OwnerRejection::Missing);
        assert_eq!(extract(Some("abc")).await.unwrap_err(), OwnerRejection::Invalid);
        assert_eq!(extract(Some("0")).await.unwrap_err(), OwnerRejection::Invalid);
    }
}
