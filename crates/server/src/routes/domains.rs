//! Domain API handlers.
//!
//! Thin wrappers over [`DomainService`](crate::services::DomainService);
//! every handler is scoped to the owner from [`RequireOwner`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use storeforge_core::{DomainId, ThemeId};

use crate::error::DomainError;
use crate::middleware::RequireOwner;
use crate::models::{CheckReport, Domain, PublicationStatus, ThemePublication};
use crate::services::CheckOptions;
use crate::state::AppState;

/// Request body for adding a domain.
#[derive(Debug, Deserialize)]
pub struct AddDomainRequest {
    pub hostname: String,
}

/// Query parameters for a batch refresh.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub include_errors: bool,
}

/// Request body for publishing a theme.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(alias = "theme_id")]
    pub theme_id: ThemeId,
    #[serde(alias = "theme_name")]
    pub theme_name: String,
}

/// `GET /api/domains`
pub async fn list(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
) -> Result<Json<Vec<Domain>>, DomainError> {
    Ok(Json(state.domains().list_domains(owner_id).await?))
}

/// `POST /api/domains`
pub async fn add(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Json(body): Json<AddDomainRequest>,
) -> Result<(StatusCode, Json<Domain>), DomainError> {
    let domain = state.domains().add_domain(owner_id, &body.hostname).await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

/// `POST /api/domains/refresh`
pub async fn refresh_owner(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<Vec<CheckReport>>, DomainError> {
    let options = CheckOptions {
        include_errors: query.include_errors,
    };
    let outcomes = state.domains().refresh_owner(owner_id, options).await?;
    Ok(Json(outcomes.into_iter().map(CheckReport::from).collect()))
}

/// `GET /api/domains/primary`
pub async fn primary(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
) -> Result<Json<Option<Domain>>, DomainError> {
    Ok(Json(state.domains().primary_domain(owner_id).await?))
}

/// `GET /api/domains/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>, DomainError> {
    Ok(Json(state.domains().get_domain(owner_id, id).await?))
}

/// `DELETE /api/domains/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<StatusCode, DomainError> {
    state.domains().delete_domain(owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/domains/{id}/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>, DomainError> {
    Ok(Json(state.domains().refresh_domain(owner_id, id).await?))
}

/// `POST /api/domains/{id}/requirements`
pub async fn refresh_requirements(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>, DomainError> {
    Ok(Json(state.domains().refresh_requirements(owner_id, id).await?))
}

/// `POST /api/domains/{id}/primary`
pub async fn set_primary(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<Json<Domain>, DomainError> {
    Ok(Json(state.domains().set_primary(owner_id, id).await?))
}

/// `GET /api/domains/{id}/publication`
pub async fn publication_status(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<Json<PublicationStatus>, DomainError> {
    Ok(Json(state.domains().publication_status(owner_id, id).await?))
}

/// `PUT /api/domains/{id}/publication`
pub async fn publish(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<ThemePublication>, DomainError> {
    let publication = state
        .domains()
        .publish_theme(owner_id, id, body.theme_id, body.theme_name)
        .await?;
    Ok(Json(publication))
}

/// `DELETE /api/domains/{id}/publication`
pub async fn unpublish(
    State(state): State<AppState>,
    RequireOwner(owner_id): RequireOwner,
    Path(id): Path<DomainId>,
) -> Result<StatusCode, DomainError> {
    state.domains().unpublish_theme(owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
