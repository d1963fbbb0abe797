//! Binds published themes to verified domains.

use std::sync::Arc;

use chrono::Utc;
use storeforge_core::{DomainId, ThemeId};
use tracing::{info, instrument};

use crate::db::{DomainStore, StoreError};
use crate::error::DomainError;
use crate::models::{PublicationStatus, ThemePublication};

/// Publication binder.
///
/// Holds no state of its own; every call goes straight to the store.
#[derive(Clone)]
pub struct PublicationBinder {
    store: Arc<dyn DomainStore>,
}

impl PublicationBinder {
    #[must_use]
    pub fn new(store: Arc<dyn DomainStore>) -> Self {
        Self { store }
    }

    /// Publish a theme to a domain, replacing whatever it served before.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DomainNotVerified`] unless the domain is
    /// verified, or [`DomainError::NotFound`] if it does not exist.
    #[instrument(skip(self, theme_name), fields(domain_id = %domain_id, theme_id = %theme_id))]
    pub async fn publish(
        &self,
        domain_id: DomainId,
        theme_id: ThemeId,
        theme_name: String,
    ) -> Result<ThemePublication, DomainError> {
        let publication = ThemePublication {
            domain_id,
            theme_id,
            theme_name,
            published_at: Utc::now(),
        };

        let published = self
            .store
            .upsert_publication(&publication)
            .await
            .map_err(|e| match e {
                StoreError::NotVerified => DomainError::DomainNotVerified,
                other => other.into(),
            })?;

        info!("Published theme to domain");
        Ok(published)
    }

    /// What the domain currently serves.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain does not exist.
    pub async fn status_for(&self, domain_id: DomainId) -> Result<PublicationStatus, DomainError> {
        if self.store.get(domain_id).await?.is_none() {
            return Err(DomainError::NotFound);
        }

        let publication = self.store.get_publication(domain_id).await?;
        Ok(publication.into())
    }

    /// Remove the domain's publication. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] on database failure.
    #[instrument(skip(self), fields(domain_id = %domain_id))]
    pub async fn unpublish(&self, domain_id: DomainId) -> Result<bool, DomainError> {
        let removed = self.store.delete_publication(domain_id).await?;
        if removed {
            info!("Unpublished theme from domain");
        }
        Ok(removed)
    }
}
