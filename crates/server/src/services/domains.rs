//! Domain service: the façade API handlers and the CLI call.
//!
//! Each operation sequences the store, the gateway, the verification engine
//! and the publication binder, and reports failures as [`DomainError`].
//!
//! # Adding a domain
//!
//! 1. Normalize the hostname
//! 2. Reject it if any owner already holds it
//! 3. Register it with the hosting provider
//! 4. Store it as `pending` with the provider's DNS requirements
//!
//! If step 4 fails after step 3 succeeded, the provider binding is removed
//! again (best effort) so no orphaned registration is left behind.

use std::sync::Arc;

use storeforge_core::{DomainId, Hostname, OwnerId, ThemeId};
use tracing::{info, instrument, warn};

use crate::config::VerificationConfig;
use crate::db::{DomainStore, NewDomain, StoreError};
use crate::error::DomainError;
use crate::gateway::DomainGateway;
use crate::models::{Domain, PublicationStatus, ThemePublication};

use super::publication::PublicationBinder;
use super::verification::{CheckOptions, CheckOutcome, CheckScope, VerificationEngine};

/// Domain connection service.
///
/// Cheap to clone; clones share the store and gateway.
#[derive(Clone)]
pub struct DomainService {
    inner: Arc<DomainServiceInner>,
}

struct DomainServiceInner {
    store: Arc<dyn DomainStore>,
    gateway: Arc<dyn DomainGateway>,
    engine: VerificationEngine,
    binder: PublicationBinder,
}

impl DomainService {
    /// Create a new domain service.
    #[must_use]
    pub fn new(
        store: Arc<dyn DomainStore>,
        gateway: Arc<dyn DomainGateway>,
        verification: &VerificationConfig,
    ) -> Self {
        let engine = VerificationEngine::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            verification.concurrency,
        );
        let binder = PublicationBinder::new(Arc::clone(&store));

        Self {
            inner: Arc::new(DomainServiceInner {
                store,
                gateway,
                engine,
                binder,
            }),
        }
    }

    /// The verification engine.
    #[must_use]
    pub fn engine(&self) -> &VerificationEngine {
        &self.inner.engine
    }

    /// Connect a new hostname to the owner's storefront.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidHostname`] if the input does not normalize to a valid hostname
    /// - [`DomainError::DuplicateHostname`] if any owner already holds it
    /// - [`DomainError::AlreadyRegistered`] if the provider has it bound elsewhere
    /// - [`DomainError::ProviderUnavailable`] once gateway retries are exhausted
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn add_domain(&self, owner_id: OwnerId, hostname: &str) -> Result<Domain, DomainError> {
        let hostname = Hostname::parse(hostname)?;

        if self.inner.store.find_by_hostname(&hostname).await?.is_some() {
            return Err(DomainError::DuplicateHostname(hostname));
        }

        let registered = self.inner.gateway.register_domain(&hostname).await?;

        let created = self
            .inner
            .store
            .create(NewDomain {
                owner_id,
                hostname: hostname.clone(),
                dns_requirements: registered.dns_requirements,
            })
            .await;

        match created {
            Ok(domain) => {
                info!(
                    domain_id = %domain.id,
                    hostname = %domain.hostname,
                    provider_domain_id = %registered.provider_domain_id,
                    "Domain added"
                );
                Ok(domain)
            }
            // Lost a race: the binding belongs to whoever stored it first
            Err(StoreError::DuplicateHostname(hostname)) => {
                Err(DomainError::DuplicateHostname(hostname))
            }
            Err(e) => {
                warn!(error = %e, hostname = %hostname, "Store write failed after registration, deregistering");
                self.deregister_best_effort(&hostname).await;
                Err(e.into())
            }
        }
    }

    /// All domains of an owner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] on database failure.
    pub async fn list_domains(&self, owner_id: OwnerId) -> Result<Vec<Domain>, DomainError> {
        Ok(self.inner.store.list_by_owner(owner_id).await?)
    }

    /// One domain of an owner.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if it does not exist or belongs to
    /// another owner.
    pub async fn get_domain(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, DomainError> {
        self.inner
            .store
            .get(id)
            .await?
            .filter(|d| d.owner_id == owner_id)
            .ok_or(DomainError::NotFound)
    }

    /// The owner's canonical storefront address, if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] on database failure.
    pub async fn primary_domain(&self, owner_id: OwnerId) -> Result<Option<Domain>, DomainError> {
        let domains = self.inner.store.list_by_owner(owner_id).await?;
        Ok(domains.into_iter().find(|d| d.is_primary))
    }

    /// Re-check one domain now.
    ///
    /// The returned record carries the outcome: `error` status with a
    /// diagnostic if the provider does not consider it verified yet.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain is not the owner's.
    pub async fn refresh_domain(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, DomainError> {
        let domain = self.get_domain(owner_id, id).await?;
        self.inner.engine.check_one(&domain).await
    }

    /// Re-check one domain and fail unless it ends up verified.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::VerificationFailed`] with the diagnostic if the
    /// domain is not verified after the check.
    pub async fn verify_domain(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, DomainError> {
        let domain = self.refresh_domain(owner_id, id).await?;
        if domain.is_verified() {
            return Ok(domain);
        }

        Err(DomainError::VerificationFailed {
            message: domain
                .error_message
                .unwrap_or_else(|| "Domain is not verified yet.".to_string()),
        })
    }

    /// Re-check the owner's pending (and optionally errored) domains.
    ///
    /// # Errors
    ///
    /// Fails only if the domains cannot be listed; per-domain failures are
    /// reported in the outcomes.
    pub async fn refresh_owner(
        &self,
        owner_id: OwnerId,
        options: CheckOptions,
    ) -> Result<Vec<CheckOutcome>, DomainError> {
        self.inner
            .engine
            .check_all(CheckScope::Owner(owner_id), options)
            .await
    }

    /// Re-check pending domains of every owner. Used by the background task.
    ///
    /// # Errors
    ///
    /// Fails only if the domains cannot be listed.
    pub async fn refresh_all(&self, options: CheckOptions) -> Result<Vec<CheckOutcome>, DomainError> {
        self.inner.engine.check_all(CheckScope::Global, options).await
    }

    /// Re-fetch the DNS instructions for an unverified domain.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain is not the owner's or
    /// the provider no longer knows it.
    pub async fn refresh_requirements(
        &self,
        owner_id: OwnerId,
        id: DomainId,
    ) -> Result<Domain, DomainError> {
        let domain = self.get_domain(owner_id, id).await?;
        self.inner.engine.refresh_requirements(&domain).await
    }

    /// Make a verified domain the owner's primary domain.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotVerified`] or [`DomainError::NotFound`].
    #[instrument(skip(self), fields(owner_id = %owner_id, domain_id = %id))]
    pub async fn set_primary(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, DomainError> {
        let domain = self.inner.store.set_primary(owner_id, id).await?;
        info!(hostname = %domain.hostname, "Primary domain changed");
        Ok(domain)
    }

    /// Delete a domain and its publication, then release it at the provider.
    ///
    /// A deleted primary domain leaves the owner with no primary; nothing is
    /// promoted in its place.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain is not the owner's.
    #[instrument(skip(self), fields(owner_id = %owner_id, domain_id = %id))]
    pub async fn delete_domain(&self, owner_id: OwnerId, id: DomainId) -> Result<(), DomainError> {
        let domain = self.get_domain(owner_id, id).await?;

        if !self.inner.store.delete(id).await? {
            return Err(DomainError::NotFound);
        }
        info!(hostname = %domain.hostname, was_primary = domain.is_primary, "Domain deleted");

        // The hostname may have been claimed again between the delete and now
        match self.inner.store.find_by_hostname(&domain.hostname).await {
            Ok(None) => self.deregister_best_effort(&domain.hostname).await,
            Ok(Some(claimed)) => {
                info!(
                    hostname = %domain.hostname,
                    domain_id = %claimed.id,
                    "Hostname re-added before deregistration, keeping provider binding"
                );
            }
            Err(e) => {
                warn!(error = %e, hostname = %domain.hostname, "Could not re-check hostname, keeping provider binding");
            }
        }
        Ok(())
    }

    /// Publish a theme to one of the owner's verified domains.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::DomainNotVerified`] or [`DomainError::NotFound`].
    pub async fn publish_theme(
        &self,
        owner_id: OwnerId,
        id: DomainId,
        theme_id: ThemeId,
        theme_name: String,
    ) -> Result<ThemePublication, DomainError> {
        self.get_domain(owner_id, id).await?;
        self.inner.binder.publish(id, theme_id, theme_name).await
    }

    /// Stop serving a theme on a domain. No-op if nothing is published.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain is not the owner's.
    pub async fn unpublish_theme(&self, owner_id: OwnerId, id: DomainId) -> Result<bool, DomainError> {
        self.get_domain(owner_id, id).await?;
        self.inner.binder.unpublish(id).await
    }

    /// Which theme a domain serves.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain is not the owner's.
    pub async fn publication_status(
        &self,
        owner_id: OwnerId,
        id: DomainId,
    ) -> Result<PublicationStatus, DomainError> {
        self.get_domain(owner_id, id).await?;
        self.inner.binder.status_for(id).await
    }

    /// Check the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if it is not.
    pub async fn ready(&self) -> Result<(), DomainError> {
        Ok(self.inner.store.ping().await?)
    }

    async fn deregister_best_effort(&self, hostname: &Hostname) {
        if let Err(e) = self.inner.gateway.deregister_domain(hostname).await {
            warn!(error = %e, hostname = %hostname, "Provider deregistration failed, binding left orphaned");
        }
    }
}
