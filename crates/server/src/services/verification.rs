//! DNS verification engine.
//!
//! Drives each domain through its status state machine:
//!
//! ```text
//! pending  --(provider reports verified)--> verified
//! pending  --(provider reports error / timeout)--> error
//! error    --(refresh succeeds)--> verified
//! error    --(refresh still fails)--> error (diagnostics updated)
//! verified --(terminal)
//! ```
//!
//! The store is written only after the gateway call has fully returned, so a
//! dropped request never leaves a half-applied status behind.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use storeforge_core::{DomainId, DomainStatus, Hostname, OwnerId};
use tracing::{debug, info, instrument, warn};

use crate::db::DomainStore;
use crate::error::DomainError;
use crate::gateway::{Diagnostics, DomainGateway, GatewayError};
use crate::models::{Domain, StatusUpdate};

/// Shown when the provider has no record of the hostname.
pub const NOT_REGISTERED_MESSAGE: &str =
    "Domain is not registered with the hosting provider; remove it and add it again.";

/// Shown when the provider could not be reached after retries.
pub const UNREACHABLE_MESSAGE: &str =
    "Could not reach the hosting provider to check this domain. It will be checked again shortly.";

/// Which domains a batch check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope {
    /// Domains of one owner.
    Owner(OwnerId),
    /// Every domain on the platform (background refresh).
    Global,
}

impl CheckScope {
    const fn owner(self) -> Option<OwnerId> {
        match self {
            Self::Owner(owner_id) => Some(owner_id),
            Self::Global => None,
        }
    }
}

/// Batch check options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Also re-check domains currently in `error`.
    pub include_errors: bool,
}

impl CheckOptions {
    fn statuses(self) -> &'static [DomainStatus] {
        if self.include_errors {
            &[DomainStatus::Pending, DomainStatus::Error]
        } else {
            &[DomainStatus::Pending]
        }
    }
}

/// Outcome of checking one domain within a batch.
#[derive(Debug)]
pub struct CheckOutcome {
    pub domain_id: DomainId,
    pub hostname: Hostname,
    /// Updated record, or why it could not be checked.
    pub result: Result<Domain, DomainError>,
}

impl CheckOutcome {
    /// Whether the domain ended the check verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.result.as_ref().is_ok_and(Domain::is_verified)
    }
}

/// Checks domains against the hosting provider and records the results.
#[derive(Clone)]
pub struct VerificationEngine {
    store: Arc<dyn DomainStore>,
    gateway: Arc<dyn DomainGateway>,
    concurrency: usize,
}

impl VerificationEngine {
    /// Create an engine that runs at most `concurrency` provider checks at once.
    #[must_use]
    pub fn new(
        store: Arc<dyn DomainStore>,
        gateway: Arc<dyn DomainGateway>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Check a single domain and persist the result.
    ///
    /// A domain that is already verified is not sent to the provider again;
    /// only `last_checked_at` is re-stamped.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the domain was deleted while the
    /// check was in flight, or [`DomainError::Storage`] on database failure.
    #[instrument(skip(self, domain), fields(domain_id = %domain.id, hostname = %domain.hostname))]
    pub async fn check_one(&self, domain: &Domain) -> Result<Domain, DomainError> {
        let update = if domain.is_verified() {
            StatusUpdate::verified(Utc::now())
        } else {
            self.probe(&domain.hostname).await
        };

        let updated = self
            .store
            .update_status(domain.id, &update)
            .await?
            .ok_or_else(|| {
                debug!("Domain deleted during check, dropping result");
                DomainError::NotFound
            })?;

        if updated.status != domain.status {
            info!(from = %domain.status, to = %updated.status, "Domain status changed");
        }

        Ok(updated)
    }

    /// Ask the provider and translate the answer into a status update.
    async fn probe(&self, hostname: &Hostname) -> StatusUpdate {
        let result = self.gateway.fetch_verification_status(hostname).await;
        let checked_at = Utc::now();

        match result {
            Ok(report) if report.verified => StatusUpdate::verified(checked_at),
            Ok(report) => StatusUpdate::failed(checked_at, describe_failure(&report.diagnostics)),
            Err(GatewayError::NotFound) => StatusUpdate::failed(checked_at, NOT_REGISTERED_MESSAGE),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Provider unavailable during verification");
                StatusUpdate::failed(checked_at, UNREACHABLE_MESSAGE)
            }
            Err(e) => {
                warn!(error = %e, "Provider rejected verification request");
                StatusUpdate::failed(
                    checked_at,
                    format!("The hosting provider could not check this domain: {e}"),
                )
            }
        }
    }

    /// Check every pending (and optionally errored) domain in `scope`.
    ///
    /// Checks run concurrently, bounded by the engine's concurrency, and
    /// results come back in the store's listing order. One domain failing
    /// never fails the batch.
    ///
    /// # Errors
    ///
    /// Returns an error only if the domains to check cannot be listed.
    #[instrument(skip(self))]
    pub async fn check_all(
        &self,
        scope: CheckScope,
        options: CheckOptions,
    ) -> Result<Vec<CheckOutcome>, DomainError> {
        let domains = self
            .store
            .list_by_status(scope.owner(), options.statuses())
            .await?;

        let outcomes: Vec<CheckOutcome> = stream::iter(domains)
            .map(|domain| async move {
                let result = self.check_one(&domain).await;
                CheckOutcome {
                    domain_id: domain.id,
                    hostname: domain.hostname,
                    result,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let verified = outcomes.iter().filter(|o| o.is_verified()).count();
        info!(
            checked = outcomes.len(),
            verified,
            failed = outcomes.len() - verified,
            "Verification batch complete"
        );

        Ok(outcomes)
    }

    /// Re-fetch DNS requirements for a domain that is not verified yet.
    ///
    /// Verified domains are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if the provider or the store no longer
    /// knows the domain, or a provider error.
    #[instrument(skip(self, domain), fields(domain_id = %domain.id, hostname = %domain.hostname))]
    pub async fn refresh_requirements(&self, domain: &Domain) -> Result<Domain, DomainError> {
        if domain.is_verified() {
            return Ok(domain.clone());
        }

        let records = self.gateway.fetch_requirements(&domain.hostname).await?;
        self.store
            .replace_requirements(domain.id, &records)
            .await?
            .ok_or(DomainError::NotFound)
    }
}

/// Turn provider diagnostics into one message a merchant can act on.
#[must_use]
pub fn describe_failure(diagnostics: &Diagnostics) -> String {
    let mut parts = Vec::new();

    if !diagnostics.missing_records.is_empty() {
        let records = diagnostics
            .missing_records
            .iter()
            .map(|r| format!("{} record '{}' with value '{}'", r.record_type, r.name, r.value))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("DNS record missing or incorrect. Add {records}."));
    }

    if diagnostics.propagation_pending {
        parts.push(
            "DNS changes have not finished propagating yet; this can take up to 48 hours."
                .to_string(),
        );
    } else if diagnostics.misconfigured && diagnostics.missing_records.is_empty() {
        parts.push("DNS records do not point at the hosting provider yet.".to_string());
    }

    if let Some(message) = &diagnostics.provider_message {
        parts.push(format!("Provider reported: {message}"));
    }

    if parts.is_empty() {
        return "Domain is not verified yet. Check the DNS records in the setup instructions \
                and try again."
            .to_string();
    }

    parts.join(" ")
}
