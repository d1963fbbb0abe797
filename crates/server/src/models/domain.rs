//! Custom domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeforge_core::{DnsRecord, DomainId, DomainStatus, Hostname, OwnerId};

/// A merchant-owned hostname connected to a generated storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Unique domain ID.
    pub id: DomainId,
    /// Merchant/store that owns the domain. Never reassigned.
    pub owner_id: OwnerId,
    /// Normalized hostname, unique across the platform.
    pub hostname: Hostname,
    /// Verification status.
    pub status: DomainStatus,
    /// Whether this is the owner's canonical storefront address.
    pub is_primary: bool,
    /// Records the merchant must create, as issued by the hosting provider.
    pub dns_requirements: Vec<DnsRecord>,
    /// When the verification engine last looked at this domain.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// When the domain first verified.
    pub verified_at: Option<DateTime<Utc>>,
    /// User-facing diagnostic from the last failed check.
    pub error_message: Option<String>,
    /// When the domain was added.
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Whether the domain may be made primary or have a theme published to it.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == DomainStatus::Verified
    }
}

/// Result of a single verification check, as written back to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New status.
    pub status: DomainStatus,
    /// When the check completed.
    pub checked_at: DateTime<Utc>,
    /// Diagnostic to show when `status` is `Error`; cleared otherwise.
    pub error_message: Option<String>,
}

impl StatusUpdate {
    /// A successful check.
    #[must_use]
    pub const fn verified(checked_at: DateTime<Utc>) -> Self {
        Self {
            status: DomainStatus::Verified,
            checked_at,
            error_message: None,
        }
    }

    /// A failed check with a user-facing diagnostic.
    #[must_use]
    pub fn failed(checked_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            status: DomainStatus::Error,
            checked_at,
            error_message: Some(message.into()),
        }
    }

    /// Apply this update to an in-memory domain record.
    ///
    /// A verified domain never regresses: a failed check against it only
    /// re-stamps `last_checked_at`.
    pub fn apply_to(&self, domain: &mut Domain) {
        domain.last_checked_at = Some(self.checked_at);

        if !domain.status.can_transition_to(self.status) {
            return;
        }

        domain.status = self.status;
        domain.error_message.clone_from(&self.error_message);
        if self.status == DomainStatus::Verified && domain.verified_at.is_none() {
            domain.verified_at = Some(self.checked_at);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pending() -> Domain {
        Domain {
            id: DomainId::new(1),
            owner_id: OwnerId::new(10),
            hostname: Hostname::parse("shop.example.com").unwrap(),
            status: DomainStatus::Pending,
            is_primary: false,
            dns_requirements: vec![],
            last_checked_at: None,
            verified_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_failed_update_sets_error() {
        let mut domain = pending();
        let now = Utc::now();
        StatusUpdate::failed(now, "CNAME record missing").apply_to(&mut domain);

        assert_eq!(domain.status, DomainStatus::Error);
        assert_eq!(domain.error_message.as_deref(), Some("CNAME record missing"));
        assert_eq!(domain.last_checked_at, Some(now));
        assert!(domain.verified_at.is_none());
    }

    #[test]
    fn test_verified_update_clears_error_and_stamps() {
        let mut domain = pending();
        StatusUpdate::failed(Utc::now(), "nope").apply_to(&mut domain);

        let now = Utc::now();
        StatusUpdate::verified(now).apply_to(&mut domain);

        assert!(domain.is_verified());
        assert!(domain.error_message.is_none());
        assert_eq!(domain.verified_at, Some(now));
    }

    #[test]
    fn test_verified_never_regresses() {
        let mut domain = pending();
        let verified_at = Utc::now();
        StatusUpdate::verified(verified_at).apply_to(&mut domain);

        let later = verified_at + chrono::Duration::seconds(30);
        StatusUpdate::failed(later, "provider unreachable").apply_to(&mut domain);

        assert!(domain.is_verified());
        assert!(domain.error_message.is_none());
        assert_eq!(domain.verified_at, Some(verified_at));
        assert_eq!(domain.last_checked_at, Some(later));
    }

    #[test]
    fn test_serializes_camel_case_for_dashboard() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["hostname"], "shop.example.com");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["isPrimary"], false);
        assert!(json.get("dnsRequirements").is_some());
    }
}
