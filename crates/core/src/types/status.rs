//! Status enums for custom domains.

use serde::{Deserialize, Serialize};

/// Verification status of a custom domain.
///
/// ```text
/// pending  -> verified | error
/// error    -> verified | error
/// verified -> (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "domain_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// Added, DNS not yet confirmed by the hosting provider.
    #[default]
    Pending,
    /// The hosting provider confirmed ownership; the domain can serve a theme.
    Verified,
    /// The last check failed; `error_message` explains why.
    Error,
}

impl DomainStatus {
    /// Whether the verification engine may move a domain from `self` to `next`.
    ///
    /// Staying in the same state is always allowed so that re-checks can
    /// re-stamp `last_checked_at`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, _) | (Self::Error, Self::Verified | Self::Error) | (Self::Verified, Self::Verified)
        )
    }

    /// Whether no further automatic transitions happen from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Lowercase name, as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DomainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "error" => Ok(Self::Error),
            _ => Err(format!("invalid domain status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_can_move_anywhere() {
        assert!(DomainStatus::Pending.can_transition_to(DomainStatus::Verified));
        assert!(DomainStatus::Pending.can_transition_to(DomainStatus::Error));
        assert!(DomainStatus::Pending.can_transition_to(DomainStatus::Pending));
    }

    #[test]
    fn test_error_recovers_or_stays() {
        assert!(DomainStatus::Error.can_transition_to(DomainStatus::Verified));
        assert!(DomainStatus::Error.can_transition_to(DomainStatus::Error));
        assert!(!DomainStatus::Error.can_transition_to(DomainStatus::Pending));
    }

    #[test]
    fn test_verified_is_terminal() {
        assert!(DomainStatus::Verified.is_terminal());
        assert!(DomainStatus::Verified.can_transition_to(DomainStatus::Verified));
        assert!(!DomainStatus::Verified.can_transition_to(DomainStatus::Error));
        assert!(!DomainStatus::Verified.can_transition_to(DomainStatus::Pending));
    }

    #[test]
    fn test_from_str_and_display_agree() {
        for status in [
            DomainStatus::Pending,
            DomainStatus::Verified,
            DomainStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<DomainStatus>().unwrap(), status);
        }
        assert!("active".parse::<DomainStatus>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&DomainStatus::Verified).unwrap(),
            "\"verified\""
        );
    }
}
