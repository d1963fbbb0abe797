//! Per-domain result of a batch verification run, as returned to callers.

use serde::Serialize;

use storeforge_core::{DomainId, Hostname};

use super::Domain;
use crate::services::CheckOutcome;

/// One entry of a batch refresh response.
///
/// Exactly one of `domain` and `error` is set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub domain_id: DomainId,
    pub hostname: Hostname,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckFailure>,
}

/// Why a domain could not be checked.
#[derive(Debug, Serialize)]
pub struct CheckFailure {
    pub error: String,
    pub code: &'static str,
}

impl From<CheckOutcome> for CheckReport {
    fn from(outcome: CheckOutcome) -> Self {
        let (domain, error) = match outcome.result {
            Ok(domain) => (Some(domain), None),
            Err(e) => (
                None,
                Some(CheckFailure {
                    error: e.to_string(),
                    code: e.code(),
                }),
            ),
        };

        Self {
            domain_id: outcome.domain_id,
            hostname: outcome.hostname,
            domain,
            error,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    #[test]
    fn test_failed_outcome_serializes_error_only() {
        let report = CheckReport::from(CheckOutcome {
            domain_id: DomainId::new(3),
            hostname: Hostname::parse("shop.example.com").unwrap(),
            result: Err(DomainError::NotFound),
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "domainId": 3,
                "hostname": "shop.example.com",
                "error": { "error": "Domain not found", "code": "not_found" }
            })
        );
    }
}
