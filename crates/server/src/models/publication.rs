//! Theme publication model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeforge_core::{DomainId, ThemeId};

/// Binding of a published theme snapshot to a verified domain.
///
/// At most one exists per domain; publishing again replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePublication {
    /// Domain serving the theme.
    pub domain_id: DomainId,
    /// Published theme configuration.
    pub theme_id: ThemeId,
    /// Theme display name.
    pub theme_name: String,
    /// Most recent publish to this domain.
    pub published_at: DateTime<Utc>,
}

/// What the dashboard shows on a domain's "published theme" badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationStatus {
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<ThemeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<Option<ThemePublication>> for PublicationStatus {
    fn from(publication: Option<ThemePublication>) -> Self {
        publication.map_or_else(Self::default, |p| Self {
            published: true,
            theme_id: Some(p.theme_id),
            theme_name: Some(p.theme_name),
            published_at: Some(p.published_at),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_status_is_minimal() {
        let status = PublicationStatus::from(None);
        assert!(!status.published);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({ "published": false }));
    }

    #[test]
    fn test_published_status_carries_theme() {
        let now = Utc::now();
        let status = PublicationStatus::from(Some(ThemePublication {
            domain_id: DomainId::new(3),
            theme_id: ThemeId::new("aurora"),
            theme_name: "Aurora".to_string(),
            published_at: now,
        }));
        assert!(status.published);
        assert_eq!(status.theme_name.as_deref(), Some("Aurora"));
        assert_eq!(status.published_at, Some(now));
    }
}
