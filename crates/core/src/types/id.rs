//! Typed identifiers.
//!
//! Domains and owners are both keyed by `i32` in the database; wrapping them
//! keeps an owner ID from ever being passed where a domain ID is expected.

use serde::{Deserialize, Serialize};

/// Define an `i32`-backed ID type.
///
/// The generated type is `Copy`, hashable, displays as the bare number,
/// serializes transparently and converts to and from `i32`. With the
/// `postgres` feature it also binds and decodes as a Postgres `INTEGER`.
///
/// ```rust
/// # use storeforge_core::define_id;
/// define_id!(ZoneId);
/// define_id!(RecordId);
///
/// let zone = ZoneId::new(3);
/// assert_eq!(zone.as_i32(), 3);
/// // let _: RecordId = zone; // mismatched types
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(DomainId);
define_id!(OwnerId);

/// Identifier of a published theme configuration.
///
/// Theme snapshots are produced by the theme editor and identified by an
/// opaque string, so this wraps a `String` rather than an integer key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct ThemeId(String);

impl ThemeId {
    /// Create a new theme ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the theme ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ::core::fmt::Display for ThemeId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ThemeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ThemeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_id_roundtrip() {
        let id = DomainId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_owner_id_serializes_transparently() {
        let json = serde_json::to_string(&OwnerId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: OwnerId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, OwnerId::new(7));
    }

    #[test]
    fn test_theme_id_display() {
        let id = ThemeId::new("minimal-dark");
        assert_eq!(id.as_str(), "minimal-dark");
        assert_eq!(format!("{id}"), "minimal-dark");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"minimal-dark\"");
    }
}
