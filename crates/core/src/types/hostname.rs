//! Custom domain hostname type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Hostname`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostnameError {
    /// The input is empty (or only a scheme/path).
    #[error("hostname cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("hostname must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The hostname has no dot, e.g. `localhost`.
    #[error("hostname must contain at least two labels (e.g. example.com)")]
    SingleLabel,
    /// A label is empty, too long, or contains invalid characters.
    #[error("invalid hostname label: {label:?}")]
    InvalidLabel {
        /// The offending label.
        label: String,
    },
    /// The top-level label is all digits (looks like an IP address).
    #[error("hostname top-level label cannot be numeric")]
    NumericTld,
}

/// A normalized, merchant-owned hostname.
///
/// Parsing is deliberately forgiving about what merchants paste into the
/// "connect domain" form and strict about what ends up stored:
///
/// - surrounding whitespace, any `scheme://`, credentials, path, query,
///   fragment, `:port` and a trailing dot are removed
/// - the result is lower-cased
/// - one leading `www.` is removed, unless that would leave a single label
///
/// The remainder must be a syntactically plausible DNS name: at most 253
/// characters, two or more labels of 1-63 `[a-z0-9-]` characters that do not
/// start or end with a hyphen, and a non-numeric top-level label.
///
/// ## Examples
///
/// ```
/// use storeforge_core::Hostname;
///
/// let host = Hostname::parse("HTTPS://WWW.Example.com/").unwrap();
/// assert_eq!(host.as_str(), "example.com");
///
/// assert!(Hostname::parse("localhost").is_err());
/// assert!(Hostname::parse("bad_label.example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Maximum length of a DNS name in presentation format.
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length of a single label.
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Normalize and validate a user-supplied hostname.
    ///
    /// # Errors
    ///
    /// Returns a [`HostnameError`] describing the first validation failure.
    pub fn parse(input: &str) -> Result<Self, HostnameError> {
        let normalized = normalize(input);

        if normalized.is_empty() {
            return Err(HostnameError::Empty);
        }

        if normalized.len() > Self::MAX_LENGTH {
            return Err(HostnameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let labels: Vec<&str> = normalized.split('.').collect();
        if labels.len() < 2 {
            return Err(HostnameError::SingleLabel);
        }

        for label in &labels {
            if !is_valid_label(label) {
                return Err(HostnameError::InvalidLabel {
                    label: (*label).to_owned(),
                });
            }
        }

        if labels
            .last()
            .is_some_and(|tld| tld.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(HostnameError::NumericTld);
        }

        Ok(Self(normalized))
    }

    /// Returns the hostname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Hostname` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether this is a registrable apex (`example.com`) rather than a
    /// subdomain (`shop.example.com`).
    ///
    /// Multi-part public suffixes such as `co.uk` are not recognised, so
    /// `example.co.uk` reports `false`.
    #[must_use]
    pub fn is_apex(&self) -> bool {
        self.0.matches('.').count() == 1
    }

    /// The subdomain part relative to the apex, e.g. `shop` for
    /// `shop.example.com`, or `None` for an apex hostname.
    #[must_use]
    pub fn subdomain(&self) -> Option<&str> {
        if self.is_apex() {
            return None;
        }
        let apex_start = self.0.rmatch_indices('.').nth(1).map(|(i, _)| i)?;
        self.0.get(..apex_start)
    }

    /// The registrable apex (last two labels).
    #[must_use]
    pub fn apex(&self) -> &str {
        self.subdomain()
            .and_then(|sub| self.0.get(sub.len() + 1..))
            .unwrap_or(&self.0)
    }
}

fn normalize(input: &str) -> String {
    let mut rest = input.trim();

    if let Some((_, after)) = rest.split_once("://") {
        rest = after;
    }

    if let Some(end) = rest.find(['/', '?', '#']) {
        rest = rest.get(..end).unwrap_or_default();
    }

    if let Some((_, host)) = rest.rsplit_once('@') {
        rest = host;
    }

    if let Some((host, port)) = rest.rsplit_once(':')
        && !port.is_empty()
        && port.bytes().all(|b| b.is_ascii_digit())
    {
        rest = host;
    }

    let mut host = rest.trim_end_matches('.').to_ascii_lowercase();

    if let Some(stripped) = host.strip_prefix("www.")
        && stripped.contains('.')
    {
        host = stripped.to_owned();
    }

    host
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= Hostname::MAX_LABEL_LENGTH
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Hostname {
    type Err = HostnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Hostname {
    type Error = HostnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Hostname> for String {
    fn from(host: Hostname) -> Self {
        host.0
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Hostname {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Hostname {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values were normalized on the way in
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Hostname {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(
            Hostname::parse("example.com").unwrap().as_str(),
            "example.com"
        );
        assert_eq!(
            Hostname::parse("shop.example.co.uk").unwrap().as_str(),
            "shop.example.co.uk"
        );
    }

    #[test]
    fn test_scheme_www_and_case_normalize_identically() {
        let a = Hostname::parse("HTTPS://WWW.Example.com/").unwrap();
        let b = Hostname::parse("example.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "example.com");
    }

    #[test]
    fn test_strips_path_query_port_and_trailing_dot() {
        assert_eq!(
            Hostname::parse("  http://shop.example.com:8080/products?x=1#top ")
                .unwrap()
                .as_str(),
            "shop.example.com"
        );
        assert_eq!(
            Hostname::parse("example.com.").unwrap().as_str(),
            "example.com"
        );
    }

    #[test]
    fn test_www_only_stripped_once() {
        assert_eq!(
            Hostname::parse("www.www.example.com").unwrap().as_str(),
            "www.example.com"
        );
    }

    #[test]
    fn test_www_kept_when_it_is_the_apex() {
        assert_eq!(Hostname::parse("www.com").unwrap().as_str(), "www.com");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Hostname::parse(""), Err(HostnameError::Empty));
        assert_eq!(Hostname::parse("https://"), Err(HostnameError::Empty));
        assert_eq!(Hostname::parse("   "), Err(HostnameError::Empty));
    }

    #[test]
    fn test_parse_single_label() {
        assert_eq!(
            Hostname::parse("localhost"),
            Err(HostnameError::SingleLabel)
        );
    }

    #[test]
    fn test_parse_invalid_labels() {
        assert!(matches!(
            Hostname::parse("bad_label.example.com"),
            Err(HostnameError::InvalidLabel { .. })
        ));
        assert!(matches!(
            Hostname::parse("-shop.example.com"),
            Err(HostnameError::InvalidLabel { .. })
        ));
        assert!(matches!(
            Hostname::parse("shop..example.com"),
            Err(HostnameError::InvalidLabel { .. })
        ));
        assert!(matches!(
            Hostname::parse(&format!("{}.com", "a".repeat(64))),
            Err(HostnameError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_parse_numeric_tld() {
        assert_eq!(
            Hostname::parse("192.168.0.1"),
            Err(HostnameError::NumericTld)
        );
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}.com", vec!["a".repeat(60); 5].join("."));
        assert!(matches!(
            Hostname::parse(&long),
            Err(HostnameError::TooLong { .. })
        ));
    }

    #[test]
    fn test_is_apex_and_subdomain() {
        let apex = Hostname::parse("example.com").unwrap();
        assert!(apex.is_apex());
        assert_eq!(apex.subdomain(), None);

        let sub = Hostname::parse("shop.eu.example.com").unwrap();
        assert!(!sub.is_apex());
        assert_eq!(sub.subdomain(), Some("shop.eu"));
        assert_eq!(sub.apex(), "example.com");
        assert_eq!(apex.apex(), "example.com");
    }

    #[test]
    fn test_deserialize_normalizes() {
        let host: Hostname = serde_json::from_str("\"WWW.Example.COM\"").unwrap();
        assert_eq!(host.as_str(), "example.com");
        assert!(serde_json::from_str::<Hostname>("\"nope\"").is_err());
    }
}
