//! DNS record instructions shown to merchants during domain setup.

use serde::{Deserialize, Serialize};

/// DNS record types the hosting provider may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Cname,
    Txt,
}

impl std::fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DnsRecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "CNAME" => Ok(Self::Cname),
            "TXT" => Ok(Self::Txt),
            _ => Err(format!("unsupported DNS record type: {s}")),
        }
    }
}

/// A record the merchant must create at their registrar.
///
/// Rendered verbatim by the dashboard, so the serialized shape is the flat
/// `{type, name, value, ttl}` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record type.
    #[serde(rename = "type")]
    pub record_type: DnsRecordType,
    /// Host/name field, relative to the zone (`@` for the apex).
    pub name: String,
    /// Value/target field.
    pub value: String,
    /// Suggested TTL in seconds.
    pub ttl: u32,
}

impl DnsRecord {
    /// Create a new DNS record instruction.
    #[must_use]
    pub fn new(
        record_type: DnsRecordType,
        name: impl Into<String>,
        value: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            record_type,
            name: name.into(),
            value: value.into(),
            ttl,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_flat_tuple() {
        let record = DnsRecord::new(DnsRecordType::Cname, "shop", "cname.vercel-dns.com", 3600);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "CNAME",
                "name": "shop",
                "value": "cname.vercel-dns.com",
                "ttl": 3600
            })
        );
    }

    #[test]
    fn test_record_type_from_str_is_case_insensitive() {
        assert_eq!("txt".parse::<DnsRecordType>().unwrap(), DnsRecordType::Txt);
        assert_eq!("AAAA".parse::<DnsRecordType>().unwrap(), DnsRecordType::Aaaa);
        assert!("MX".parse::<DnsRecordType>().is_err());
    }
}
