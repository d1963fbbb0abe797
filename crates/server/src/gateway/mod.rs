//! Hosting provider gateway.
//!
//! Every call to the external hosting platform goes through the
//! [`DomainGateway`] trait:
//!
//! - [`HostingClient`] talks HTTP to a Vercel-style project domains API
//! - [`RetryingGateway`] wraps any gateway with a per-call timeout and
//!   bounded exponential backoff for transient failures
//! - `ScriptedGateway` (tests and the `test-util` feature) is an in-process fake
//!
//! The gateway holds no mutable shared state beyond connection and timeout
//! configuration. Domain status lives only in the store.

pub mod client;
pub mod retry;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use client::HostingClient;
pub use retry::{RetryPolicy, RetryingGateway, with_retry};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptedCheck, ScriptedGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storeforge_core::{DnsRecord, DnsRecordType, Hostname};

/// Apex record target for hostnames without a subdomain.
pub const APEX_A_RECORD: &str = "76.76.21.21";

/// CNAME target for subdomains.
pub const SUBDOMAIN_CNAME_TARGET: &str = "cname.vercel-dns.com";

/// Errors that can occur when interacting with the hosting provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The provider refused the hostname as malformed.
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    /// The hostname is bound to a different provider project.
    #[error("hostname is already in use by another project")]
    AlreadyRegistered,

    /// The hostname was never registered with the provider.
    #[error("domain is not registered with the hosting provider")]
    NotFound,

    /// Network failure, timeout, rate limit or provider 5xx.
    #[error("hosting provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Any other provider error response.
    #[error("hosting provider rejected the request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with a body we could not parse.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The client could not be built from its configuration.
    #[error("gateway configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Whether the call may succeed if repeated. Only provider outages are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}

/// Result of registering a hostname with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDomain {
    /// Provider-side identifier of the domain binding.
    pub provider_domain_id: String,
    /// Records the merchant must add, routing record first.
    pub dns_requirements: Vec<DnsRecord>,
}

/// What the provider knows about a domain's DNS setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Records the provider is still waiting for.
    pub missing_records: Vec<DnsRecord>,
    /// The provider found DNS records but they do not point at it yet.
    pub misconfigured: bool,
    /// Records look right but the provider has not seen them everywhere yet.
    pub propagation_pending: bool,
    /// Free-form explanation returned by the provider, if any.
    pub provider_message: Option<String>,
}

/// Outcome of asking the provider whether a domain is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Ownership confirmed and DNS pointing at the provider.
    pub verified: bool,
    /// Why not, when `verified` is false.
    pub diagnostics: Diagnostics,
}

impl VerificationReport {
    /// A report for a fully verified domain.
    #[must_use]
    pub fn verified() -> Self {
        Self {
            verified: true,
            diagnostics: Diagnostics::default(),
        }
    }

    /// A report for a domain that is not verified yet.
    #[must_use]
    pub const fn unverified(diagnostics: Diagnostics) -> Self {
        Self {
            verified: false,
            diagnostics,
        }
    }
}

/// Narrow client interface to the hosting provider's domain API.
#[async_trait]
pub trait DomainGateway: Send + Sync {
    /// Bind `hostname` to the storefront project and return its DNS instructions.
    async fn register_domain(&self, hostname: &Hostname) -> Result<RegisteredDomain, GatewayError>;

    /// Re-read the DNS instructions for an already registered hostname.
    async fn fetch_requirements(&self, hostname: &Hostname) -> Result<Vec<DnsRecord>, GatewayError>;

    /// Ask the provider whether `hostname` is verified. Read-only for the caller.
    async fn fetch_verification_status(
        &self,
        hostname: &Hostname,
    ) -> Result<VerificationReport, GatewayError>;

    /// Remove the provider-side binding. Callers treat failures as best-effort.
    async fn deregister_domain(&self, hostname: &Hostname) -> Result<(), GatewayError>;
}

/// The record that routes traffic for `hostname` to the provider.
///
/// `apex` is the registrable domain the provider reports, which may span more
/// than two labels (`example.co.uk`).
#[must_use]
pub fn routing_record(hostname: &Hostname, apex: &str, ttl: u32) -> DnsRecord {
    match relative_name(hostname.as_str(), apex).as_str() {
        "@" => DnsRecord::new(DnsRecordType::A, "@", APEX_A_RECORD, ttl),
        sub => DnsRecord::new(DnsRecordType::Cname, sub, SUBDOMAIN_CNAME_TARGET, ttl),
    }
}

/// `_vercel.example.com` relative to `example.com` is `_vercel`; the apex itself is `@`.
pub(crate) fn relative_name(fqdn: &str, apex: &str) -> String {
    let fqdn = fqdn.trim_end_matches('.').to_ascii_lowercase();
    let apex = apex.trim_end_matches('.').to_ascii_lowercase();
    if fqdn == apex {
        return "@".to_string();
    }
    fqdn.strip_suffix(apex.as_str())
        .and_then(|prefix| prefix.strip_suffix('.'))
        .map_or_else(|| fqdn.clone(), str::to_string)
}
