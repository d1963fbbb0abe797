//! HTTP client for a Vercel-style project domains API.
//!
//! # Endpoints
//!
//! - `POST /v10/projects/{project}/domains` - Bind a hostname to the project
//! - `GET /v9/projects/{project}/domains/{name}` - Binding and TXT challenges
//! - `POST /v9/projects/{project}/domains/{name}/verify` - Re-run ownership check
//! - `GET /v6/domains/{name}/config` - Whether DNS points at the provider
//! - `DELETE /v9/projects/{project}/domains/{name}` - Remove the binding
//!
//! Authentication is a bearer token. When the account belongs to a team,
//! every request carries a `teamId` query parameter.
//!
//! The client does no retrying of its own; wrap it in
//! [`RetryingGateway`](super::RetryingGateway).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use storeforge_core::{DnsRecord, DnsRecordType, Hostname};

use super::{
    Diagnostics, DomainGateway, GatewayError, RegisteredDomain, VerificationReport, relative_name,
    routing_record,
};
use crate::config::HostingConfig;

/// Provider error code for a hostname bound to another project.
const CODE_IN_USE: &str = "domain_already_in_use";
/// Provider error code for a hostname owned by another account.
const CODE_TAKEN: &str = "domain_taken";
/// Provider error code for a hostname already bound to this project.
const CODE_EXISTS: &str = "domain_already_exists";
/// Provider error codes for malformed hostnames.
const CODES_INVALID: &[&str] = &["invalid_domain", "invalid_name"];

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct AddDomainRequest<'a> {
    name: &'a str,
}

/// A domain binding as returned by the project domains endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDomain {
    name: String,
    #[serde(default)]
    apex_name: Option<String>,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    verification: Vec<VerificationChallenge>,
}

impl ProjectDomain {
    /// The provider's apex, or the last two labels when it sent none.
    fn apex<'a>(&'a self, hostname: &'a Hostname) -> &'a str {
        self.apex_name.as_deref().unwrap_or_else(|| hostname.apex())
    }
}

#[derive(Debug, Deserialize)]
struct VerificationChallenge {
    #[serde(rename = "type")]
    record_type: String,
    domain: String,
    value: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainConfig {
    #[serde(default)]
    misconfigured: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A non-success response, before classification.
#[derive(Debug)]
struct ProviderFailure {
    status: StatusCode,
    code: Option<String>,
    message: String,
}

impl ProviderFailure {
    fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// A hostname already bound to this project, left over from an earlier
    /// attempt whose local write failed.
    fn is_existing_binding(&self) -> bool {
        self.has_code(CODE_EXISTS)
    }

    /// The ownership check ran and failed. Anything else is a real error.
    fn is_failed_ownership_check(&self) -> bool {
        self.status.is_client_error() && self.status != StatusCode::NOT_FOUND
    }
}

impl From<ProviderFailure> for GatewayError {
    fn from(failure: ProviderFailure) -> Self {
        let ProviderFailure {
            status,
            code,
            message,
        } = failure;
        let code = code.as_deref().unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Self::ProviderUnavailable(format!("{}: {message}", status.as_u16()));
        }
        if status == StatusCode::NOT_FOUND {
            return Self::NotFound;
        }
        if status == StatusCode::CONFLICT || code == CODE_IN_USE || code == CODE_TAKEN {
            return Self::AlreadyRegistered;
        }
        if CODES_INVALID.contains(&code) {
            return Self::InvalidHostname(message);
        }

        Self::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn transport_error(e: &reqwest::Error) -> GatewayError {
    GatewayError::ProviderUnavailable(format!("request failed: {e}"))
}

// =============================================================================
// Client
// =============================================================================

/// Hosting provider API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HostingClient {
    inner: Arc<HostingClientInner>,
}

struct HostingClientInner {
    client: reqwest::Client,
    base_url: Url,
    project_id: String,
    team_id: Option<String>,
    record_ttl: u32,
}

impl HostingClient {
    /// Create a new client for the configured provider account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the token is not a valid
    /// header value or the HTTP client fails to build.
    pub fn new(config: &HostingConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.account.api_token.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| GatewayError::Configuration(format!("invalid API token format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build client: {e}")))?;

        // Url::join replaces the last path segment unless it ends in '/'
        let mut base_url = config.api_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(HostingClientInner {
                client,
                base_url,
                project_id: config.account.project_id.clone(),
                team_id: config.account.team_id.clone(),
                record_ttl: config.record_ttl,
            }),
        })
    }

    /// Build an absolute endpoint URL, adding `teamId` when configured.
    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Configuration(format!("invalid endpoint {path}: {e}")))?;

        if let Some(team_id) = &self.inner.team_id {
            url.query_pairs_mut().append_pair("teamId", team_id);
        }

        Ok(url)
    }

    fn project_domains_path(&self, version: &str) -> String {
        format!("{version}/projects/{}/domains", self.inner.project_id)
    }

    fn project_domain_path(&self, hostname: &Hostname) -> String {
        format!("{}/{hostname}", self.project_domains_path("v9"))
    }

    async fn get_project_domain(&self, hostname: &Hostname) -> Result<ProjectDomain, GatewayError> {
        let url = self.endpoint(&self.project_domain_path(hostname))?;
        let response = self
            .inner
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::handle_response(response)
            .await?
            .map_err(GatewayError::from)
    }

    async fn verify_project_domain(
        &self,
        hostname: &Hostname,
    ) -> Result<Result<ProjectDomain, ProviderFailure>, GatewayError> {
        let url = self.endpoint(&format!("{}/verify", self.project_domain_path(hostname)))?;
        let response = self
            .inner
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::handle_response(response).await
    }

    async fn get_domain_config(&self, hostname: &Hostname) -> Result<DomainConfig, GatewayError> {
        let url = self.endpoint(&format!("v6/domains/{hostname}/config"))?;
        let response = self
            .inner
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::handle_response(response)
            .await?
            .map_err(GatewayError::from)
    }

    /// Turn a provider domain into the records a merchant must add.
    fn requirements_for(&self, hostname: &Hostname, domain: &ProjectDomain) -> Vec<DnsRecord> {
        let ttl = self.inner.record_ttl;
        let apex = domain.apex(hostname);

        let mut records = vec![routing_record(hostname, apex, ttl)];
        records.extend(
            domain
                .verification
                .iter()
                .filter_map(|challenge| challenge_record(challenge, apex, ttl)),
        );
        records
    }

    /// Decode a success body, or capture a failure for the caller to classify.
    ///
    /// The outer error covers transport and parse problems; the inner one is
    /// a well-formed provider error response.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Result<T, ProviderFailure>, GatewayError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map(Ok)
                .map_err(|e| GatewayError::InvalidResponse(format!("failed to parse response: {e}")));
        }

        Ok(Err(Self::parse_error(response).await))
    }

    /// Parse an error response body.
    async fn parse_error(response: reqwest::Response) -> ProviderFailure {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => ProviderFailure {
                status,
                code: envelope.error.code,
                message: envelope
                    .error
                    .message
                    .unwrap_or_else(|| status.to_string()),
            },
            Err(_) => ProviderFailure {
                status,
                code: None,
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            },
        }
    }
}

/// Convert a provider challenge into a DNS record relative to `apex`.
fn challenge_record(challenge: &VerificationChallenge, apex: &str, ttl: u32) -> Option<DnsRecord> {
    let record_type = match challenge.record_type.parse::<DnsRecordType>() {
        Ok(record_type) => record_type,
        Err(e) => {
            warn!(record_type = %challenge.record_type, error = %e, "Skipping unsupported challenge record");
            return None;
        }
    };

    Some(DnsRecord::new(
        record_type,
        relative_name(&challenge.domain, apex),
        challenge.value.clone(),
        ttl,
    ))
}

/// Compose the verification report from the provider's binding and DNS config.
///
/// Verified means the ownership check passed and DNS points at the provider.
/// A passed check with DNS still misconfigured is reported as propagation.
fn verification_report(
    hostname: &Hostname,
    domain: &ProjectDomain,
    config: &DomainConfig,
    mut provider_message: Option<String>,
    ttl: u32,
) -> VerificationReport {
    if domain.verified && !config.misconfigured {
        return VerificationReport::verified();
    }

    let apex = domain.apex(hostname);
    let mut missing_records = Vec::new();
    if config.misconfigured {
        missing_records.push(routing_record(hostname, apex, ttl));
    }
    if !domain.verified {
        missing_records.extend(
            domain
                .verification
                .iter()
                .filter_map(|c| challenge_record(c, apex, ttl)),
        );
        if provider_message.is_none() {
            provider_message = domain.verification.iter().find_map(|c| c.reason.clone());
        }
    }

    VerificationReport::unverified(Diagnostics {
        propagation_pending: domain.verified && config.misconfigured,
        misconfigured: config.misconfigured,
        missing_records,
        provider_message,
    })
}

/// Whether a DELETE response leaves the hostname unbound. 404 means already gone.
fn is_unbound(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}

#[async_trait]
impl DomainGateway for HostingClient {
    #[instrument(skip(self), fields(hostname = %hostname, project = %self.inner.project_id))]
    async fn register_domain(&self, hostname: &Hostname) -> Result<RegisteredDomain, GatewayError> {
        let url = self.endpoint(&self.project_domains_path("v10"))?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&AddDomainRequest {
                name: hostname.as_str(),
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let domain = match Self::handle_response::<ProjectDomain>(response).await? {
            Ok(domain) => domain,
            Err(failure) if failure.is_existing_binding() => {
                debug!("Domain already bound to this project, reusing binding");
                self.get_project_domain(hostname).await?
            }
            Err(failure) => return Err(failure.into()),
        };

        info!(verified = domain.verified, "Registered domain with hosting provider");

        Ok(RegisteredDomain {
            dns_requirements: self.requirements_for(hostname, &domain),
            provider_domain_id: domain.name,
        })
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn fetch_requirements(&self, hostname: &Hostname) -> Result<Vec<DnsRecord>, GatewayError> {
        let domain = self.get_project_domain(hostname).await?;
        Ok(self.requirements_for(hostname, &domain))
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn fetch_verification_status(
        &self,
        hostname: &Hostname,
    ) -> Result<VerificationReport, GatewayError> {
        let mut domain = self.get_project_domain(hostname).await?;
        let mut provider_message = None;

        if !domain.verified {
            match self.verify_project_domain(hostname).await? {
                Ok(verified) => domain = verified,
                Err(failure) if failure.is_failed_ownership_check() => {
                    provider_message = Some(failure.message);
                }
                Err(failure) => return Err(failure.into()),
            }
        }

        let config = self.get_domain_config(hostname).await?;
        debug!(
            verified = domain.verified,
            misconfigured = config.misconfigured,
            "Fetched domain verification status"
        );

        Ok(verification_report(
            hostname,
            &domain,
            &config,
            provider_message,
            self.inner.record_ttl,
        ))
    }

    #[instrument(skip(self), fields(hostname = %hostname))]
    async fn deregister_domain(&self, hostname: &Hostname) -> Result<(), GatewayError> {
        let url = self.endpoint(&self.project_domain_path(hostname))?;
        let response = self
            .inner
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if is_unbound(response.status()) {
            return Ok(());
        }

        Err(Self::parse_error(response).await.into())
    }
}

impl std::fmt::Debug for HostingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("project_id", &self.inner.project_id)
            .field("team_id", &self.inner.team_id)
            .finish_non_exhaustive()
    }
}
