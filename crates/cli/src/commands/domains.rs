//! Domain management commands.
//!
//! These run the same service the HTTP API uses, against the same database
//! and hosting project, so support staff can inspect or repair a merchant's
//! domains without going through the dashboard.
//!
//! # Usage
//!
//! ```bash
//! sf-cli domains list --owner 42
//! sf-cli domains add --owner 42 shop.example.com
//! sf-cli domains refresh --owner 42 --include-errors
//! sf-cli domains refresh                        # every owner
//! sf-cli domains verify --owner 42 7
//! sf-cli domains set-primary --owner 42 7
//! sf-cli domains publish --owner 42 7 --theme-id aurora --theme-name Aurora
//! sf-cli domains status --owner 42 7
//! ```
//!
//! Results are printed to stdout as JSON.
//!
//! # Environment Variables
//!
//! - `STOREFORGE_DATABASE_URL` - `PostgreSQL` connection string
//! - `HOSTING_API_TOKEN`, `HOSTING_PROJECT_ID` - Hosting provider account
//! - `VERIFY_CONCURRENCY` - Parallel checks during `refresh`

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use storeforge_core::{DomainId, OwnerId, ThemeId};
use storeforge_server::config::{
    ConfigError, HostingConfig, VerificationConfig, get_database_url,
};
use storeforge_server::db::{self, PgDomainStore};
use storeforge_server::error::DomainError;
use storeforge_server::gateway::{GatewayError, HostingClient, RetryPolicy, RetryingGateway};
use storeforge_server::models::CheckReport;
use storeforge_server::services::{CheckOptions, DomainService};

/// Errors that can occur during domain commands.
#[derive(Debug, Error)]
pub enum DomainCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Hosting client error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Could not encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Connect to the database and the hosting provider.
async fn connect() -> Result<DomainService, DomainCommandError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("STOREFORGE_DATABASE_URL")?;
    let hosting = HostingConfig::from_env()?;
    let verification = VerificationConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool: PgPool = db::create_pool(&database_url).await?;

    let client = HostingClient::new(&hosting)?;
    let gateway = RetryingGateway::new(client, RetryPolicy::from_config(&hosting));

    Ok(DomainService::new(
        Arc::new(PgDomainStore::new(pool)),
        Arc::new(gateway),
        &verification,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DomainCommandError> {
    let out = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{out}");
    }
    Ok(())
}

/// List an owner's domains.
pub async fn list(owner: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let domains = service.list_domains(OwnerId::new(owner)).await?;
    print_json(&domains)
}

/// Connect a new hostname for an owner.
pub async fn add(owner: i32, hostname: &str) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let domain = service.add_domain(OwnerId::new(owner), hostname).await?;

    tracing::info!(
        "Domain {} added with {} DNS record(s) to configure",
        domain.hostname,
        domain.dns_requirements.len()
    );
    print_json(&domain)
}

/// Re-check pending domains for one owner, or for everyone.
pub async fn refresh(owner: Option<i32>, include_errors: bool) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let options = CheckOptions { include_errors };

    let outcomes = match owner {
        Some(owner) => service.refresh_owner(OwnerId::new(owner), options).await?,
        None => service.refresh_all(options).await?,
    };

    let verified = outcomes.iter().filter(|o| o.is_verified()).count();
    tracing::info!("Checked {} domain(s), {} verified", outcomes.len(), verified);

    let reports: Vec<CheckReport> = outcomes.into_iter().map(CheckReport::from).collect();
    print_json(&reports)
}

/// Re-check one domain, failing unless it is verified.
pub async fn verify(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let domain = service
        .verify_domain(OwnerId::new(owner), DomainId::new(id))
        .await?;
    print_json(&domain)
}

/// Re-fetch the DNS records a domain still needs.
pub async fn requirements(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let domain = service
        .refresh_requirements(OwnerId::new(owner), DomainId::new(id))
        .await?;
    print_json(&domain.dns_requirements)
}

/// Make a verified domain the owner's primary.
pub async fn set_primary(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let domain = service
        .set_primary(OwnerId::new(owner), DomainId::new(id))
        .await?;
    print_json(&domain)
}

/// Delete a domain and release it at the provider.
pub async fn delete(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    service
        .delete_domain(OwnerId::new(owner), DomainId::new(id))
        .await?;
    tracing::info!("Domain {} deleted", id);
    Ok(())
}

/// Publish a theme to a verified domain.
pub async fn publish(
    owner: i32,
    id: i32,
    theme_id: String,
    theme_name: String,
) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let publication = service
        .publish_theme(
            OwnerId::new(owner),
            DomainId::new(id),
            ThemeId::new(theme_id),
            theme_name,
        )
        .await?;
    print_json(&publication)
}

/// Stop serving a theme on a domain.
pub async fn unpublish(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let removed = service
        .unpublish_theme(OwnerId::new(owner), DomainId::new(id))
        .await?;
    if removed {
        tracing::info!("Theme unpublished from domain {}", id);
    } else {
        tracing::warn!("Domain {} had no published theme", id);
    }
    Ok(())
}

/// Show which theme a domain serves.
pub async fn status(owner: i32, id: i32) -> Result<(), DomainCommandError> {
    let service = connect().await?;
    let status = service
        .publication_status(OwnerId::new(owner), DomainId::new(id))
        .await?;
    print_json(&status)
}
