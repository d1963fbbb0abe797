//! Persistence for custom domains and theme publications.
//!
//! # Tables
//!
//! - `domains` - One row per merchant hostname, unique on `hostname`,
//!   indexed on `owner_id`, at most one `is_primary` row per owner
//! - `theme_publications` - One row per domain (replace-on-publish),
//!   deleted with its domain
//!
//! # Backends
//!
//! - [`PgDomainStore`] - `PostgreSQL`, used by the server and CLI
//! - [`MemoryStore`] - In-process, used by tests
//!
//! Both hold the same invariants; the store is the single source of truth
//! and nothing above it caches domain status.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p storeforge-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use storeforge_core::{DnsRecord, DomainId, DomainStatus, Hostname, OwnerId};

use crate::models::{Domain, StatusUpdate, ThemePublication};

pub use memory::MemoryStore;
pub use postgres::PgDomainStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another domain record already holds this hostname.
    #[error("hostname already exists: {0}")]
    DuplicateHostname(Hostname),

    /// Requested domain was not found (or is not owned by the caller).
    #[error("not found")]
    NotFound,

    /// The operation requires a verified domain.
    #[error("domain is not verified")]
    NotVerified,

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Parameters for inserting a new domain.
#[derive(Debug, Clone)]
pub struct NewDomain {
    /// Owning merchant/store.
    pub owner_id: OwnerId,
    /// Normalized hostname.
    pub hostname: Hostname,
    /// DNS instructions issued by the hosting provider.
    pub dns_requirements: Vec<DnsRecord>,
}

/// Durable storage for domains and their publications.
///
/// Both logical tables live behind one trait so that deleting a domain and
/// its publication is a single atomic operation.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Insert a new `pending`, non-primary domain.
    ///
    /// Fails with [`StoreError::DuplicateHostname`] if any owner already holds
    /// the hostname.
    async fn create(&self, new: NewDomain) -> Result<Domain, StoreError>;

    /// Fetch a domain by ID.
    async fn get(&self, id: DomainId) -> Result<Option<Domain>, StoreError>;

    /// Fetch a domain by its normalized hostname.
    async fn find_by_hostname(&self, hostname: &Hostname) -> Result<Option<Domain>, StoreError>;

    /// All domains of an owner, oldest first.
    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Domain>, StoreError>;

    /// Domains in any of `statuses`, optionally limited to one owner, oldest first.
    async fn list_by_status(
        &self,
        owner_id: Option<OwnerId>,
        statuses: &[DomainStatus],
    ) -> Result<Vec<Domain>, StoreError>;

    /// Make `id` the owner's only primary domain, atomically.
    ///
    /// Fails with [`StoreError::NotFound`] if `id` does not belong to
    /// `owner_id`, and [`StoreError::NotVerified`] if it is not verified.
    async fn set_primary(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, StoreError>;

    /// Record the outcome of a verification check.
    ///
    /// Returns `None` without error if the domain was deleted concurrently.
    /// A verified domain keeps its status; only `last_checked_at` moves.
    async fn update_status(
        &self,
        id: DomainId,
        update: &StatusUpdate,
    ) -> Result<Option<Domain>, StoreError>;

    /// Replace the DNS instructions after an explicit refresh.
    ///
    /// Returns `None` if the domain no longer exists.
    async fn replace_requirements(
        &self,
        id: DomainId,
        records: &[DnsRecord],
    ) -> Result<Option<Domain>, StoreError>;

    /// Hard-delete a domain and its publication. Returns whether a row existed.
    async fn delete(&self, id: DomainId) -> Result<bool, StoreError>;

    /// Insert or replace the publication for `publication.domain_id`.
    ///
    /// The verified precondition is checked in the same write, failing with
    /// [`StoreError::NotVerified`] or [`StoreError::NotFound`].
    async fn upsert_publication(
        &self,
        publication: &ThemePublication,
    ) -> Result<ThemePublication, StoreError>;

    /// Fetch the active publication for a domain.
    async fn get_publication(&self, id: DomainId) -> Result<Option<ThemePublication>, StoreError>;

    /// Remove the publication for a domain. Returns whether one existed.
    async fn delete_publication(&self, id: DomainId) -> Result<bool, StoreError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
