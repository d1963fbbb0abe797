//! `PostgreSQL` domain store.
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow` rows)
//! so the crate builds without a live database or an offline query cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use storeforge_core::{DnsRecord, DomainId, DomainStatus, Hostname, OwnerId, ThemeId};

use super::{DomainStore, NewDomain, StoreError};
use crate::models::{Domain, StatusUpdate, ThemePublication};

const DOMAIN_COLUMNS: &str = "id, owner_id, hostname, status, is_primary, dns_requirements, \
     last_checked_at, verified_at, error_message, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `domains` queries.
#[derive(Debug, sqlx::FromRow)]
struct DomainRow {
    id: i32,
    owner_id: i32,
    hostname: String,
    status: DomainStatus,
    is_primary: bool,
    dns_requirements: Json<Vec<DnsRecord>>,
    last_checked_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DomainRow> for Domain {
    type Error = StoreError;

    fn try_from(row: DomainRow) -> Result<Self, Self::Error> {
        let hostname = Hostname::parse(&row.hostname).map_err(|e| {
            StoreError::DataCorruption(format!("invalid hostname in database: {e}"))
        })?;

        Ok(Self {
            id: DomainId::new(row.id),
            owner_id: OwnerId::new(row.owner_id),
            hostname,
            status: row.status,
            is_primary: row.is_primary,
            dns_requirements: row.dns_requirements.0,
            last_checked_at: row.last_checked_at,
            verified_at: row.verified_at,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for `theme_publications` queries.
#[derive(Debug, sqlx::FromRow)]
struct PublicationRow {
    domain_id: i32,
    theme_id: String,
    theme_name: String,
    published_at: DateTime<Utc>,
}

impl From<PublicationRow> for ThemePublication {
    fn from(row: PublicationRow) -> Self {
        Self {
            domain_id: DomainId::new(row.domain_id),
            theme_id: ThemeId::new(row.theme_id),
            theme_name: row.theme_name,
            published_at: row.published_at,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Domain store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDomainStore {
    pool: PgPool,
}

impl PgDomainStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl DomainStore for PgDomainStore {
    async fn create(&self, new: NewDomain) -> Result<Domain, StoreError> {
        let sql = format!(
            "INSERT INTO domains (owner_id, hostname, dns_requirements) \
             VALUES ($1, $2, $3) \
             RETURNING {DOMAIN_COLUMNS}"
        );

        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(new.owner_id)
            .bind(&new.hostname)
            .bind(Json(&new.dns_requirements))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::DuplicateHostname(new.hostname.clone());
                }
                StoreError::Database(e)
            })?;

        row.try_into()
    }

    async fn get(&self, id: DomainId) -> Result<Option<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = $1");
        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_hostname(&self, hostname: &Hostname) -> Result<Option<Domain>, StoreError> {
        let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE hostname = $1");
        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Domain>, StoreError> {
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains \
             WHERE owner_id = $1 \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(
        &self,
        owner_id: Option<OwnerId>,
        statuses: &[DomainStatus],
    ) -> Result<Vec<Domain>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_owned()).collect();
        let sql = format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains \
             WHERE status::text = ANY($1) \
               AND ($2::int4 IS NULL OR owner_id = $2) \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(statuses)
            .bind(owner_id.map(|o| o.as_i32()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_primary(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock every row of the owner so concurrent calls serialize here
        let owned: Vec<(i32, DomainStatus)> = sqlx::query_as(
            "SELECT id, status FROM domains WHERE owner_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;

        let (_, status) = owned
            .iter()
            .find(|(row_id, _)| *row_id == id.as_i32())
            .ok_or(StoreError::NotFound)?;
        if *status != DomainStatus::Verified {
            return Err(StoreError::NotVerified);
        }

        // Clear first: the partial unique index is checked row by row
        sqlx::query(
            "UPDATE domains SET is_primary = FALSE, updated_at = NOW() \
             WHERE owner_id = $1 AND is_primary AND id <> $2",
        )
        .bind(owner_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE domains SET is_primary = TRUE, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {DOMAIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        row.try_into()
    }

    async fn update_status(
        &self,
        id: DomainId,
        update: &StatusUpdate,
    ) -> Result<Option<Domain>, StoreError> {
        // `status` on the right-hand side is the pre-update value
        let sql = format!(
            "UPDATE domains SET \
                 last_checked_at = $3, \
                 verified_at = CASE \
                     WHEN status <> 'verified' AND $2 = 'verified' THEN COALESCE(verified_at, $3) \
                     ELSE verified_at END, \
                 error_message = CASE WHEN status = 'verified' THEN error_message ELSE $4 END, \
                 status = CASE WHEN status = 'verified' THEN status ELSE $2 END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {DOMAIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(id)
            .bind(update.status)
            .bind(update.checked_at)
            .bind(update.error_message.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn replace_requirements(
        &self,
        id: DomainId,
        records: &[DnsRecord],
    ) -> Result<Option<Domain>, StoreError> {
        let sql = format!(
            "UPDATE domains SET dns_requirements = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {DOMAIN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DomainRow>(&sql)
            .bind(id)
            .bind(Json(records))
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, id: DomainId) -> Result<bool, StoreError> {
        // theme_publications.domain_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_publication(
        &self,
        publication: &ThemePublication,
    ) -> Result<ThemePublication, StoreError> {
        let row = sqlx::query_as::<_, PublicationRow>(
            "INSERT INTO theme_publications (domain_id, theme_id, theme_name, published_at) \
             SELECT id, $2, $3, $4 FROM domains WHERE id = $1 AND status = 'verified' \
             ON CONFLICT (domain_id) DO UPDATE SET \
                 theme_id = EXCLUDED.theme_id, \
                 theme_name = EXCLUDED.theme_name, \
                 published_at = EXCLUDED.published_at \
             RETURNING domain_id, theme_id, theme_name, published_at",
        )
        .bind(publication.domain_id)
        .bind(&publication.theme_id)
        .bind(&publication.theme_name)
        .bind(publication.published_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        // Nothing inserted: tell a missing domain apart from an unverified one
        let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM domains WHERE id = $1")
            .bind(publication.domain_id)
            .fetch_optional(&self.pool)
            .await?;

        Err(if exists.is_some() {
            StoreError::NotVerified
        } else {
            StoreError::NotFound
        })
    }

    async fn get_publication(&self, id: DomainId) -> Result<Option<ThemePublication>, StoreError> {
        let row = sqlx::query_as::<_, PublicationRow>(
            "SELECT domain_id, theme_id, theme_name, published_at \
             FROM theme_publications WHERE domain_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_publication(&self, id: DomainId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM theme_publications WHERE domain_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
