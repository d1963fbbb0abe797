//! In-process domain store.
//!
//! Every operation takes the single state lock for its whole duration, which
//! makes `set_primary` and the cascade on `delete` trivially atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use storeforge_core::{DnsRecord, DomainId, DomainStatus, Hostname, OwnerId};

use super::{DomainStore, NewDomain, StoreError};
use crate::models::{Domain, StatusUpdate, ThemePublication};

/// Domain store backed by in-memory maps.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    domains: HashMap<DomainId, Domain>,
    publications: HashMap<DomainId, ThemePublication>,
}

impl State {
    fn sorted(&self, mut keep: impl FnMut(&Domain) -> bool) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self
            .domains
            .values()
            .filter(|d| keep(d))
            .cloned()
            .collect();
        domains.sort_by_key(|d| (d.created_at, d.id.as_i32()));
        domains
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of domains currently stored.
    pub async fn domain_count(&self) -> usize {
        self.state.read().await.domains.len()
    }

    /// Number of publications currently stored.
    pub async fn publication_count(&self) -> usize {
        self.state.read().await.publications.len()
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn create(&self, new: NewDomain) -> Result<Domain, StoreError> {
        let mut state = self.state.write().await;

        if state.domains.values().any(|d| d.hostname == new.hostname) {
            return Err(StoreError::DuplicateHostname(new.hostname));
        }

        state.last_id += 1;
        let domain = Domain {
            id: DomainId::new(state.last_id),
            owner_id: new.owner_id,
            hostname: new.hostname,
            status: DomainStatus::Pending,
            is_primary: false,
            dns_requirements: new.dns_requirements,
            last_checked_at: None,
            verified_at: None,
            error_message: None,
            created_at: Utc::now(),
        };
        state.domains.insert(domain.id, domain.clone());

        Ok(domain)
    }

    async fn get(&self, id: DomainId) -> Result<Option<Domain>, StoreError> {
        Ok(self.state.read().await.domains.get(&id).cloned())
    }

    async fn find_by_hostname(&self, hostname: &Hostname) -> Result<Option<Domain>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .domains
            .values()
            .find(|d| &d.hostname == hostname)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Domain>, StoreError> {
        Ok(self.state.read().await.sorted(|d| d.owner_id == owner_id))
    }

    async fn list_by_status(
        &self,
        owner_id: Option<OwnerId>,
        statuses: &[DomainStatus],
    ) -> Result<Vec<Domain>, StoreError> {
        let state = self.state.read().await;
        Ok(state.sorted(|d| {
            statuses.contains(&d.status) && owner_id.is_none_or(|owner| d.owner_id == owner)
        }))
    }

    async fn set_primary(&self, owner_id: OwnerId, id: DomainId) -> Result<Domain, StoreError> {
        let mut state = self.state.write().await;

        let target = state
            .domains
            .get(&id)
            .filter(|d| d.owner_id == owner_id)
            .ok_or(StoreError::NotFound)?;
        if !target.is_verified() {
            return Err(StoreError::NotVerified);
        }

        for domain in state.domains.values_mut() {
            if domain.owner_id == owner_id {
                domain.is_primary = domain.id == id;
            }
        }

        state.domains.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_status(
        &self,
        id: DomainId,
        update: &StatusUpdate,
    ) -> Result<Option<Domain>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.domains.get_mut(&id).map(|domain| {
            update.apply_to(domain);
            domain.clone()
        }))
    }

    async fn replace_requirements(
        &self,
        id: DomainId,
        records: &[DnsRecord],
    ) -> Result<Option<Domain>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.domains.get_mut(&id).map(|domain| {
            domain.dns_requirements = records.to_vec();
            domain.clone()
        }))
    }

    async fn delete(&self, id: DomainId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.publications.remove(&id);
        Ok(state.domains.remove(&id).is_some())
    }

    async fn upsert_publication(
        &self,
        publication: &ThemePublication,
    ) -> Result<ThemePublication, StoreError> {
        let mut state = self.state.write().await;

        let domain = state
            .domains
            .get(&publication.domain_id)
            .ok_or(StoreError::NotFound)?;
        if !domain.is_verified() {
            return Err(StoreError::NotVerified);
        }

        state
            .publications
            .insert(publication.domain_id, publication.clone());
        Ok(publication.clone())
    }

    async fn get_publication(&self, id: DomainId) -> Result<Option<ThemePublication>, StoreError> {
        Ok(self.state.read().await.publications.get(&id).cloned())
    }

    async fn delete_publication(&self, id: DomainId) -> Result<bool, StoreError> {
        Ok(self.state.write().await.publications.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
