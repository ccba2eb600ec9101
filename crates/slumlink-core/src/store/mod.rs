//! Persistence for distribution sessions and the reference data they are
//! validated against.
//!
//! Mutating operations run through a [`StoreTransaction`]: every validation
//! read and the final write share one atomic unit. Dropping a transaction
//! without committing rolls it back.

mod memory;
mod postgres;

pub use memory::{InMemoryStore, SeedData};
pub use postgres::PostgresStore;

use crate::error::{DistributionError, DistributionResult};
use crate::history::{CampaignImpact, DayTotal, DistributionDetail, FamilyHistoryRow};
use crate::types::{
    AidType, AidTypeId, BeneficiaryFamily, Campaign, CampaignId, CampaignTarget,
    DistributionEntry, DistributionSession, FamilyMember, NewEntry, NewSession, Notification,
    OrgId, Organization, RecordedEntry, SessionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Store backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Keep everything in process memory, optionally seeded from a JSON file.
    Memory {
        #[serde(default)]
        seed_path: Option<PathBuf>,
    },
    /// PostgreSQL; the schema is created on bootstrap when missing.
    Postgres {
        url: String,
        #[serde(default = "default_pool_size")]
        max_connections: u32,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u64,
    },
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::Memory { seed_path: None }
    }

    pub fn postgres(url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            url: url.into(),
            max_connections,
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

/// Build the configured backend.
pub async fn bootstrap(config: &StoreConfig) -> DistributionResult<Arc<dyn DistributionStore>> {
    match config {
        StoreConfig::Memory { seed_path: None } => Ok(Arc::new(InMemoryStore::new())),
        StoreConfig::Memory {
            seed_path: Some(path),
        } => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                DistributionError::storage(format!("read seed '{}' failed: {e}", path.display()))
            })?;
            let seed: SeedData = serde_json::from_str(&raw)
                .map_err(|e| DistributionError::Serialization(e.to_string()))?;
            Ok(Arc::new(InMemoryStore::from_seed(seed)))
        }
        StoreConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = PostgresStore::connect(url, *max_connections, *connect_timeout_secs).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Read-side queries plus the entry point for transactional work.
#[async_trait]
pub trait DistributionStore: Send + Sync {
    fn backend_label(&self) -> &'static str;

    async fn begin(&self) -> DistributionResult<Box<dyn StoreTransaction>>;

    async fn find_campaign(&self, id: CampaignId) -> DistributionResult<Option<Campaign>>;

    async fn find_family(&self, slum_code: &str) -> DistributionResult<Option<BeneficiaryFamily>>;

    async fn list_family_members(&self, slum_code: &str) -> DistributionResult<Vec<FamilyMember>>;

    /// Most recent entries for one family across all organizations and campaigns.
    async fn family_history(
        &self,
        slum_code: &str,
        limit: usize,
    ) -> DistributionResult<Vec<FamilyHistoryRow>>;

    /// Per-day totals with each family counted once per day, most recent day first.
    async fn campaign_day_totals(&self, campaign_id: CampaignId) -> DistributionResult<Vec<DayTotal>>;

    /// One row per entry, ordered by timestamp then entry id.
    async fn campaign_distributions(
        &self,
        campaign_id: CampaignId,
    ) -> DistributionResult<Vec<DistributionDetail>>;

    async fn campaign_impact(&self, campaign_id: CampaignId) -> DistributionResult<CampaignImpact>;

    async fn find_session(&self, id: SessionId) -> DistributionResult<Option<DistributionSession>>;

    async fn list_session_entries(
        &self,
        session_id: SessionId,
    ) -> DistributionResult<Vec<DistributionEntry>>;
}

/// One atomic unit of validation reads and writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_organization(&mut self, id: OrgId) -> DistributionResult<Option<Organization>>;

    async fn find_campaign(&mut self, id: CampaignId) -> DistributionResult<Option<Campaign>>;

    async fn find_aid_type(&mut self, id: AidTypeId) -> DistributionResult<Option<AidType>>;

    async fn find_family(&mut self, slum_code: &str)
        -> DistributionResult<Option<BeneficiaryFamily>>;

    async fn find_campaign_target(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<CampaignTarget>>;

    /// First notification for the pair whose kind implies eligibility.
    async fn find_eligibility_notification(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<Notification>>;

    async fn find_session(&mut self, id: SessionId)
        -> DistributionResult<Option<DistributionSession>>;

    async fn find_open_session(
        &mut self,
        campaign_id: CampaignId,
        org_id: OrgId,
        aid_type_id: AidTypeId,
    ) -> DistributionResult<Option<DistributionSession>>;

    async fn insert_session(&mut self, session: NewSession)
        -> DistributionResult<DistributionSession>;

    /// Close an OPEN session. Returns `false` when it was no longer open.
    async fn close_session(
        &mut self,
        id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> DistributionResult<bool>;

    /// Insert an entry, assigning the next round for its (campaign, family).
    async fn insert_entry(&mut self, entry: NewEntry) -> DistributionResult<RecordedEntry>;

    async fn commit(self: Box<Self>) -> DistributionResult<()>;

    async fn rollback(self: Box<Self>) -> DistributionResult<()>;
}
