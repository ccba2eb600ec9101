//! In-memory store for development and testing.

use super::{DistributionStore, StoreTransaction};
use crate::error::{DistributionError, DistributionResult};
use crate::history::{
    day_totals, impact_totals, CampaignImpact, DayTotal, DistributionDetail, FamilyDay,
    FamilyHistoryRow,
};
use crate::types::{
    AidType, AidTypeId, BeneficiaryFamily, Campaign, CampaignId, CampaignTarget,
    DistributionEntry, DistributionSession, FamilyMember, NewEntry, NewSession, Notification,
    OrgId, Organization, RecordedEntry, SessionId, SessionStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Reference data to preload into an in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub organizations: Vec<Organization>,
    pub campaigns: Vec<Campaign>,
    pub aid_types: Vec<AidType>,
    pub families: Vec<BeneficiaryFamily>,
    pub family_members: Vec<FamilyMember>,
    pub campaign_targets: Vec<CampaignTarget>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    organizations: BTreeMap<OrgId, Organization>,
    campaigns: BTreeMap<CampaignId, Campaign>,
    aid_types: BTreeMap<AidTypeId, AidType>,
    families: BTreeMap<String, BeneficiaryFamily>,
    family_members: Vec<FamilyMember>,
    campaign_targets: Vec<CampaignTarget>,
    notifications: Vec<Notification>,
    sessions: BTreeMap<SessionId, DistributionSession>,
    entries: Vec<DistributionEntry>,
    last_session_id: SessionId,
    last_entry_id: i64,
}

impl MemoryState {
    fn family_members_of(&self, slum_code: &str) -> i64 {
        self.families
            .get(slum_code)
            .map(|f| i64::from(f.family_members))
            .unwrap_or(0)
    }

    fn aid_type_of(&self, entry: &DistributionEntry) -> Option<&AidType> {
        self.sessions
            .get(&entry.session_id)
            .and_then(|s| self.aid_types.get(&s.aid_type_id))
    }

    fn org_name(&self, id: OrgId) -> String {
        self.organizations
            .get(&id)
            .map(|o| o.name.clone())
            .unwrap_or_default()
    }
}

/// All data behind one async mutex. A transaction holds the lock for its
/// lifetime and works on a staged copy that replaces the state on commit.
///
/// Each transaction clones the whole dataset and every read waits behind an
/// open transaction, so write cost grows with the number of entries. Meant
/// for development and tests; use [`super::PostgresStore`] for real load.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let state = MemoryState {
            organizations: seed
                .organizations
                .into_iter()
                .map(|o| (o.id, o))
                .collect(),
            campaigns: seed.campaigns.into_iter().map(|c| (c.id, c)).collect(),
            aid_types: seed.aid_types.into_iter().map(|a| (a.id, a)).collect(),
            families: seed
                .families
                .into_iter()
                .map(|f| (f.slum_code.clone(), f))
                .collect(),
            family_members: seed.family_members,
            campaign_targets: seed.campaign_targets,
            notifications: seed.notifications,
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl DistributionStore for InMemoryStore {
    fn backend_label(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> DistributionResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }

    async fn find_campaign(&self, id: CampaignId) -> DistributionResult<Option<Campaign>> {
        let state = self.state.lock().await;
        Ok(state.campaigns.get(&id).cloned())
    }

    async fn find_family(&self, slum_code: &str) -> DistributionResult<Option<BeneficiaryFamily>> {
        let state = self.state.lock().await;
        Ok(state.families.get(slum_code).cloned())
    }

    async fn list_family_members(&self, slum_code: &str) -> DistributionResult<Vec<FamilyMember>> {
        let state = self.state.lock().await;
        Ok(state
            .family_members
            .iter()
            .filter(|m| m.slum_code == slum_code)
            .cloned()
            .collect())
    }

    async fn family_history(
        &self,
        slum_code: &str,
        limit: usize,
    ) -> DistributionResult<Vec<FamilyHistoryRow>> {
        let state = self.state.lock().await;
        let mut entries: Vec<&DistributionEntry> = state
            .entries
            .iter()
            .filter(|e| e.family_code == slum_code)
            .collect();
        entries.sort_by(|a, b| (b.distributed_at, b.id).cmp(&(a.distributed_at, a.id)));

        Ok(entries
            .into_iter()
            .take(limit)
            .map(|e| {
                let aid_type = state.aid_type_of(e);
                FamilyHistoryRow {
                    entry_id: e.id,
                    session_id: e.session_id,
                    campaign_id: e.campaign_id,
                    campaign_title: state
                        .campaigns
                        .get(&e.campaign_id)
                        .map(|c| c.title.clone())
                        .unwrap_or_default(),
                    org_id: e.org_id,
                    org_name: state.org_name(e.org_id),
                    aid_type_name: aid_type.map(|a| a.name.clone()).unwrap_or_default(),
                    unit_label: aid_type.and_then(|a| a.unit_label.clone()),
                    quantity: e.quantity,
                    comment: e.comment.clone(),
                    verification_method: e.verification_method,
                    round_no: e.round_no,
                    distributed_at: e.distributed_at,
                }
            })
            .collect())
    }

    async fn campaign_day_totals(&self, campaign_id: CampaignId) -> DistributionResult<Vec<DayTotal>> {
        let state = self.state.lock().await;
        Ok(day_totals(
            state
                .entries
                .iter()
                .filter(|e| e.campaign_id == campaign_id)
                .map(|e| FamilyDay {
                    date: e.distributed_at.date_naive(),
                    family_code: e.family_code.clone(),
                    family_members: state.family_members_of(&e.family_code),
                }),
        ))
    }

    async fn campaign_distributions(
        &self,
        campaign_id: CampaignId,
    ) -> DistributionResult<Vec<DistributionDetail>> {
        let state = self.state.lock().await;
        let mut entries: Vec<&DistributionEntry> = state
            .entries
            .iter()
            .filter(|e| e.campaign_id == campaign_id)
            .collect();
        entries.sort_by_key(|e| (e.distributed_at, e.id));

        Ok(entries
            .into_iter()
            .map(|e| DistributionDetail {
                entry_id: e.id,
                family_code: e.family_code.clone(),
                family_head: state.families.get(&e.family_code).map(|f| f.head_name.clone()),
                aid_type_name: state
                    .aid_type_of(e)
                    .map(|a| a.name.clone())
                    .unwrap_or_default(),
                quantity: e.quantity,
                org_name: state.org_name(e.org_id),
                round_no: e.round_no,
                distributed_at: e.distributed_at,
            })
            .collect())
    }

    async fn campaign_impact(&self, campaign_id: CampaignId) -> DistributionResult<CampaignImpact> {
        let state = self.state.lock().await;
        Ok(impact_totals(
            state
                .entries
                .iter()
                .filter(|e| e.campaign_id == campaign_id)
                .map(|e| (e.family_code.clone(), state.family_members_of(&e.family_code))),
        ))
    }

    async fn find_session(&self, id: SessionId) -> DistributionResult<Option<DistributionSession>> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn list_session_entries(
        &self,
        session_id: SessionId,
    ) -> DistributionResult<Vec<DistributionEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_organization(&mut self, id: OrgId) -> DistributionResult<Option<Organization>> {
        Ok(self.staged.organizations.get(&id).cloned())
    }

    async fn find_campaign(&mut self, id: CampaignId) -> DistributionResult<Option<Campaign>> {
        Ok(self.staged.campaigns.get(&id).cloned())
    }

    async fn find_aid_type(&mut self, id: AidTypeId) -> DistributionResult<Option<AidType>> {
        Ok(self.staged.aid_types.get(&id).cloned())
    }

    async fn find_family(
        &mut self,
        slum_code: &str,
    ) -> DistributionResult<Option<BeneficiaryFamily>> {
        Ok(self.staged.families.get(slum_code).cloned())
    }

    async fn find_campaign_target(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<CampaignTarget>> {
        Ok(self
            .staged
            .campaign_targets
            .iter()
            .find(|t| t.campaign_id == campaign_id && t.slum_code == slum_code)
            .cloned())
    }

    async fn find_eligibility_notification(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<Notification>> {
        Ok(self
            .staged
            .notifications
            .iter()
            .find(|n| {
                n.campaign_id == Some(campaign_id)
                    && n.slum_code.as_deref() == Some(slum_code)
                    && n.implies_eligibility()
            })
            .cloned())
    }

    async fn find_session(
        &mut self,
        id: SessionId,
    ) -> DistributionResult<Option<DistributionSession>> {
        Ok(self.staged.sessions.get(&id).cloned())
    }

    async fn find_open_session(
        &mut self,
        campaign_id: CampaignId,
        org_id: OrgId,
        aid_type_id: AidTypeId,
    ) -> DistributionResult<Option<DistributionSession>> {
        Ok(self
            .staged
            .sessions
            .values()
            .find(|s| {
                s.status == SessionStatus::Open
                    && s.campaign_id == campaign_id
                    && s.org_id == org_id
                    && s.aid_type_id == aid_type_id
            })
            .cloned())
    }

    async fn insert_session(
        &mut self,
        session: NewSession,
    ) -> DistributionResult<DistributionSession> {
        self.staged.last_session_id += 1;
        let row = DistributionSession {
            id: self.staged.last_session_id,
            campaign_id: session.campaign_id,
            org_id: session.org_id,
            aid_type_id: session.aid_type_id,
            performed_by: session.performed_by,
            status: SessionStatus::Open,
            started_at: Utc::now(),
            finished_at: None,
        };
        self.staged.sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn close_session(
        &mut self,
        id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> DistributionResult<bool> {
        let session = self
            .staged
            .sessions
            .get_mut(&id)
            .ok_or_else(|| DistributionError::storage(format!("session {id} vanished")))?;
        if session.status != SessionStatus::Open {
            return Ok(false);
        }
        session.status = SessionStatus::Closed;
        session.finished_at = Some(finished_at);
        Ok(true)
    }

    async fn insert_entry(&mut self, entry: NewEntry) -> DistributionResult<RecordedEntry> {
        let round_no = self
            .staged
            .entries
            .iter()
            .filter(|e| e.campaign_id == entry.campaign_id && e.family_code == entry.family_code)
            .map(|e| e.round_no)
            .max()
            .unwrap_or(0)
            + 1;

        self.staged.last_entry_id += 1;
        let row = DistributionEntry {
            id: self.staged.last_entry_id,
            session_id: entry.session_id,
            campaign_id: entry.campaign_id,
            org_id: entry.org_id,
            family_code: entry.family_code,
            quantity: entry.quantity,
            comment: entry.comment,
            verification_method: entry.verification_method,
            round_no,
            distributed_at: Utc::now(),
        };
        let recorded = RecordedEntry {
            entry_id: row.id,
            round_no: row.round_no,
            distributed_at: row.distributed_at,
        };
        self.staged.entries.push(row);
        Ok(recorded)
    }

    async fn commit(self: Box<Self>) -> DistributionResult<()> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DistributionResult<()> {
        Ok(())
    }
}
