use crate::entry::{record_entry, RecordEntry};
use crate::error::{DistributionError, DistributionResult};
use crate::history::{self, CampaignHistory, CampaignImpact, FamilySnapshot};
use crate::session::{finish_session, open_session, FinishOutcome, OpenSession};
use crate::store::{DistributionStore, StoreTransaction};
use crate::types::{
    CampaignId, DistributionEntry, DistributionSession, OrgId, RecordedEntry, SessionId,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Entries returned in a family snapshot.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { history_limit: 50 }
    }
}

/// A session with everything recorded under it so far.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    pub session: DistributionSession,
    pub entries: Vec<DistributionEntry>,
}

/// Entry point for distribution operations.
///
/// Each mutating call borrows one transaction for its validation reads and
/// its write, commits on success and rolls back on every failure.
pub struct DistributionEngine {
    store: Arc<dyn DistributionStore>,
    config: EngineConfig,
}

impl DistributionEngine {
    pub fn new(store: Arc<dyn DistributionStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_label()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn open_session(&self, request: OpenSession) -> DistributionResult<SessionId> {
        let mut tx = self.store.begin().await?;
        let result = open_session(tx.as_mut(), request, Self::today()).await;
        let session = settle(tx, result, "open_session").await?;

        info!(
            session_id = session.id,
            org_id = session.org_id,
            campaign_id = session.campaign_id,
            aid_type_id = session.aid_type_id,
            "Opened distribution session"
        );
        Ok(session.id)
    }

    pub async fn record_entry(&self, request: RecordEntry) -> DistributionResult<RecordedEntry> {
        let session_id = request.session_id;
        let mut tx = self.store.begin().await?;
        let result = record_entry(tx.as_mut(), request, Self::today()).await;
        let recorded = settle(tx, result, "record_entry").await?;

        info!(
            session_id,
            entry_id = recorded.entry_id,
            round_no = recorded.round_no,
            "Recorded distribution entry"
        );
        Ok(recorded)
    }

    pub async fn finish_session(
        &self,
        session_id: SessionId,
        org_id: OrgId,
    ) -> DistributionResult<FinishOutcome> {
        let mut tx = self.store.begin().await?;
        let result = finish_session(tx.as_mut(), session_id, org_id, Utc::now()).await;
        let outcome = settle(tx, result, "finish_session").await?;

        info!(session_id, org_id, outcome = outcome.message(), "Finished distribution session");
        Ok(outcome)
    }

    pub async fn session_detail(&self, session_id: SessionId) -> DistributionResult<SessionDetail> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| DistributionError::not_found("Session not found"))?;
        let entries = self.store.list_session_entries(session_id).await?;
        Ok(SessionDetail { session, entries })
    }

    pub async fn family_snapshot(&self, slum_code: &str) -> DistributionResult<FamilySnapshot> {
        history::family_snapshot(
            self.store.as_ref(),
            slum_code,
            self.config.history_limit,
            Self::today(),
        )
        .await
        .map_err(|e| log_read_failure(e, "family_snapshot"))
    }

    pub async fn campaign_history(&self, campaign_id: CampaignId) -> DistributionResult<CampaignHistory> {
        history::campaign_history(self.store.as_ref(), campaign_id)
            .await
            .map_err(|e| log_read_failure(e, "campaign_history"))
    }

    pub async fn campaign_impact(&self, campaign_id: CampaignId) -> DistributionResult<CampaignImpact> {
        history::campaign_impact(self.store.as_ref(), campaign_id)
            .await
            .map_err(|e| log_read_failure(e, "campaign_impact"))
    }
}

/// Commit on success; otherwise roll back before the connection is released.
async fn settle<T>(
    tx: Box<dyn StoreTransaction>,
    result: DistributionResult<T>,
    operation: &'static str,
) -> DistributionResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!(operation, error = %e, "commit failed");
                e
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "rollback failed");
            }
            if err.is_internal() {
                error!(operation, error = %err, "distribution operation failed");
            } else {
                debug!(operation, status = err.status_code(), reason = %err, "request rejected");
            }
            Err(err)
        }
    }
}

fn log_read_failure(err: DistributionError, operation: &'static str) -> DistributionError {
    if err.is_internal() {
        error!(operation, error = %err, "read failed");
    }
    err
}
