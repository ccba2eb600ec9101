//! Distribution session lifecycle: OPEN on creation, CLOSED exactly once.

use crate::error::{DistributionError, DistributionResult};
use crate::lookup::{ensure_aid_type_exists, ensure_campaign_active_for_org, ensure_org_accepted};
use crate::store::StoreTransaction;
use crate::types::{
    AidTypeId, CampaignId, DistributionSession, NewSession, OrgId, SessionId, SessionStatus,
};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone)]
pub struct OpenSession {
    pub org_id: OrgId,
    pub campaign_id: CampaignId,
    pub aid_type_id: AidTypeId,
    pub performed_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    Closed { finished_at: DateTime<Utc> },
    AlreadyClosed,
}

impl FinishOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "Session closed",
            Self::AlreadyClosed => "Session already closed",
        }
    }
}

impl DistributionSession {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Ownership and state checks shared by every write against a session.
    pub fn ensure_writable_by(&self, org_id: OrgId) -> DistributionResult<()> {
        if self.org_id != org_id {
            return Err(DistributionError::forbidden(
                "Session does not belong to your org",
            ));
        }
        if !self.is_open() {
            return Err(DistributionError::forbidden("Session is closed"));
        }
        Ok(())
    }
}

/// Validate org, campaign and aid type (in that order) and insert an OPEN session.
pub async fn open_session(
    tx: &mut dyn StoreTransaction,
    request: OpenSession,
    today: NaiveDate,
) -> DistributionResult<DistributionSession> {
    ensure_org_accepted(tx, request.org_id).await?;
    ensure_campaign_active_for_org(tx, request.campaign_id, request.org_id, today).await?;
    ensure_aid_type_exists(tx, request.aid_type_id).await?;

    if let Some(existing) = tx
        .find_open_session(request.campaign_id, request.org_id, request.aid_type_id)
        .await?
    {
        return Err(DistributionError::conflict(format!(
            "An open session ({}) already exists for this campaign and aid type",
            existing.id
        )));
    }

    tx.insert_session(NewSession {
        campaign_id: request.campaign_id,
        org_id: request.org_id,
        aid_type_id: request.aid_type_id,
        performed_by: request.performed_by,
    })
    .await
}

/// Close a session owned by `org_id`. Closing a closed session succeeds
/// without touching `finished_at`.
pub async fn finish_session(
    tx: &mut dyn StoreTransaction,
    session_id: SessionId,
    org_id: OrgId,
    now: DateTime<Utc>,
) -> DistributionResult<FinishOutcome> {
    let session = tx
        .find_session(session_id)
        .await?
        .ok_or_else(|| DistributionError::not_found("Session not found"))?;

    if session.org_id != org_id {
        return Err(DistributionError::forbidden(
            "Session does not belong to your org",
        ));
    }
    if !session.is_open() {
        return Ok(FinishOutcome::AlreadyClosed);
    }

    // A concurrent finish may have closed it since the read above.
    if !tx.close_session(session_id, now).await? {
        return Ok(FinishOutcome::AlreadyClosed);
    }
    Ok(FinishOutcome::Closed { finished_at: now })
}
