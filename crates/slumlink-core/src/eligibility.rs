//! Campaign eligibility for a family.
//!
//! Explicit campaign targets take precedence. A `campaign_created` or
//! `campaign_updated` notification for the pair is still honoured for
//! campaigns that were set up before targeting existed; once every campaign
//! carries target rows the legacy arm can be dropped.

use crate::error::{DistributionError, DistributionResult};
use crate::store::StoreTransaction;
use crate::types::{CampaignId, CampaignTarget, Notification};

/// Why a family may receive aid under a campaign.
#[derive(Debug, Clone)]
pub enum EligibilitySource {
    Explicit(CampaignTarget),
    Legacy(Notification),
}

impl EligibilitySource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "campaign_target",
            Self::Legacy(_) => "legacy_notification",
        }
    }
}

/// 403 unless a target row or a qualifying notification exists.
///
/// Must run on every entry write: targeting can change while a session is open.
pub async fn ensure_family_eligible(
    tx: &mut dyn StoreTransaction,
    campaign_id: CampaignId,
    slum_code: &str,
) -> DistributionResult<EligibilitySource> {
    if let Some(target) = tx.find_campaign_target(campaign_id, slum_code).await? {
        return Ok(EligibilitySource::Explicit(target));
    }

    if let Some(notification) = tx
        .find_eligibility_notification(campaign_id, slum_code)
        .await?
    {
        return Ok(EligibilitySource::Legacy(notification));
    }

    Err(DistributionError::forbidden(
        "Family is not included for this session",
    ))
}
