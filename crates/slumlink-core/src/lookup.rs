//! Read-and-check gates run inside a store transaction before any write.
//!
//! Each gate returns the structured row it checked so call sites decide for
//! themselves which statuses are acceptable.

use crate::error::{DistributionError, DistributionResult};
use crate::store::StoreTransaction;
use crate::types::{
    AidType, AidTypeId, BeneficiaryFamily, Campaign, CampaignId, OrgId, Organization,
    OrganizationStatus,
};
use chrono::NaiveDate;

/// 400 when the organization is unknown, 403 unless it is accepted.
pub async fn ensure_org_accepted(
    tx: &mut dyn StoreTransaction,
    org_id: OrgId,
) -> DistributionResult<Organization> {
    let org = tx
        .find_organization(org_id)
        .await?
        .ok_or_else(|| DistributionError::validation("Organization not found"))?;

    if org.status != OrganizationStatus::Accepted {
        return Err(DistributionError::forbidden(format!(
            "Organization is {} and cannot distribute aid",
            org.status.as_str()
        )));
    }
    Ok(org)
}

/// 403 unless the campaign exists, belongs to `org_id`, is not cancelled and
/// `today` is inside its window. Ownership and activity share one outcome so a
/// foreign campaign looks the same as an inactive one.
pub async fn ensure_campaign_active_for_org(
    tx: &mut dyn StoreTransaction,
    campaign_id: CampaignId,
    org_id: OrgId,
    today: NaiveDate,
) -> DistributionResult<Campaign> {
    match tx.find_campaign(campaign_id).await? {
        Some(campaign) if campaign.org_id == org_id && campaign.is_active_on(today) => Ok(campaign),
        _ => Err(DistributionError::forbidden(
            "Campaign is not active for your organization today",
        )),
    }
}

/// 400 when the aid type is unknown.
pub async fn ensure_aid_type_exists(
    tx: &mut dyn StoreTransaction,
    aid_type_id: AidTypeId,
) -> DistributionResult<AidType> {
    tx.find_aid_type(aid_type_id)
        .await?
        .ok_or_else(|| DistributionError::validation("Aid type not found"))
}

/// 404 when no family carries `slum_code`. Status is not checked here.
pub async fn ensure_dweller_exists(
    tx: &mut dyn StoreTransaction,
    slum_code: &str,
) -> DistributionResult<BeneficiaryFamily> {
    tx.find_family(slum_code)
        .await?
        .ok_or_else(|| DistributionError::not_found("Family not found"))
}
