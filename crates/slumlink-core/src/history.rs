//! Read-side views over recorded distributions: family snapshots, day-bucketed
//! campaign history, and campaign impact totals.
//!
//! Family-member counts are attributed once per (day, family) pair for day
//! totals and once per family for impact, never once per entry.

use crate::error::{DistributionError, DistributionResult};
use crate::store::DistributionStore;
use crate::types::{
    BeneficiaryFamily, CampaignId, CampaignStatus, EntryId, FamilyMember, MemberRelation,
    OrgId, SessionId, VerificationMethod,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One entry of a family's aid history, joined to its reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyHistoryRow {
    pub entry_id: EntryId,
    pub session_id: SessionId,
    pub campaign_id: CampaignId,
    pub campaign_title: String,
    pub org_id: OrgId,
    pub org_name: String,
    pub aid_type_name: String,
    pub unit_label: Option<String>,
    pub quantity: Option<f64>,
    pub comment: Option<String>,
    pub verification_method: VerificationMethod,
    pub round_no: i32,
    pub distributed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySummary {
    pub slum_code: String,
    pub size: u32,
    pub ages: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub family: FamilySummary,
    #[serde(rename = "allHistory")]
    pub all_history: Vec<FamilyHistoryRow>,
}

/// Detail row of a campaign's history. Not deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionDetail {
    pub entry_id: EntryId,
    pub family_code: String,
    pub family_head: Option<String>,
    pub aid_type_name: String,
    pub quantity: Option<f64>,
    pub org_name: String,
    pub round_no: i32,
    pub distributed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub families_count: i64,
    pub people_count: i64,
}

/// A family that received aid on a given day, with its household size.
#[derive(Debug, Clone)]
pub struct FamilyDay {
    pub date: NaiveDate,
    pub family_code: String,
    pub family_members: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub families_count: i64,
    pub people_count: i64,
    pub distributions: Vec<DistributionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignHistory {
    pub campaign_id: CampaignId,
    pub campaign_title: String,
    pub campaign_status: CampaignStatus,
    pub history: Vec<HistoryDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignImpact {
    pub families_helped: i64,
    pub people_helped: i64,
    /// Same value as `people_helped`, kept for older dashboards.
    pub beneficiaries: i64,
}

impl CampaignImpact {
    pub fn new(families_helped: i64, people_helped: i64) -> Self {
        Self {
            families_helped,
            people_helped,
            beneficiaries: people_helped,
        }
    }
}

/// Whole years between `dob` and `today`, calendar-accurate.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Head plus active spouses and children; one age per member with a known dob.
pub fn summarize_family(
    family: &BeneficiaryFamily,
    members: &[FamilyMember],
    today: NaiveDate,
) -> FamilySummary {
    let active: Vec<&FamilyMember> = members
        .iter()
        .filter(|m| {
            m.active
                && m.slum_code == family.slum_code
                && matches!(m.relation, MemberRelation::Spouse | MemberRelation::Child)
        })
        .collect();

    let ages = family
        .dob
        .into_iter()
        .chain(active.iter().filter_map(|m| m.dob))
        .map(|dob| age_on(dob, today))
        .collect();

    FamilySummary {
        slum_code: family.slum_code.clone(),
        size: 1 + active.len() as u32,
        ages,
    }
}

/// Collapse to distinct families per day before summing, most recent day first.
pub fn day_totals<I>(rows: I) -> Vec<DayTotal>
where
    I: IntoIterator<Item = FamilyDay>,
{
    let mut per_day: BTreeMap<NaiveDate, HashMap<String, i64>> = BTreeMap::new();
    for row in rows {
        per_day
            .entry(row.date)
            .or_default()
            .entry(row.family_code)
            .or_insert(row.family_members);
    }

    per_day
        .into_iter()
        .rev()
        .map(|(date, families)| DayTotal {
            date,
            families_count: families.len() as i64,
            people_count: families.values().sum(),
        })
        .collect()
}

/// Distinct families over the whole campaign, each contributing its size once.
pub fn impact_totals<I>(rows: I) -> CampaignImpact
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut families: HashMap<String, i64> = HashMap::new();
    for (family_code, members) in rows {
        families.entry(family_code).or_insert(members);
    }
    CampaignImpact::new(families.len() as i64, families.values().sum())
}

/// Attach detail rows to their day totals. Days that only appear in the detail
/// rows get zero totals.
pub fn merge_history(totals: Vec<DayTotal>, details: Vec<DistributionDetail>) -> Vec<HistoryDay> {
    let mut days: BTreeMap<NaiveDate, HistoryDay> = totals
        .into_iter()
        .map(|t| {
            (
                t.date,
                HistoryDay {
                    date: t.date,
                    families_count: t.families_count,
                    people_count: t.people_count,
                    distributions: Vec::new(),
                },
            )
        })
        .collect();

    for detail in details {
        let date = detail.distributed_at.date_naive();
        days.entry(date)
            .or_insert_with(|| HistoryDay {
                date,
                families_count: 0,
                people_count: 0,
                distributions: Vec::new(),
            })
            .distributions
            .push(detail);
    }

    days.into_values().rev().collect()
}

pub async fn family_snapshot(
    store: &dyn DistributionStore,
    slum_code: &str,
    history_limit: usize,
    today: NaiveDate,
) -> DistributionResult<FamilySnapshot> {
    let family = store
        .find_family(slum_code)
        .await?
        .ok_or_else(|| DistributionError::not_found("Family not found"))?;
    let members = store.list_family_members(slum_code).await?;
    let all_history = store.family_history(slum_code, history_limit).await?;

    Ok(FamilySnapshot {
        family: summarize_family(&family, &members, today),
        all_history,
    })
}

pub async fn campaign_history(
    store: &dyn DistributionStore,
    campaign_id: CampaignId,
) -> DistributionResult<CampaignHistory> {
    let campaign = store
        .find_campaign(campaign_id)
        .await?
        .ok_or_else(|| DistributionError::not_found("Campaign not found"))?;
    let totals = store.campaign_day_totals(campaign_id).await?;
    let details = store.campaign_distributions(campaign_id).await?;

    Ok(CampaignHistory {
        campaign_id: campaign.id,
        campaign_title: campaign.title,
        campaign_status: campaign.status,
        history: merge_history(totals, details),
    })
}

pub async fn campaign_impact(
    store: &dyn DistributionStore,
    campaign_id: CampaignId,
) -> DistributionResult<CampaignImpact> {
    if store.find_campaign(campaign_id).await?.is_none() {
        return Err(DistributionError::not_found("Campaign not found"));
    }
    store.campaign_impact(campaign_id).await
}
