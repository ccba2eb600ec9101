use crate::error::DistributionError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type OrgId = i64;
pub type CampaignId = i64;
pub type AidTypeId = i64;
pub type SessionId = i64;
pub type EntryId = i64;

/// Notification kinds that imply campaign eligibility for campaigns created
/// before explicit targeting existed.
pub const ELIGIBILITY_NOTIFICATION_KINDS: [&str; 2] = ["campaign_created", "campaign_updated"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationStatus {
    Pending,
    Accepted,
    Rejected,
    Suspended,
}

impl OrganizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "suspended" => Ok(Self::Suspended),
            other => Err(DistributionError::storage(format!(
                "unknown organization status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub status: OrganizationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DistributionError::storage(format!(
                "unknown campaign status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub org_id: OrgId,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CampaignStatus,
}

impl Campaign {
    /// Not cancelled and `day` falls inside the inclusive date window.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.status != CampaignStatus::Cancelled && self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AidType {
    pub id: AidTypeId,
    pub name: String,
    pub requires_quantity: bool,
    #[serde(default)]
    pub unit_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FamilyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DistributionError::storage(format!(
                "unknown family status '{other}'"
            ))),
        }
    }
}

/// A registered household, addressed by its public slum code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeneficiaryFamily {
    pub slum_code: String,
    pub head_name: String,
    pub status: FamilyStatus,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    /// Declared household size, used for people counts in reporting.
    pub family_members: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRelation {
    Spouse,
    Child,
}

impl MemberRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spouse => "spouse",
            Self::Child => "child",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "spouse" => Ok(Self::Spouse),
            "child" => Ok(Self::Child),
            other => Err(DistributionError::storage(format!(
                "unknown member relation '{other}'"
            ))),
        }
    }
}

/// A spouse or child attached to a family head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub slum_code: String,
    pub relation: MemberRelation,
    pub name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTarget {
    pub campaign_id: CampaignId,
    pub slum_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    #[serde(default)]
    pub slum_code: Option<String>,
    #[serde(alias = "type")]
    pub kind: String,
}

impl Notification {
    pub fn implies_eligibility(&self) -> bool {
        ELIGIBILITY_NOTIFICATION_KINDS.contains(&self.kind.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            other => Err(DistributionError::storage(format!(
                "unknown session status '{other}'"
            ))),
        }
    }
}

/// One continuous work unit binding a (campaign, org, aid type) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSession {
    pub id: SessionId,
    pub campaign_id: CampaignId,
    pub org_id: OrgId,
    pub aid_type_id: AidTypeId,
    pub performed_by: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationMethod {
    Code,
    Qr,
}

impl VerificationMethod {
    /// Exactly `QR` selects QR; anything else, including absence, is CODE.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some("QR") => Self::Qr,
            _ => Self::Code,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::Qr => "QR",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DistributionError> {
        match value {
            "CODE" => Ok(Self::Code),
            "QR" => Ok(Self::Qr),
            other => Err(DistributionError::storage(format!(
                "unknown verification method '{other}'"
            ))),
        }
    }
}

/// One record of aid given to one family within a session. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub id: EntryId,
    pub session_id: SessionId,
    pub campaign_id: CampaignId,
    pub org_id: OrgId,
    pub family_code: String,
    pub quantity: Option<f64>,
    pub comment: Option<String>,
    pub verification_method: VerificationMethod,
    pub round_no: i32,
    pub distributed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub campaign_id: CampaignId,
    pub org_id: OrgId,
    pub aid_type_id: AidTypeId,
    pub performed_by: Option<String>,
}

/// Entry row as handed to the store; id, round and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub session_id: SessionId,
    pub campaign_id: CampaignId,
    pub org_id: OrgId,
    pub family_code: String,
    pub quantity: Option<f64>,
    pub comment: Option<String>,
    pub verification_method: VerificationMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEntry {
    pub entry_id: EntryId,
    pub round_no: i32,
    pub distributed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(status: CampaignStatus) -> Campaign {
        Campaign {
            id: 1,
            org_id: 1,
            title: "Monsoon relief".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            status,
        }
    }

    #[test]
    fn campaign_window_is_inclusive() {
        let c = campaign(CampaignStatus::Active);
        assert!(c.is_active_on(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
        assert!(c.is_active_on(NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()));
        assert!(!c.is_active_on(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()));
        assert!(!c.is_active_on(NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()));
    }

    #[test]
    fn cancelled_campaign_is_never_active() {
        let c = campaign(CampaignStatus::Cancelled);
        assert!(!c.is_active_on(NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()));
    }

    #[test]
    fn verification_method_defaults_to_code() {
        assert_eq!(VerificationMethod::normalize(Some("QR")), VerificationMethod::Qr);
        assert_eq!(VerificationMethod::normalize(Some("CODE")), VerificationMethod::Code);
        assert_eq!(VerificationMethod::normalize(Some("qr")), VerificationMethod::Code);
        assert_eq!(VerificationMethod::normalize(Some("NFC")), VerificationMethod::Code);
        assert_eq!(VerificationMethod::normalize(None), VerificationMethod::Code);
    }

    #[test]
    fn only_campaign_notifications_imply_eligibility() {
        let mut n = Notification {
            id: 1,
            campaign_id: Some(1),
            slum_code: Some("SL-0001".to_string()),
            kind: "campaign_updated".to_string(),
        };
        assert!(n.implies_eligibility());
        n.kind = "complaint_resolved".to_string();
        assert!(!n.implies_eligibility());
    }

    #[test]
    fn session_status_uses_uppercase_wire_names() {
        assert_eq!(
            serde_json::to_value(SessionStatus::Closed).unwrap(),
            serde_json::json!("CLOSED")
        );
        assert_eq!(SessionStatus::parse("OPEN").unwrap(), SessionStatus::Open);
        assert!(SessionStatus::parse("open").is_err());
    }
}
