//! Recording one distribution event against an open session.

use crate::eligibility::ensure_family_eligible;
use crate::error::{DistributionError, DistributionResult};
use crate::lookup::{ensure_aid_type_exists, ensure_campaign_active_for_org, ensure_dweller_exists};
use crate::store::StoreTransaction;
use crate::types::{
    FamilyStatus, NewEntry, OrgId, RecordedEntry, SessionId, VerificationMethod,
};
use crate::validate::is_valid_quantity;
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub session_id: SessionId,
    pub org_id: OrgId,
    pub family_code: String,
    pub quantity: Option<f64>,
    pub comment: Option<String>,
    pub verification_method: VerificationMethod,
}

/// Validate and insert one entry.
///
/// Campaign activity, aid type and eligibility are re-checked on every call
/// because any of them can change while a session stays open. Repeat entries
/// for the same family in one session are allowed.
pub async fn record_entry(
    tx: &mut dyn StoreTransaction,
    request: RecordEntry,
    today: NaiveDate,
) -> DistributionResult<RecordedEntry> {
    let session = tx
        .find_session(request.session_id)
        .await?
        .ok_or_else(|| DistributionError::not_found("Session not found"))?;
    session.ensure_writable_by(request.org_id)?;

    ensure_campaign_active_for_org(tx, session.campaign_id, session.org_id, today).await?;
    let aid_type = ensure_aid_type_exists(tx, session.aid_type_id).await?;

    if aid_type.requires_quantity && !is_valid_quantity(request.quantity) {
        return Err(DistributionError::validation(format!(
            "Quantity is required for {} and must be greater than 0",
            aid_type.name
        )));
    }

    let family = ensure_dweller_exists(tx, &request.family_code).await?;
    if family.status != FamilyStatus::Accepted {
        return Err(DistributionError::forbidden(format!(
            "Family is {} and cannot receive aid",
            family.status.as_str()
        )));
    }

    let source = ensure_family_eligible(tx, session.campaign_id, &family.slum_code).await?;
    debug!(
        session_id = session.id,
        family_code = %family.slum_code,
        eligibility = source.label(),
        "family eligible"
    );

    tx.insert_entry(NewEntry {
        session_id: session.id,
        campaign_id: session.campaign_id,
        org_id: session.org_id,
        family_code: family.slum_code,
        quantity: request.quantity.filter(|_| aid_type.requires_quantity),
        comment: request.comment,
        verification_method: request.verification_method,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{finish_session, open_session, OpenSession};
    use crate::store::{DistributionStore, InMemoryStore, SeedData};
    use crate::types::{
        AidType, AidTypeId, BeneficiaryFamily, Campaign, CampaignStatus, CampaignTarget,
        NewSession, Notification, Organization, OrganizationStatus,
    };
    use chrono::Utc;

    const FOOD: AidTypeId = 1;
    const CLOTHING: AidTypeId = 2;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn family(code: &str, status: FamilyStatus) -> BeneficiaryFamily {
        BeneficiaryFamily {
            slum_code: code.to_string(),
            head_name: format!("head of {code}"),
            status,
            dob: None,
            family_members: 4,
        }
    }

    fn store() -> InMemoryStore {
        let today = today();
        InMemoryStore::from_seed(SeedData {
            organizations: vec![
                Organization {
                    id: 1,
                    name: "Helping Hands".to_string(),
                    status: OrganizationStatus::Accepted,
                },
                Organization {
                    id: 2,
                    name: "City Ward 7".to_string(),
                    status: OrganizationStatus::Accepted,
                },
            ],
            campaigns: vec![Campaign {
                id: 10,
                org_id: 1,
                title: "Ration drive".to_string(),
                start_date: today - chrono::Duration::days(7),
                end_date: today + chrono::Duration::days(7),
                status: CampaignStatus::Active,
            }],
            aid_types: vec![
                AidType {
                    id: FOOD,
                    name: "Food".to_string(),
                    requires_quantity: true,
                    unit_label: Some("kg".to_string()),
                },
                AidType {
                    id: CLOTHING,
                    name: "Clothing".to_string(),
                    requires_quantity: false,
                    unit_label: None,
                },
            ],
            families: vec![
                family("SL-0001", FamilyStatus::Accepted),
                family("SL-0002", FamilyStatus::Accepted),
                family("SL-0003", FamilyStatus::Pending),
                family("SL-0004", FamilyStatus::Accepted),
            ],
            campaign_targets: vec![
                CampaignTarget {
                    campaign_id: 10,
                    slum_code: "SL-0001".to_string(),
                },
                CampaignTarget {
                    campaign_id: 10,
                    slum_code: "SL-0003".to_string(),
                },
            ],
            notifications: vec![Notification {
                id: 1,
                campaign_id: Some(10),
                slum_code: Some("SL-0004".to_string()),
                kind: "campaign_created".to_string(),
            }],
            ..SeedData::default()
        })
    }

    async fn open(store: &InMemoryStore, aid_type_id: AidTypeId) -> SessionId {
        let mut tx = store.begin().await.unwrap();
        let session = open_session(
            tx.as_mut(),
            OpenSession {
                org_id: 1,
                campaign_id: 10,
                aid_type_id,
                performed_by: None,
            },
            today(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        session.id
    }

    fn entry(session_id: SessionId, family_code: &str, quantity: Option<f64>) -> RecordEntry {
        RecordEntry {
            session_id,
            org_id: 1,
            family_code: family_code.to_string(),
            quantity,
            comment: None,
            verification_method: VerificationMethod::Code,
        }
    }

    async fn record(store: &InMemoryStore, request: RecordEntry) -> DistributionResult<RecordedEntry> {
        let mut tx = store.begin().await?;
        let recorded = record_entry(tx.as_mut(), request, today()).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    #[tokio::test]
    async fn records_targeted_family_with_quantity() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let recorded = record(&store, entry(session_id, "SL-0001", Some(5.0)))
            .await
            .unwrap();
        assert_eq!(recorded.round_no, 1);

        let entries = store.list_session_entries(session_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, Some(5.0));
        assert_eq!(entries[0].campaign_id, 10);
        assert_eq!(entries[0].org_id, 1);
    }

    #[tokio::test]
    async fn quantity_is_mandatory_for_food() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        for quantity in [None, Some(0.0), Some(-2.0), Some(f64::NAN)] {
            let err = record(&store, entry(session_id, "SL-0001", quantity))
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
        assert!(store.list_session_entries(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quantity_is_dropped_when_not_required() {
        let store = store();
        let session_id = open(&store, CLOTHING).await;

        record(&store, entry(session_id, "SL-0001", Some(3.0)))
            .await
            .unwrap();
        let entries = store.list_session_entries(session_id).await.unwrap();
        assert_eq!(entries[0].quantity, None);
    }

    #[tokio::test]
    async fn untargeted_family_is_rejected() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let err = record(&store, entry(session_id, "SL-0002", Some(1.0)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("not included"));
    }

    #[tokio::test]
    async fn legacy_notification_family_is_accepted() {
        let store = store();
        let session_id = open(&store, FOOD).await;
        assert!(record(&store, entry(session_id, "SL-0004", Some(1.0)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn non_accepted_or_unknown_family_is_rejected() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let pending = record(&store, entry(session_id, "SL-0003", Some(1.0)))
            .await
            .unwrap_err();
        assert_eq!(pending.status_code(), 403);

        let unknown = record(&store, entry(session_id, "SL-9999", Some(1.0)))
            .await
            .unwrap_err();
        assert_eq!(unknown.status_code(), 404);
    }

    #[tokio::test]
    async fn closed_session_rejects_every_entry() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let mut tx = store.begin().await.unwrap();
        finish_session(tx.as_mut(), session_id, 1, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        for request in [
            entry(session_id, "SL-0001", Some(5.0)),
            entry(session_id, "SL-0001", None),
            entry(session_id, "SL-9999", Some(5.0)),
        ] {
            let err = record(&store, request).await.unwrap_err();
            assert_eq!(err.status_code(), 403);
            assert_eq!(err.to_string(), "Session is closed");
        }
    }

    #[tokio::test]
    async fn foreign_org_and_missing_session() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let mut foreign = entry(session_id, "SL-0001", Some(1.0));
        foreign.org_id = 2;
        assert_eq!(record(&store, foreign).await.unwrap_err().status_code(), 403);

        let missing = entry(session_id + 100, "SL-0001", Some(1.0));
        assert_eq!(record(&store, missing).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn repeat_visits_advance_the_round() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let first = record(&store, entry(session_id, "SL-0001", Some(1.0)))
            .await
            .unwrap();
        let mut qr = entry(session_id, "SL-0001", Some(2.0));
        qr.verification_method = VerificationMethod::Qr;
        let second = record(&store, qr).await.unwrap();

        assert_eq!((first.round_no, second.round_no), (1, 2));
        let entries = store.list_session_entries(session_id).await.unwrap();
        assert_eq!(entries[1].verification_method, VerificationMethod::Qr);
    }

    #[tokio::test]
    async fn campaign_lapsing_mid_session_blocks_entries() {
        let store = store();
        let session_id = open(&store, FOOD).await;

        let mut tx = store.begin().await.unwrap();
        let err = record_entry(
            tx.as_mut(),
            entry(session_id, "SL-0001", Some(5.0)),
            today() + chrono::Duration::days(30),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("not active"));
        tx.rollback().await.unwrap();

        let session = store.find_session(session_id).await.unwrap().unwrap();
        assert!(session.is_open());
        assert!(store.list_session_entries(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn aid_type_removed_mid_session_blocks_entries() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let session = tx
            .insert_session(NewSession {
                campaign_id: 10,
                org_id: 1,
                aid_type_id: 999,
                performed_by: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = record(&store, entry(session.id, "SL-0001", Some(5.0)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(store.list_session_entries(session.id).await.unwrap().is_empty());
    }
}
