use super::{DistributionStore, StoreTransaction};
use crate::error::{DistributionError, DistributionResult};
use crate::history::{CampaignImpact, DayTotal, DistributionDetail, FamilyHistoryRow};
use crate::types::{
    AidType, AidTypeId, BeneficiaryFamily, Campaign, CampaignId, CampaignStatus, CampaignTarget,
    DistributionEntry, DistributionSession, FamilyMember, FamilyStatus, MemberRelation, NewEntry,
    NewSession, Notification, OrgId, Organization, OrganizationStatus, RecordedEntry, SessionId,
    SessionStatus, VerificationMethod, ELIGIBILITY_NOTIFICATION_KINDS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;

/// Schema contract. Reference tables belong to the wider application and are
/// only created here when missing; this crate writes the session and entry
/// tables only.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaigns (
        id BIGSERIAL PRIMARY KEY,
        org_id BIGINT NOT NULL REFERENCES organizations (id),
        title TEXT NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        status TEXT NOT NULL DEFAULT 'upcoming'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS aid_types (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        requires_quantity BOOLEAN NOT NULL DEFAULT FALSE,
        unit_label TEXT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS slum_dwellers (
        slum_code TEXT PRIMARY KEY,
        head_name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        dob DATE NULL,
        family_members INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS family_members (
        id BIGSERIAL PRIMARY KEY,
        slum_code TEXT NOT NULL REFERENCES slum_dwellers (slum_code),
        relation TEXT NOT NULL CHECK (relation IN ('spouse', 'child')),
        name TEXT NOT NULL,
        dob DATE NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaign_targets (
        campaign_id BIGINT NOT NULL REFERENCES campaigns (id),
        slum_code TEXT NOT NULL REFERENCES slum_dwellers (slum_code),
        PRIMARY KEY (campaign_id, slum_code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        campaign_id BIGINT NULL,
        slum_code TEXT NULL,
        type TEXT NOT NULL,
        message TEXT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS distribution_sessions (
        id BIGSERIAL PRIMARY KEY,
        campaign_id BIGINT NOT NULL REFERENCES campaigns (id),
        org_id BIGINT NOT NULL REFERENCES organizations (id),
        aid_type_id BIGINT NOT NULL REFERENCES aid_types (id),
        performed_by TEXT NULL,
        status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'CLOSED')),
        started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        finished_at TIMESTAMPTZ NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uq_distribution_sessions_open_triple
        ON distribution_sessions (campaign_id, org_id, aid_type_id)
        WHERE status = 'OPEN'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS distribution_entries (
        id BIGSERIAL PRIMARY KEY,
        session_id BIGINT NOT NULL REFERENCES distribution_sessions (id),
        campaign_id BIGINT NOT NULL REFERENCES campaigns (id),
        org_id BIGINT NOT NULL REFERENCES organizations (id),
        family_code TEXT NOT NULL REFERENCES slum_dwellers (slum_code),
        quantity DOUBLE PRECISION NULL CHECK (quantity IS NULL OR quantity > 0),
        comment TEXT NULL,
        verification_method TEXT NOT NULL DEFAULT 'CODE'
            CHECK (verification_method IN ('CODE', 'QR')),
        round_no INTEGER NOT NULL,
        distributed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uq_distribution_entries_round
        ON distribution_entries (campaign_id, family_code, round_no)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_distribution_entries_family
        ON distribution_entries (family_code, distributed_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_distribution_entries_campaign
        ON distribution_entries (campaign_id, distributed_at)
    "#,
];

const SESSION_COLUMNS: &str =
    "id, campaign_id, org_id, aid_type_id, performed_by, status, started_at, finished_at";

const CAMPAIGN_COLUMNS: &str = "id, org_id, title, start_date, end_date, status";

const FAMILY_COLUMNS: &str = "slum_code, head_name, status, dob, family_members";

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> DistributionError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            DistributionError::conflict(format!("{context}: conflicting concurrent write, retry"))
        }
        _ => DistributionError::storage(format!("postgres {context} failed: {e}")),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &'static str) -> DistributionResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| DistributionError::storage(format!("postgres decode {column} failed: {e}")))
}

fn organization_from_row(row: &PgRow) -> DistributionResult<Organization> {
    Ok(Organization {
        id: get(row, "id")?,
        name: get(row, "name")?,
        status: OrganizationStatus::parse(&get::<String>(row, "status")?)?,
    })
}

fn campaign_from_row(row: &PgRow) -> DistributionResult<Campaign> {
    Ok(Campaign {
        id: get(row, "id")?,
        org_id: get(row, "org_id")?,
        title: get(row, "title")?,
        start_date: get(row, "start_date")?,
        end_date: get(row, "end_date")?,
        status: CampaignStatus::parse(&get::<String>(row, "status")?)?,
    })
}

fn aid_type_from_row(row: &PgRow) -> DistributionResult<AidType> {
    Ok(AidType {
        id: get(row, "id")?,
        name: get(row, "name")?,
        requires_quantity: get(row, "requires_quantity")?,
        unit_label: get(row, "unit_label")?,
    })
}

fn family_from_row(row: &PgRow) -> DistributionResult<BeneficiaryFamily> {
    Ok(BeneficiaryFamily {
        slum_code: get(row, "slum_code")?,
        head_name: get(row, "head_name")?,
        status: FamilyStatus::parse(&get::<String>(row, "status")?)?,
        dob: get(row, "dob")?,
        family_members: get(row, "family_members")?,
    })
}

fn session_from_row(row: &PgRow) -> DistributionResult<DistributionSession> {
    Ok(DistributionSession {
        id: get(row, "id")?,
        campaign_id: get(row, "campaign_id")?,
        org_id: get(row, "org_id")?,
        aid_type_id: get(row, "aid_type_id")?,
        performed_by: get(row, "performed_by")?,
        status: SessionStatus::parse(&get::<String>(row, "status")?)?,
        started_at: get(row, "started_at")?,
        finished_at: get(row, "finished_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> DistributionResult<DistributionEntry> {
    Ok(DistributionEntry {
        id: get(row, "id")?,
        session_id: get(row, "session_id")?,
        campaign_id: get(row, "campaign_id")?,
        org_id: get(row, "org_id")?,
        family_code: get(row, "family_code")?,
        quantity: get(row, "quantity")?,
        comment: get(row, "comment")?,
        verification_method: VerificationMethod::parse(&get::<String>(
            row,
            "verification_method",
        )?)?,
        round_no: get(row, "round_no")?,
        distributed_at: get(row, "distributed_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> DistributionResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(connect_timeout_secs.max(1)))
            .connect(database_url)
            .await
            .map_err(|e| DistributionError::storage(format!("postgres connect failed: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> DistributionResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err("schema create"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DistributionStore for PostgresStore {
    fn backend_label(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> DistributionResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(db_err("begin"))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn find_campaign(&self, id: CampaignId) -> DistributionResult<Option<Campaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("campaign lookup"))?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn find_family(&self, slum_code: &str) -> DistributionResult<Option<BeneficiaryFamily>> {
        let row = sqlx::query(&format!(
            "SELECT {FAMILY_COLUMNS} FROM slum_dwellers WHERE slum_code = $1"
        ))
        .bind(slum_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("family lookup"))?;
        row.as_ref().map(family_from_row).transpose()
    }

    async fn list_family_members(&self, slum_code: &str) -> DistributionResult<Vec<FamilyMember>> {
        let rows = sqlx::query(
            r#"
            SELECT slum_code, relation, name, dob, is_active
            FROM family_members
            WHERE slum_code = $1
            ORDER BY id ASC
            "#,
        )
        .bind(slum_code)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("family members lookup"))?;

        rows.iter()
            .map(|row| {
                Ok(FamilyMember {
                    slum_code: get(row, "slum_code")?,
                    relation: MemberRelation::parse(&get::<String>(row, "relation")?)?,
                    name: get(row, "name")?,
                    dob: get(row, "dob")?,
                    active: get(row, "is_active")?,
                })
            })
            .collect()
    }

    async fn family_history(
        &self,
        slum_code: &str,
        limit: usize,
    ) -> DistributionResult<Vec<FamilyHistoryRow>> {
        let limit: i64 = limit.try_into().unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT
                e.id,
                e.session_id,
                e.campaign_id,
                c.title AS campaign_title,
                e.org_id,
                o.name AS org_name,
                a.name AS aid_type_name,
                a.unit_label,
                e.quantity,
                e.comment,
                e.verification_method,
                e.round_no,
                e.distributed_at
            FROM distribution_entries e
            JOIN distribution_sessions s ON s.id = e.session_id
            JOIN aid_types a ON a.id = s.aid_type_id
            JOIN campaigns c ON c.id = e.campaign_id
            JOIN organizations o ON o.id = e.org_id
            WHERE e.family_code = $1
            ORDER BY e.distributed_at DESC, e.id DESC
            LIMIT $2
            "#,
        )
        .bind(slum_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("family history"))?;

        rows.iter()
            .map(|row| {
                Ok(FamilyHistoryRow {
                    entry_id: get(row, "id")?,
                    session_id: get(row, "session_id")?,
                    campaign_id: get(row, "campaign_id")?,
                    campaign_title: get(row, "campaign_title")?,
                    org_id: get(row, "org_id")?,
                    org_name: get(row, "org_name")?,
                    aid_type_name: get(row, "aid_type_name")?,
                    unit_label: get(row, "unit_label")?,
                    quantity: get(row, "quantity")?,
                    comment: get(row, "comment")?,
                    verification_method: VerificationMethod::parse(&get::<String>(
                        row,
                        "verification_method",
                    )?)?,
                    round_no: get(row, "round_no")?,
                    distributed_at: get(row, "distributed_at")?,
                })
            })
            .collect()
    }

    async fn campaign_day_totals(&self, campaign_id: CampaignId) -> DistributionResult<Vec<DayTotal>> {
        // Inner grouping collapses repeat visits to one row per (day, family).
        let rows = sqlx::query(
            r#"
            SELECT
                per_family.day_bucket AS day,
                COUNT(*)::BIGINT AS families_count,
                COALESCE(SUM(per_family.family_members), 0)::BIGINT AS people_count
            FROM (
                SELECT
                    (e.distributed_at AT TIME ZONE 'UTC')::DATE AS day_bucket,
                    e.family_code,
                    MAX(COALESCE(d.family_members, 0)) AS family_members
                FROM distribution_entries e
                LEFT JOIN slum_dwellers d ON d.slum_code = e.family_code
                WHERE e.campaign_id = $1
                GROUP BY day_bucket, e.family_code
            ) per_family
            GROUP BY per_family.day_bucket
            ORDER BY per_family.day_bucket DESC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("campaign day totals"))?;

        rows.iter()
            .map(|row| {
                Ok(DayTotal {
                    date: get(row, "day")?,
                    families_count: get(row, "families_count")?,
                    people_count: get(row, "people_count")?,
                })
            })
            .collect()
    }

    async fn campaign_distributions(
        &self,
        campaign_id: CampaignId,
    ) -> DistributionResult<Vec<DistributionDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT
                e.id,
                e.family_code,
                d.head_name AS family_head,
                a.name AS aid_type_name,
                e.quantity,
                o.name AS org_name,
                e.round_no,
                e.distributed_at
            FROM distribution_entries e
            JOIN distribution_sessions s ON s.id = e.session_id
            JOIN aid_types a ON a.id = s.aid_type_id
            JOIN organizations o ON o.id = e.org_id
            LEFT JOIN slum_dwellers d ON d.slum_code = e.family_code
            WHERE e.campaign_id = $1
            ORDER BY e.distributed_at ASC, e.id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("campaign distributions"))?;

        rows.iter()
            .map(|row| {
                Ok(DistributionDetail {
                    entry_id: get(row, "id")?,
                    family_code: get(row, "family_code")?,
                    family_head: get(row, "family_head")?,
                    aid_type_name: get(row, "aid_type_name")?,
                    quantity: get(row, "quantity")?,
                    org_name: get(row, "org_name")?,
                    round_no: get(row, "round_no")?,
                    distributed_at: get(row, "distributed_at")?,
                })
            })
            .collect()
    }

    async fn campaign_impact(&self, campaign_id: CampaignId) -> DistributionResult<CampaignImpact> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS families_helped,
                COALESCE(SUM(per_family.family_members), 0)::BIGINT AS people_helped
            FROM (
                SELECT e.family_code, MAX(COALESCE(d.family_members, 0)) AS family_members
                FROM distribution_entries e
                LEFT JOIN slum_dwellers d ON d.slum_code = e.family_code
                WHERE e.campaign_id = $1
                GROUP BY e.family_code
            ) per_family
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("campaign impact"))?;

        Ok(CampaignImpact::new(
            get(&row, "families_helped")?,
            get(&row, "people_helped")?,
        ))
    }

    async fn find_session(&self, id: SessionId) -> DistributionResult<Option<DistributionSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM distribution_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("session lookup"))?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_session_entries(
        &self,
        session_id: SessionId,
    ) -> DistributionResult<Vec<DistributionEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, campaign_id, org_id, family_code, quantity, comment,
                   verification_method, round_no, distributed_at
            FROM distribution_entries
            WHERE session_id = $1
            ORDER BY distributed_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("session entries"))?;

        rows.iter().map(entry_from_row).collect()
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_organization(&mut self, id: OrgId) -> DistributionResult<Option<Organization>> {
        let row = sqlx::query("SELECT id, name, status FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err("organization lookup"))?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn find_campaign(&mut self, id: CampaignId) -> DistributionResult<Option<Campaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("campaign lookup"))?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn find_aid_type(&mut self, id: AidTypeId) -> DistributionResult<Option<AidType>> {
        let row = sqlx::query(
            "SELECT id, name, requires_quantity, unit_label FROM aid_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("aid type lookup"))?;
        row.as_ref().map(aid_type_from_row).transpose()
    }

    async fn find_family(
        &mut self,
        slum_code: &str,
    ) -> DistributionResult<Option<BeneficiaryFamily>> {
        let row = sqlx::query(&format!(
            "SELECT {FAMILY_COLUMNS} FROM slum_dwellers WHERE slum_code = $1"
        ))
        .bind(slum_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("family lookup"))?;
        row.as_ref().map(family_from_row).transpose()
    }

    async fn find_campaign_target(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<CampaignTarget>> {
        let row = sqlx::query(
            "SELECT campaign_id, slum_code FROM campaign_targets WHERE campaign_id = $1 AND slum_code = $2",
        )
        .bind(campaign_id)
        .bind(slum_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("campaign target lookup"))?;

        row.as_ref()
            .map(|row| {
                Ok(CampaignTarget {
                    campaign_id: get(row, "campaign_id")?,
                    slum_code: get(row, "slum_code")?,
                })
            })
            .transpose()
    }

    async fn find_eligibility_notification(
        &mut self,
        campaign_id: CampaignId,
        slum_code: &str,
    ) -> DistributionResult<Option<Notification>> {
        let kinds: Vec<String> = ELIGIBILITY_NOTIFICATION_KINDS
            .iter()
            .map(|k| k.to_string())
            .collect();
        let row = sqlx::query(
            r#"
            SELECT id, campaign_id, slum_code, type
            FROM notifications
            WHERE campaign_id = $1 AND slum_code = $2 AND type = ANY($3)
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .bind(slum_code)
        .bind(kinds)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("notification lookup"))?;

        row.as_ref()
            .map(|row| {
                Ok(Notification {
                    id: get(row, "id")?,
                    campaign_id: get(row, "campaign_id")?,
                    slum_code: get(row, "slum_code")?,
                    kind: get(row, "type")?,
                })
            })
            .transpose()
    }

    async fn find_session(
        &mut self,
        id: SessionId,
    ) -> DistributionResult<Option<DistributionSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM distribution_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("session lookup"))?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn find_open_session(
        &mut self,
        campaign_id: CampaignId,
        org_id: OrgId,
        aid_type_id: AidTypeId,
    ) -> DistributionResult<Option<DistributionSession>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM distribution_sessions
            WHERE campaign_id = $1 AND org_id = $2 AND aid_type_id = $3 AND status = 'OPEN'
            LIMIT 1
            "#
        ))
        .bind(campaign_id)
        .bind(org_id)
        .bind(aid_type_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("open session lookup"))?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn insert_session(
        &mut self,
        session: NewSession,
    ) -> DistributionResult<DistributionSession> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO distribution_sessions (campaign_id, org_id, aid_type_id, performed_by, status)
            VALUES ($1, $2, $3, $4, 'OPEN')
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session.campaign_id)
        .bind(session.org_id)
        .bind(session.aid_type_id)
        .bind(&session.performed_by)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err("session insert"))?;
        session_from_row(&row)
    }

    async fn close_session(
        &mut self,
        id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> DistributionResult<bool> {
        let result = sqlx::query(
            "UPDATE distribution_sessions SET status = 'CLOSED', finished_at = $2 WHERE id = $1 AND status = 'OPEN'",
        )
        .bind(id)
        .bind(finished_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("session close"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_entry(&mut self, entry: NewEntry) -> DistributionResult<RecordedEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO distribution_entries (
                session_id,
                campaign_id,
                org_id,
                family_code,
                quantity,
                comment,
                verification_method,
                round_no
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, COALESCE(MAX(round_no), 0) + 1
            FROM distribution_entries
            WHERE campaign_id = $2 AND family_code = $4
            RETURNING id, round_no, distributed_at
            "#,
        )
        .bind(entry.session_id)
        .bind(entry.campaign_id)
        .bind(entry.org_id)
        .bind(&entry.family_code)
        .bind(entry.quantity)
        .bind(&entry.comment)
        .bind(entry.verification_method.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err("entry insert"))?;

        Ok(RecordedEntry {
            entry_id: get(&row, "id")?,
            round_no: get(&row, "round_no")?,
            distributed_at: get(&row, "distributed_at")?,
        })
    }

    async fn commit(self: Box<Self>) -> DistributionResult<()> {
        self.tx.commit().await.map_err(db_err("commit"))
    }

    async fn rollback(self: Box<Self>) -> DistributionResult<()> {
        self.tx.rollback().await.map_err(db_err("rollback"))
    }
}
