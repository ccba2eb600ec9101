//! SlumLink distribution core.
//!
//! Organizations run distribution sessions against a campaign and aid type,
//! recording one entry per visit by an eligible family. Every write is
//! validated inside the same store transaction that performs it. Read-side
//! views aggregate entries per day and per campaign without double-counting
//! a family.

#![deny(unsafe_code)]

pub mod eligibility;
pub mod engine;
pub mod entry;
pub mod error;
pub mod history;
pub mod lookup;
pub mod session;
pub mod store;
pub mod types;
pub mod validate;

pub use eligibility::{ensure_family_eligible, EligibilitySource};
pub use engine::{DistributionEngine, EngineConfig, SessionDetail};
pub use entry::RecordEntry;
pub use error::{DistributionError, DistributionResult};
pub use history::{
    CampaignHistory, CampaignImpact, DayTotal, DistributionDetail, FamilyHistoryRow,
    FamilySnapshot, FamilySummary, HistoryDay,
};
pub use session::{FinishOutcome, OpenSession};
pub use store::{
    DistributionStore, InMemoryStore, PostgresStore, SeedData, StoreConfig, StoreTransaction,
};
pub use types::{
    AidType, BeneficiaryFamily, Campaign, CampaignStatus, CampaignTarget, DistributionEntry,
    DistributionSession, FamilyMember, FamilyStatus, MemberRelation, Notification, Organization,
    OrganizationStatus, RecordedEntry, SessionStatus, VerificationMethod,
};
