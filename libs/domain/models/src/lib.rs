// [libs/domain/models/src/lib.rs]

pub mod allocation;
pub mod config;
pub mod context;
pub mod credits;
pub mod entity;
pub mod events;
pub mod purchase;
pub mod reliability;

pub use allocation::{SeasonalAllocation, SeasonalCreditKind};
pub use config::{AllowancePeriod, ConfigSource, OperationConfigRecord, ResolvedConfig, VolumeTier};
pub use context::TenantContext;
pub use credits::{
    round_credits, CreditBalance, CreditTransaction, LedgerReceipt, LedgerRefusal, TransactionKind,
};
pub use entity::{
    select_primary_root, BusinessEntity, EntityKind, PrimaryRootCandidate, Tenant, TenantStatus,
};
pub use events::{
    AcknowledgmentRecord, AcknowledgmentStatus, ContractDrift, CreditAllocatedData,
    CreditConsumedData, CreditExpiredData, DomainEvent, InterAppEnvelope, PurchaseCompletedData,
};
pub use purchase::{CreditPurchase, PurchaseStatus};
pub use reliability::{FailureClass, ReliabilityProfile, RELIABILITY_PROFILE};
