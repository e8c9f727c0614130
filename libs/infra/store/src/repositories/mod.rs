// [libs/infra/store/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DE LOS MOTORES DE PERSISTENCIA
 * =================================================================
 */

pub mod allocations;
pub mod configs;
pub mod entities;
pub mod event_audit;
pub mod ledger;
pub mod purchases;
pub mod registry;

pub use allocations::{
    AllocationDraft, AllocationDraw, AllocationDrawOutcome, AllocationEngine, AllocationOutcome,
    ExpiryFinalization,
};
pub use configs::{ConfigRepository, ConfigScope};
pub use entities::EntityRepository;
pub use event_audit::{EventAuditRepository, UnsettledEvent, RETRY_CEILING};
pub use ledger::{
    CreditInstruction, DebitInstruction, ExpiryDeduction, LedgerEngine, LedgerOutcome,
    TransferOutcome,
};
pub use purchases::{PurchaseDraft, PurchaseRepository};
pub use registry::RegistryRepository;
