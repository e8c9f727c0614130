// [apps/orchestrator/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICE ORCHESTRATION HUB (V5.0 - CREDIT CORE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE DAEMONS Y FACHADA
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. MODULARIDAD: Cada servicio opera como una unidad atómica.
 * 2. TYPE SAFETY: Garantiza la visibilidad de los tipos en apps/.
 * =================================================================
 */

pub mod ack_listener;
pub mod checkout;
pub mod config_service;
pub mod credit_service;
pub mod expiry_scheduler;
pub mod retry_scanner;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use ack_listener::AcknowledgmentListener;
pub use checkout::{CheckoutGateway, CheckoutSession};
pub use config_service::{TariffAdministrationService, TariffOutcome};
pub use credit_service::{
    AllocateRequest, ConsumeRequest, CreditService, PurchaseInitiation, PurchaseRequest,
    ServiceError, TransferRequest, VerbOutcome,
};
pub use expiry_scheduler::{ExpirySweepScheduler, SweepReport};
pub use retry_scanner::{AckRetryScanner, ScanReport};
