// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V5.0 - CREDIT CORE)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * # Mathematical Proof (Modular Encapsulation):
 * Al declarar 'pub mod' aquí, Rust genera un grafo de visibilidad
 * donde 'state' y 'services' son hermanos bajo el mismo tronco
 * 'crate', habilitando la inyección de dependencias en compilación
 * tanto para el binario como para el Proving Grounds.
 * =================================================================
 */

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Contenedor de estado compartido del núcleo de créditos.
pub mod state;

// --- ESTRATO DE MANDO ---
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;

// --- ESTRATO DE SERVICIOS ---
/// Fachada de verbos y daemons de fondo del Ledger.
pub mod services;

/**
 * PRELUDIO DEL ORQUESTADOR
 *
 * Re-exportación estratégica de los componentes necesarios para la
 * ignición mínima del sistema. Reduce el acoplamiento en 'main.rs'.
 */
pub mod prelude {
    pub use crate::kernel::{CreditCoreKernel, KernelSettings};
    pub use crate::services::{
        AckRetryScanner, AcknowledgmentListener, AllocateRequest, CheckoutGateway,
        ConsumeRequest, CreditService, ExpirySweepScheduler, PurchaseInitiation,
        PurchaseRequest, ServiceError, TariffAdministrationService, TariffOutcome,
        TransferRequest, VerbOutcome,
    };
    pub use crate::state::AppState;
}
