// [apps/orchestrator/src/state.rs]
/*!
 * =================================================================
 * APARATO: CREDIT CORE STATE (V4.0 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, TEJIDO Y PASARELA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NO SINGLETONS: Todo el grafo (cliente, motores, publicador,
 *    pasarela) se construye en la ignición y viaja como dependencia
 *    explícita; ningún módulo sostiene estado mutable global.
 * 2. COMPOSITION ROOT: Centraliza el rastro de los motores del Ledger
 *    y el tejido de eventos para los daemons y la fachada.
 * =================================================================
 */

use crate::services::checkout::CheckoutGateway;
use meridian_infra_fabric::{InterAppPublisher, MessageFabric};
use meridian_infra_store::repositories::{
    AllocationEngine, ConfigRepository, EntityRepository, EventAuditRepository, LedgerEngine,
    PurchaseRepository, RegistryRepository,
};
use meridian_infra_store::CreditStoreClient;
use std::sync::Arc;
use tracing::debug;

/// Contenedor de estado compartido (Thread-Safe) del núcleo.
#[derive(Clone)]
pub struct AppState {
    /// Cliente del almacén del Ledger (Storage Gateway).
    pub store_client: CreditStoreClient,
    /// Núcleo del tejido de eventos inter-aplicación.
    pub fabric: MessageFabric,
    /// Publicador confirmado del núcleo.
    pub publisher: Arc<InterAppPublisher>,
    /// Pasarela opaca de checkout para compras tipo 'stripe'.
    pub checkout_gateway: Arc<CheckoutGateway>,

    // --- ESTRATO L3: MOTORES Y REPOSITORIOS ---
    pub ledger_engine: Arc<LedgerEngine>,
    pub allocation_engine: Arc<AllocationEngine>,
    pub purchase_repository: Arc<PurchaseRepository>,
    pub config_repository: Arc<ConfigRepository>,
    pub registry_repository: Arc<RegistryRepository>,
    pub entity_repository: Arc<EntityRepository>,
    pub event_audit: Arc<EventAuditRepository>,

    /// Código de aplicación del propio servicio (SERVICE_NAME).
    pub service_name: String,
    /// Silos notificados tras una compra acreditada.
    pub purchase_event_targets: Vec<String>,
}

impl AppState {
    /// Forja el Estado Maestro inyectando todas las dependencias.
    pub fn new(
        store_client: CreditStoreClient,
        fabric: MessageFabric,
        publisher: Arc<InterAppPublisher>,
        checkout_gateway: Arc<CheckoutGateway>,
        service_name: String,
        purchase_event_targets: Vec<String>,
    ) -> Self {
        debug!("🧬 [APP_STATE]: Executing credit core ignition sequence...");

        Self {
            ledger_engine: Arc::new(LedgerEngine::new(store_client.clone())),
            allocation_engine: Arc::new(AllocationEngine::new(store_client.clone())),
            purchase_repository: Arc::new(PurchaseRepository::new(store_client.clone())),
            config_repository: Arc::new(ConfigRepository::new(store_client.clone())),
            registry_repository: Arc::new(RegistryRepository::new(store_client.clone())),
            entity_repository: Arc::new(EntityRepository::new(store_client.clone())),
            event_audit: Arc::new(EventAuditRepository::new(store_client.clone())),
            store_client,
            fabric,
            publisher,
            checkout_gateway,
            service_name,
            purchase_event_targets,
        }
    }
}
