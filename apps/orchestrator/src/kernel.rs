// [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: CREDIT CORE KERNEL (V5.0 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan el almacén del Ledger,
 * el tejido de eventos y los daemons autónomos (expiración,
 * reintentos, acuses). Ningún servicio sostiene estado global: todo
 * viaja como dependencia explícita desde este aparato.
 * =================================================================
 */

use crate::services::{
    AckRetryScanner, AcknowledgmentListener, CheckoutGateway, ExpirySweepScheduler,
};
use crate::state::AppState;
use meridian_infra_fabric::{InterAppPublisher, MessageFabric};
use meridian_infra_store::CreditStoreClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Parámetros de ignición capturados del entorno por main.rs.
#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub database_connection_url: String,
    pub database_access_token: Option<String>,
    /// Código de aplicación del servicio (SERVICE_NAME).
    pub service_name: String,
    pub frontend_base_url: String,
    pub checkout_gateway_endpoint: Option<String>,
    /// Intervalo del barrido de expiración (60 s nominales).
    pub expiry_tick: Duration,
    /// Intervalo del escáner de reintentos (60 s nominales).
    pub retry_scan_tick: Duration,
    /// Minutos sin acuse antes de re-emitir (5 nominales).
    pub retry_pending_grace_minutes: i64,
    /// Silos notificados tras una compra acreditada.
    pub purchase_event_targets: Vec<String>,
}

pub struct CreditCoreKernel {
    pub application_state: AppState,
    settings: KernelSettings,
    shutdown_sender: watch::Sender<bool>,
}

impl CreditCoreKernel {
    /**
     * Realiza la ignición del almacén, el tejido y el estado maestro.
     * Establece el enlace de persistencia antes de levantar servicios.
     */
    #[instrument(skip(settings), fields(service = %settings.service_name))]
    pub async fn ignite(settings: KernelSettings) -> anyhow::Result<Self> {
        let store_client = CreditStoreClient::connect(
            &settings.database_connection_url,
            settings.database_access_token.clone(),
        )
        .await?;

        let fabric = MessageFabric::ignite();
        let publisher = InterAppPublisher::ignite(&settings.service_name, fabric.clone())?;
        let checkout_gateway = Arc::new(CheckoutGateway::new(
            settings.checkout_gateway_endpoint.clone(),
            settings.frontend_base_url.clone(),
        ));

        let application_state = AppState::new(
            store_client,
            fabric,
            publisher,
            checkout_gateway,
            settings.service_name.clone(),
            settings.purchase_event_targets.clone(),
        );

        let (shutdown_sender, _) = watch::channel(false);

        Ok(Self { application_state, settings, shutdown_sender })
    }

    /// Receptor de la señal de cierre para servicios adicionales.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_sender.subscribe()
    }

    /// Ordena el cierre cooperativo de todos los daemons.
    pub fn initiate_shutdown(&self) {
        info!("🛑 [KERNEL]: Shutdown sequence initiated.");
        let _ = self.shutdown_sender.send(true);
    }

    /**
     * Lanza los daemons autónomos del núcleo de créditos.
     * Configura el oyente de acuses, el barrido de expiración y el
     * escáner de reintentos sobre el reactor de Tokio.
     */
    pub async fn launch_autonomous_services(&self) -> anyhow::Result<()> {
        let shared_state = self.application_state.clone();

        // --- 1. OYENTE DE ACUSES (SETTLEMENT LOOP) ---
        let acknowledgment_listener =
            AcknowledgmentListener::new(shared_state.clone(), self.shutdown_signal());
        acknowledgment_listener.spawn().await?;

        // --- 2. BARRIDO DE EXPIRACIÓN DE CUBETAS ---
        let expiry_scheduler = ExpirySweepScheduler::new(
            shared_state.clone(),
            self.settings.expiry_tick,
            self.shutdown_signal(),
        );
        expiry_scheduler.spawn();

        // --- 3. ESCÁNER DE REINTENTOS (AT-LEAST-ONCE RELAY) ---
        let retry_scanner = AckRetryScanner::new(
            shared_state,
            self.settings.retry_scan_tick,
            self.settings.retry_pending_grace_minutes,
            self.shutdown_signal(),
        );
        retry_scanner.spawn();

        info!(
            "🚀 [KERNEL_ONLINE]: Credit core autonomous services launched for [{}].",
            self.settings.service_name
        );
        Ok(())
    }
}
