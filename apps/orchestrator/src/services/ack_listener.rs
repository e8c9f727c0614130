// [apps/orchestrator/src/services/ack_listener.rs]
/*!
 * =================================================================
 * APARATO: ACKNOWLEDGMENT LISTENER (V3.0 - SETTLEMENT LOOP)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: SELLADO DE ACUSES EN LA AUDITORÍA DE EVENTOS
 *
 * Consume la cola "{service}-acks" enlazada con la clave
 * "acks.{service}" y sella cada fila de auditoría como 'processed' o
 * 'failed' con su clase de fallo.
 * =================================================================
 */

use crate::state::AppState;
use meridian_domain_models::events::{
    AcknowledgmentRecord, AcknowledgmentStatus, InterAppEnvelope,
};
use meridian_domain_models::reliability::FailureClass;
use meridian_infra_fabric::{
    acknowledgment_routing_key, ConsumerRuntime, ConsumerSettings, EventHandler, FabricError,
    HandlerOutcome, INTER_APP_EVENTS_EXCHANGE,
};
use meridian_infra_store::repositories::EventAuditRepository;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Manejador que proyecta cada acuse sobre la auditoría durable.
struct AckSettlementHandler {
    event_audit: Arc<EventAuditRepository>,
}

impl EventHandler for AckSettlementHandler {
    fn handle(&self, event: &InterAppEnvelope) -> impl Future<Output = HandlerOutcome> + Send {
        let event_audit = self.event_audit.clone();
        let acknowledgment_payload = event.event_data.clone();

        async move {
            let record: AcknowledgmentRecord =
                match serde_json::from_value(acknowledgment_payload) {
                    Ok(record) => record,
                    Err(decoding_fault) => {
                        // Payload fuera de contrato: deriva clasificada.
                        return HandlerOutcome::Nack(format!(
                            "contract_drift: {}",
                            decoding_fault
                        ));
                    }
                };

            let failure_class = match record.status {
                AcknowledgmentStatus::Processed => None,
                AcknowledgmentStatus::Failed => Some(
                    record.result["failureClass"]
                        .as_str()
                        .map(FailureClass::from_code)
                        .unwrap_or(FailureClass::ConsumerProcessingFailure),
                ),
            };

            match event_audit.settle(&record.original_event_id, record.status, failure_class).await
            {
                Ok(()) => {
                    debug!(
                        original = %record.original_event_id,
                        "📨 [ACK_LISTENER]: Audit row settled."
                    );
                    HandlerOutcome::Ack(json!({ "settled": record.original_event_id }))
                }
                Err(settlement_fault) => {
                    HandlerOutcome::Nack(format!("settlement_fault: {}", settlement_fault))
                }
            }
        }
    }
}

pub struct AcknowledgmentListener {
    state: AppState,
    shutdown_signal: watch::Receiver<bool>,
}

impl AcknowledgmentListener {
    pub fn new(state: AppState, shutdown_signal: watch::Receiver<bool>) -> Self {
        Self { state, shutdown_signal }
    }

    /// Cola de acuses del servicio.
    pub fn acknowledgment_queue(service_name: &str) -> String {
        format!("{}-acks", service_name)
    }

    /// Enlaza la cola de acuses y lanza el bucle de sellado.
    pub async fn spawn(self) -> Result<tokio::task::JoinHandle<()>, FabricError> {
        let queue_name = Self::acknowledgment_queue(&self.state.service_name);
        let binding_pattern = acknowledgment_routing_key(&self.state.service_name);

        let control_conduit = self.state.fabric.dial()?;
        control_conduit
            .bind_queue(&queue_name, INTER_APP_EVENTS_EXCHANGE, &binding_pattern)
            .await?;

        info!(
            "📨 [ACK_LISTENER]: Settlement loop binding [{}] <- [{}].",
            queue_name, binding_pattern
        );

        let settings = ConsumerSettings::nominal(
            &queue_name,
            &format!("{}-settlement", self.state.service_name),
            &format!("{}-settler-1", self.state.service_name),
        );

        let runtime = ConsumerRuntime::new(
            self.state.fabric.clone(),
            self.state.publisher.clone(),
            settings,
            self.shutdown_signal.clone(),
        );

        let handler = AckSettlementHandler { event_audit: self.state.event_audit.clone() };
        let listener_handle = tokio::spawn(async move {
            runtime.run(handler).await;
            warn!("📨 [ACK_LISTENER]: Settlement loop terminated.");
        });

        Ok(listener_handle)
    }
}
