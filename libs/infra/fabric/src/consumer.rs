// [libs/infra/fabric/src/consumer.rs]
/*!
 * =================================================================
 * APARATO: CONSUMER RUNTIME (V4.3 - POISON SHIELD)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: BUCLE DE GRUPO DURABLE CON IDEMPOTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TWO-PHASE DRAIN: Cada tick drena primero las entregas pendientes
 *    de la sesión anterior (bloqueo corto) y después las nuevas del
 *    grupo (bloqueo medio).
 * 2. POISON SHIELD: Tras N reintentos en proceso (1 nominal) el
 *    runtime ACUSA de todos modos: un mensaje veneno jamás cicla. El
 *    fallo queda clasificado 'consumer_processing_failure' y el acuse
 *    negativo viaja de vuelta al publicador.
 * 3. IDEMPOTENCY WINDOW: Ventana LRU de los últimos K (10 000)
 *    identificadores; la re-entrega de un evento visto se acusa en
 *    corto sin re-ejecutar efectos.
 * 4. GRACEFUL SHUTDOWN: La señal detiene el bucle entre ticks, jamás
 *    a mitad de un manejador.
 * =================================================================
 */

use crate::broker::{Delivery, MessageFabric};
use crate::publisher::InterAppPublisher;
use meridian_domain_models::events::{AcknowledgmentStatus, InterAppEnvelope};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Ventana nominal de idempotencia (últimos K identificadores).
const IDEMPOTENCY_WINDOW_CAPACITY: usize = 10_000;

/// Resultado del manejador de un consumidor.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Procesado; el valor viaja en el acuse positivo.
    Ack(Value),
    /// Fallido; la razón viaja en el acuse negativo.
    Nack(String),
}

/// Manejador de eventos de un silo de aplicación.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(
        &self,
        event: &InterAppEnvelope,
    ) -> impl Future<Output = HandlerOutcome> + Send;
}

/// Ventana deslizante de identificadores recientes.
pub struct IdempotencyWindow {
    seen_identifiers: HashSet<String>,
    eviction_order: VecDeque<String>,
    capacity: usize,
}

impl IdempotencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen_identifiers: HashSet::with_capacity(capacity.min(16_384)),
            eviction_order: VecDeque::with_capacity(capacity.min(16_384)),
            capacity,
        }
    }

    pub fn contains(&self, event_identifier: &str) -> bool {
        self.seen_identifiers.contains(event_identifier)
    }

    pub fn record(&mut self, event_identifier: &str) {
        if self.seen_identifiers.insert(event_identifier.to_string()) {
            self.eviction_order.push_back(event_identifier.to_string());
            while self.eviction_order.len() > self.capacity {
                if let Some(evicted_identifier) = self.eviction_order.pop_front() {
                    self.seen_identifiers.remove(&evicted_identifier);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen_identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_identifiers.is_empty()
    }
}

/// Configuración del bucle de consumo.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Cola (stream) de la que el grupo consume.
    pub stream_key: String,
    pub group_name: String,
    pub consumer_name: String,
    /// Ráfaga máxima de pendientes por tick.
    pub pending_batch_ceiling: usize,
    /// Ráfaga máxima de mensajes nuevos por tick.
    pub new_batch_ceiling: usize,
    /// Bloqueo medio de la lectura de nuevos (latencia de shutdown).
    pub new_block_budget: Duration,
    /// Reintentos en proceso antes del acuse del escudo anti-veneno.
    pub handler_retry_budget: u32,
}

impl ConsumerSettings {
    pub fn nominal(stream_key: &str, group_name: &str, consumer_name: &str) -> Self {
        Self {
            stream_key: stream_key.to_string(),
            group_name: group_name.to_string(),
            consumer_name: consumer_name.to_string(),
            pending_batch_ceiling: 16,
            new_batch_ceiling: 32,
            new_block_budget: Duration::from_secs(2),
            handler_retry_budget: 1,
        }
    }
}

pub struct ConsumerRuntime {
    fabric: MessageFabric,
    publisher: Arc<InterAppPublisher>,
    settings: ConsumerSettings,
    shutdown_signal: watch::Receiver<bool>,
    idempotency_window: IdempotencyWindow,
}

impl ConsumerRuntime {
    pub fn new(
        fabric: MessageFabric,
        publisher: Arc<InterAppPublisher>,
        settings: ConsumerSettings,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        fabric.ensure_group(&settings.stream_key, &settings.group_name);
        Self {
            fabric,
            publisher,
            settings,
            shutdown_signal,
            idempotency_window: IdempotencyWindow::new(IDEMPOTENCY_WINDOW_CAPACITY),
        }
    }

    /// Bucle perpetuo del consumidor; retorna ante la señal de cierre.
    #[instrument(skip(self, handler), fields(
        stream = %self.settings.stream_key,
        group = %self.settings.group_name,
        consumer = %self.settings.consumer_name
    ))]
    pub async fn run<H: EventHandler>(mut self, handler: H) {
        info!("🛰️  [CONSUMER]: Group loop online.");

        loop {
            if *self.shutdown_signal.borrow() {
                info!("🛑 [CONSUMER]: Shutdown signal honored between ticks.");
                return;
            }

            // FASE 1: redelivery de pendientes de la sesión anterior.
            let pending_batch = self.fabric.read_pending(
                &self.settings.stream_key,
                &self.settings.group_name,
                &self.settings.consumer_name,
                self.settings.pending_batch_ceiling,
            );
            for delivery in pending_batch {
                self.dispatch_delivery(&handler, delivery).await;
            }

            if *self.shutdown_signal.borrow() {
                info!("🛑 [CONSUMER]: Shutdown signal honored between ticks.");
                return;
            }

            // FASE 2: mensajes nuevos del grupo (bloqueo medio).
            let fresh_batch = self
                .fabric
                .read_new(
                    &self.settings.stream_key,
                    &self.settings.group_name,
                    &self.settings.consumer_name,
                    self.settings.new_batch_ceiling,
                    self.settings.new_block_budget,
                )
                .await;
            for delivery in fresh_batch {
                self.dispatch_delivery(&handler, delivery).await;
            }
        }
    }

    async fn dispatch_delivery<H: EventHandler>(&mut self, handler: &H, delivery: Delivery) {
        let envelope = &delivery.message.envelope;
        let event_identifier = envelope.event_id.clone();

        // El canal de acuses es terminal: un acuse jamás genera otro
        // acuse (evita la amplificación del propio canal).
        let is_acknowledgment_event = envelope.event_type == "event.acknowledgment";

        // Ventana de idempotencia: la re-entrega se acusa en corto.
        if self.idempotency_window.contains(&event_identifier) {
            debug!(event = %event_identifier, "♻️  [CONSUMER]: Redelivery short-circuited.");
            self.acknowledge(&event_identifier);
            return;
        }

        let mut last_failure_reason = String::new();
        let attempt_ceiling = 1 + self.settings.handler_retry_budget;

        for attempt_ordinal in 1..=attempt_ceiling {
            match handler.handle(envelope).await {
                HandlerOutcome::Ack(handler_result) => {
                    self.acknowledge(&event_identifier);
                    self.idempotency_window.record(&event_identifier);

                    if !is_acknowledgment_event {
                        if let Err(acknowledgment_fault) = self
                            .publisher
                            .publish_acknowledgment(
                                envelope,
                                AcknowledgmentStatus::Processed,
                                handler_result,
                            )
                            .await
                        {
                            warn!(
                                event = %event_identifier,
                                "⚠️ [CONSUMER]: Positive acknowledgment publish failed: {}",
                                acknowledgment_fault
                            );
                        }
                    }
                    return;
                }
                HandlerOutcome::Nack(failure_reason) => {
                    warn!(
                        event = %event_identifier,
                        attempt = attempt_ordinal,
                        "🔄 [CONSUMER]: Handler rejected the event: {}",
                        failure_reason
                    );
                    last_failure_reason = failure_reason;
                }
            }
        }

        // ESCUDO ANTI-VENENO: acusar de todos modos tras agotar los
        // reintentos; el fallo queda clasificado y el acuse negativo
        // viaja al publicador.
        error!(
            event = %event_identifier,
            failure_class = "consumer_processing_failure",
            "☠️  [CONSUMER]: Retry budget exhausted. Acknowledging to break the poison loop."
        );
        self.acknowledge(&event_identifier);
        self.idempotency_window.record(&event_identifier);

        if !is_acknowledgment_event {
            if let Err(acknowledgment_fault) = self
                .publisher
                .publish_acknowledgment(
                    envelope,
                    AcknowledgmentStatus::Failed,
                    json!({
                        "error": last_failure_reason,
                        "failureClass": "consumer_processing_failure",
                    }),
                )
                .await
            {
                warn!(
                    event = %event_identifier,
                    "⚠️ [CONSUMER]: Negative acknowledgment publish failed: {}",
                    acknowledgment_fault
                );
            }
        }
    }

    fn acknowledge(&self, event_identifier: &str) {
        self.fabric.acknowledge(
            &self.settings.stream_key,
            &self.settings.group_name,
            event_identifier,
        );
    }
}
