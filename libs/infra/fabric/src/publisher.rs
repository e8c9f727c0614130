// [libs/infra/fabric/src/publisher.rs]
/*!
 * =================================================================
 * APARATO: INTER-APP PUBLISHER (V5.2 - CONFIRM HARDENED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PUBLICACIÓN CONFIRMADA, RETORNOS Y RECONEXIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONFIRM DISCIPLINE: Toda publicación dirigida viaja persistent +
 *    mandatory y espera la confirmación del núcleo con presupuesto de
 *    10 s; el vencimiento es 'publish_confirm_timeout'.
 * 2. LINK SENTINEL: Ante un conducto seccionado, la tarea centinela
 *    re-marca con reintentos de intervalo fijo (techo 10) y re-aserta
 *    las declaraciones idempotentes de los exchanges.
 * 3. RETURN OBSERVER: Cada mensaje retornado produce exactamente un
 *    diagnóstico 'unroutable_message' con su contexto de ruteo.
 * 4. BOUNDED DEGRADATION: Con el enlace caído, publish espera hasta
 *    la cota configurada y después fracasa como 'broker_unavailable'.
 * =================================================================
 */

use crate::broker::{FabricConduit, MessageFabric, PublishConfirmation};
use crate::errors::FabricError;
use crate::exchange::{
    standard_declarations, INTER_APP_BROADCAST_EXCHANGE, INTER_APP_EVENTS_EXCHANGE,
};
use crate::routing::{acknowledgment_routing_key, derive_routing_key};
use chrono::Utc;
use meridian_domain_models::events::{
    AcknowledgmentRecord, AcknowledgmentStatus, InterAppEnvelope,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

/// Presupuesto nominal de confirmación del broker.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Cota de suspensión de publish con el enlace caído.
const DISCONNECTED_GRACE: Duration = Duration::from_secs(15);

/// Intervalo fijo entre reintentos de re-marcado.
const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

/// Techo de intentos del centinela de enlace.
const RECONNECT_CEILING: u32 = 10;

/// Recibo de una publicación confirmada.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub event_identifier: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Online,
    Severed,
}

/// Forja el identificador canónico "inter_{unixMillis}_{random8}".
pub fn forge_event_identifier() -> String {
    let entropy_suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("inter_{}_{}", Utc::now().timestamp_millis(), entropy_suffix)
}

pub struct InterAppPublisher {
    source_application: String,
    fabric: MessageFabric,
    conduit: Mutex<FabricConduit>,
    link_state_sender: watch::Sender<LinkState>,
    confirm_timeout: Duration,
    disconnected_grace: Duration,
}

impl InterAppPublisher {
    /// Enciende el publicador: marca el conducto inicial, levanta el
    /// centinela de enlace y el observador de retornos.
    pub fn ignite(
        source_application: &str,
        fabric: MessageFabric,
    ) -> Result<Arc<Self>, FabricError> {
        if source_application.is_empty() {
            return Err(FabricError::DeclarationFault(
                "AUTH_CONFIGURATION_VOID: SERVICE_NAME undefined".into(),
            ));
        }

        let genesis_conduit = fabric.dial()?;
        let (link_state_sender, _) = watch::channel(LinkState::Online);

        let publisher = Arc::new(Self {
            source_application: source_application.to_string(),
            fabric,
            conduit: Mutex::new(genesis_conduit),
            link_state_sender,
            confirm_timeout: CONFIRM_TIMEOUT,
            disconnected_grace: DISCONNECTED_GRACE,
        });

        publisher.spawn_link_sentinel();
        publisher.spawn_return_observer();

        info!(
            "📡 [PUBLISHER]: Inter-app publisher online for source [{}].",
            publisher.source_application
        );
        Ok(publisher)
    }

    pub fn source_application(&self) -> &str {
        &self.source_application
    }

    /// Contador fuera de banda de mensajes retornados.
    pub fn unroutable_count(&self) -> u64 {
        self.fabric.unroutable_count()
    }

    // --- ESTRATO DE PUBLICACIÓN ---

    /// Publica un evento dirigido con sobre recién forjado.
    #[instrument(skip(self, event_data))]
    pub async fn publish(
        &self,
        target_application: &str,
        event_type: &str,
        tenant_identifier: &str,
        entity_identifier: &str,
        event_data: Value,
        published_by: &str,
    ) -> Result<PublishReceipt, FabricError> {
        let envelope = InterAppEnvelope {
            event_id: forge_event_identifier(),
            event_type: event_type.to_string(),
            source_application: self.source_application.clone(),
            target_application: target_application.to_string(),
            tenant_id: tenant_identifier.to_string(),
            entity_id: entity_identifier.to_string(),
            timestamp: Utc::now(),
            event_data,
            published_by: published_by.to_string(),
        };
        self.publish_envelope(&envelope).await
    }

    /// Publica un sobre ya forjado (re-emisiones del escáner: el
    /// 'event_id' original se preserva para la idempotencia aguas
    /// abajo).
    #[instrument(skip(self, envelope), fields(event = %envelope.event_id))]
    pub async fn publish_envelope(
        &self,
        envelope: &InterAppEnvelope,
    ) -> Result<PublishReceipt, FabricError> {
        let routing_key =
            derive_routing_key(&envelope.target_application, &envelope.event_type);

        let confirmation = self
            .transmit_confirmed(INTER_APP_EVENTS_EXCHANGE, &routing_key, envelope, true)
            .await?;

        debug!(
            event = %envelope.event_id,
            routing_key = %routing_key,
            routed = confirmation.routed_queue_count,
            "✅ [PUBLISHER]: Broker confirmation received."
        );

        Ok(PublishReceipt { event_identifier: envelope.event_id.clone(), routing_key })
    }

    /// Difusión por el exchange fanout con clave de ruteo vacía.
    #[instrument(skip(self, event_data))]
    pub async fn publish_broadcast(
        &self,
        event_type: &str,
        tenant_identifier: &str,
        entity_identifier: &str,
        event_data: Value,
        published_by: &str,
    ) -> Result<PublishReceipt, FabricError> {
        let envelope = InterAppEnvelope {
            event_id: forge_event_identifier(),
            event_type: event_type.to_string(),
            source_application: self.source_application.clone(),
            target_application: "broadcast".to_string(),
            tenant_id: tenant_identifier.to_string(),
            entity_id: entity_identifier.to_string(),
            timestamp: Utc::now(),
            event_data,
            published_by: published_by.to_string(),
        };

        self.transmit_confirmed(INTER_APP_BROADCAST_EXCHANGE, "", &envelope, false).await?;
        Ok(PublishReceipt {
            event_identifier: envelope.event_id.clone(),
            routing_key: String::new(),
        })
    }

    /// Publica el acuse espejo de un evento procesado hacia su origen
    /// por la clave "acks.{sourceApplication}".
    #[instrument(skip(self, original_envelope, result))]
    pub async fn publish_acknowledgment(
        &self,
        original_envelope: &InterAppEnvelope,
        status: AcknowledgmentStatus,
        result: Value,
    ) -> Result<PublishReceipt, FabricError> {
        let record = AcknowledgmentRecord {
            original_event_id: original_envelope.event_id.clone(),
            status,
            processed_at: Utc::now(),
            result,
        };

        let routing_key = acknowledgment_routing_key(&original_envelope.source_application);
        let acknowledgment_envelope = InterAppEnvelope {
            event_id: forge_event_identifier(),
            event_type: "event.acknowledgment".to_string(),
            source_application: self.source_application.clone(),
            target_application: original_envelope.source_application.clone(),
            tenant_id: original_envelope.tenant_id.clone(),
            entity_id: original_envelope.entity_id.clone(),
            timestamp: Utc::now(),
            event_data: serde_json::to_value(&record)
                .unwrap_or_else(|_| Value::Null),
            published_by: "system".to_string(),
        };

        self.transmit_confirmed(
            INTER_APP_EVENTS_EXCHANGE,
            &routing_key,
            &acknowledgment_envelope,
            false,
        )
        .await?;

        Ok(PublishReceipt {
            event_identifier: acknowledgment_envelope.event_id.clone(),
            routing_key,
        })
    }

    // --- ESTRATO DE TRANSPORTE Y ENLACE ---

    async fn transmit_confirmed(
        &self,
        exchange_name: &str,
        routing_key: &str,
        envelope: &InterAppEnvelope,
        mandatory: bool,
    ) -> Result<PublishConfirmation, FabricError> {
        self.await_link_online().await?;

        let publish_attempt = {
            let conduit_guard = self.conduit.lock().await;
            conduit_guard
                .publish(exchange_name, routing_key, envelope.clone(), mandatory, true)
                .await
        };

        let confirm_receiver = match publish_attempt {
            Ok(receiver) => receiver,
            Err(transmission_fault) => {
                self.mark_severed();
                return Err(transmission_fault);
            }
        };

        match tokio::time::timeout(self.confirm_timeout, confirm_receiver).await {
            Ok(Ok(confirmation)) => confirmation,
            Ok(Err(_)) => {
                self.mark_severed();
                Err(FabricError::BrokerUnavailable("CONFIRM_SLOT_DROPPED".into()))
            }
            Err(_) => Err(FabricError::PublishConfirmTimeout {
                event_identifier: envelope.event_id.clone(),
            }),
        }
    }

    /// Suspende hasta que el enlace esté en línea, acotado por la
    /// gracia de desconexión.
    async fn await_link_online(&self) -> Result<(), FabricError> {
        let mut link_watch = self.link_state_sender.subscribe();
        if *link_watch.borrow() == LinkState::Online {
            return Ok(());
        }

        let wait_result = tokio::time::timeout(self.disconnected_grace, async {
            loop {
                if link_watch.changed().await.is_err() {
                    return Err(FabricError::ChannelCollapsed);
                }
                if *link_watch.borrow() == LinkState::Online {
                    return Ok(());
                }
            }
        })
        .await;

        match wait_result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(FabricError::BrokerUnavailable(
                "DISCONNECTED_GRACE_EXHAUSTED".into(),
            )),
        }
    }

    fn mark_severed(&self) {
        if *self.link_state_sender.borrow() != LinkState::Severed {
            warn!("🔌 [PUBLISHER]: Conduit severed. Link sentinel engaged.");
            let _ = self.link_state_sender.send(LinkState::Severed);
        }
    }

    /// Secciona el conducto vigente (inyección de fallos del Proving
    /// Grounds y pruebas de reconexión).
    pub async fn sever_active_conduit(&self) {
        self.conduit.lock().await.sever();
        self.mark_severed();
    }

    /// Centinela de enlace: re-marca con intervalo fijo hasta el techo
    /// y re-aserta las declaraciones idempotentes.
    fn spawn_link_sentinel(self: &Arc<Self>) {
        let publisher = Arc::clone(self);
        tokio::spawn(async move {
            let mut link_watch = publisher.link_state_sender.subscribe();
            loop {
                if *link_watch.borrow() == LinkState::Severed {
                    publisher.attempt_relink().await;
                }
                if link_watch.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    async fn attempt_relink(&self) {
        for attempt_ordinal in 1..=RECONNECT_CEILING {
            tokio::time::sleep(RECONNECT_INTERVAL).await;

            match self.fabric.dial() {
                Ok(fresh_conduit) => {
                    // Re-aserción idempotente de los exchanges antes de
                    // reanudar el tráfico.
                    let mut declarations_restored = true;
                    for declaration in standard_declarations() {
                        if fresh_conduit.declare_exchange(declaration).await.is_err() {
                            declarations_restored = false;
                            break;
                        }
                    }

                    if declarations_restored {
                        *self.conduit.lock().await = fresh_conduit;
                        let _ = self.link_state_sender.send(LinkState::Online);
                        info!(
                            "🔁 [PUBLISHER]: Link restored on attempt {}. Exchanges re-asserted.",
                            attempt_ordinal
                        );
                        return;
                    }
                }
                Err(dial_fault) => {
                    warn!(
                        "🔁 [PUBLISHER]: Relink attempt {}/{} failed: {}",
                        attempt_ordinal, RECONNECT_CEILING, dial_fault
                    );
                }
            }
        }

        error!(
            "💀 [PUBLISHER_FATAL]: Relink ceiling ({}) exhausted. Publishes will degrade as broker_unavailable.",
            RECONNECT_CEILING
        );
    }

    /// Observador de retornos: un diagnóstico por mensaje huérfano.
    fn spawn_return_observer(self: &Arc<Self>) {
        let mut returns_subscription = self.fabric.subscribe_returns();
        let source_label = self.source_application.clone();
        tokio::spawn(async move {
            while let Ok(returned) = returns_subscription.recv().await {
                error!(
                    source = %source_label,
                    event = %returned.event_identifier,
                    exchange = %returned.exchange_name,
                    routing_key = %returned.routing_key,
                    target = %returned.target_application,
                    failure_class = "unroutable_message",
                    "📭 [PUBLISHER_RETURN]: Mandatory publish reached no queue."
                );
            }
        });
    }
}
