// [libs/infra/fabric/src/broker.rs]
/*!
 * =================================================================
 * APARATO: MESSAGE FABRIC CORE (V5.0 - CONFIRM MODE)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: EXCHANGES, COLAS, GRUPOS Y CONFIRMACIONES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONFIRM MODE: Cada publicación viaja con su ranura oneshot; el
 *    núcleo responde tras apendizar el mensaje en TODAS las colas
 *    ruteadas. Esa respuesta ES la confirmación del broker.
 * 2. MANDATORY RETURNS: Una publicación mandatory sin cola destino
 *    dispara exactamente un retorno diagnosticado y un incremento del
 *    contador fuera de banda; la confirmación NO se invalida.
 * 3. BACK-PRESSURE: El canal de comandos es acotado; un publicador
 *    con el buffer lleno se suspende hasta la señal de drenado,
 *    preservando el orden por emisor lógico.
 * 4. CONSUMER GROUPS: Cada cola sostiene grupos con cursor y lista de
 *    entregas pendientes por consumidor; la re-lectura de pendientes
 *    habilita la redelivery de sesiones anteriores.
 *
 * # Mathematical Proof (Per-Sender Ordering):
 * El canal único de comandos es FIFO: dos publicaciones del mismo
 * emisor se apendizan en el orden de envío. El cursor por grupo
 * entrega cada mensaje de una cola a exactamente un miembro.
 * =================================================================
 */

use crate::errors::FabricError;
use crate::exchange::{standard_declarations, ExchangeDeclaration, ExchangeKind};
use crate::routing::BindingPattern;
use meridian_domain_models::events::InterAppEnvelope;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacidad del canal de comandos; el buffer lleno ES la señal de
/// back-pressure para los publicadores.
const COMMAND_CHANNEL_CAPACITY: usize = 512;

/// Capacidad del canal de retornos de mensajes no-ruteables.
const RETURN_CHANNEL_CAPACITY: usize = 256;

/// Mensaje cristalizado en una cola del tejido.
#[derive(Debug, Clone)]
pub struct FabricMessage {
    pub envelope: InterAppEnvelope,
    pub routing_key: String,
    pub exchange_name: String,
    pub persistent: bool,
    pub sequence: u64,
}

/// Entrega hacia un consumidor de grupo.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Arc<FabricMessage>,
    pub delivery_count: u32,
}

/// Retorno diagnóstico de una publicación mandatory sin destino.
#[derive(Debug, Clone)]
pub struct ReturnedMessage {
    pub event_identifier: String,
    pub exchange_name: String,
    pub routing_key: String,
    pub target_application: String,
}

/// Confirmación del broker tras el apendizado.
#[derive(Debug, Clone, Copy)]
pub struct PublishConfirmation {
    pub sequence: u64,
    pub routed_queue_count: usize,
}

struct PendingDelivery {
    message: Arc<FabricMessage>,
    consumer_name: String,
    delivery_count: u32,
}

#[derive(Default)]
struct GroupState {
    cursor: usize,
    pending: VecDeque<PendingDelivery>,
}

#[derive(Default)]
struct QueueState {
    retained: Vec<Arc<FabricMessage>>,
    groups: HashMap<String, GroupState>,
}

struct QueueBinding {
    queue_name: String,
    exchange_name: String,
    pattern: BindingPattern,
}

#[derive(Default)]
struct FabricState {
    exchanges: HashMap<String, ExchangeDeclaration>,
    bindings: Vec<QueueBinding>,
    queues: HashMap<String, QueueState>,
    sequence: u64,
}

/// Comandos servidos por la tarea central del tejido.
enum FabricCommand {
    Publish {
        exchange_name: String,
        routing_key: String,
        envelope: InterAppEnvelope,
        mandatory: bool,
        persistent: bool,
        confirm_slot: oneshot::Sender<Result<PublishConfirmation, FabricError>>,
    },
    DeclareExchange {
        declaration: ExchangeDeclaration,
        confirm_slot: oneshot::Sender<Result<(), FabricError>>,
    },
    BindQueue {
        queue_name: String,
        exchange_name: String,
        pattern_source: String,
        confirm_slot: oneshot::Sender<Result<(), FabricError>>,
    },
}

/// Conducto de un publicador hacia la tarea central. Modela el canal
/// de un enlace: puede seccionarse (pérdida de conexión) y re-marcarse
/// con un nuevo dial.
#[derive(Clone)]
pub struct FabricConduit {
    command_sender: mpsc::Sender<FabricCommand>,
    severed: Arc<AtomicBool>,
}

impl FabricConduit {
    /// Secciona el conducto: todo envío posterior fracasa como enlace
    /// caído. Herramienta de inyección de fallos del Proving Grounds.
    pub fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
    }

    pub fn is_severed(&self) -> bool {
        self.severed.load(Ordering::SeqCst)
    }

    async fn transmit(&self, command: FabricCommand) -> Result<(), FabricError> {
        if self.is_severed() {
            return Err(FabricError::BrokerUnavailable("CONDUIT_SEVERED".into()));
        }
        // Canal acotado: la espera aquí es la suspensión de
        // back-pressure del publicador.
        self.command_sender
            .send(command)
            .await
            .map_err(|_| FabricError::BrokerUnavailable("FABRIC_CORE_OFFLINE".into()))
    }

    /// Publicación en modo confirmación (sin presupuesto de espera:
    /// el publicador aplica su propio timeout sobre la ranura).
    pub async fn publish(
        &self,
        exchange_name: &str,
        routing_key: &str,
        envelope: InterAppEnvelope,
        mandatory: bool,
        persistent: bool,
    ) -> Result<oneshot::Receiver<Result<PublishConfirmation, FabricError>>, FabricError> {
        let (confirm_slot, confirm_receiver) = oneshot::channel();
        self.transmit(FabricCommand::Publish {
            exchange_name: exchange_name.to_string(),
            routing_key: routing_key.to_string(),
            envelope,
            mandatory,
            persistent,
            confirm_slot,
        })
        .await?;
        Ok(confirm_receiver)
    }

    /// Declaración idempotente de un exchange.
    pub async fn declare_exchange(
        &self,
        declaration: ExchangeDeclaration,
    ) -> Result<(), FabricError> {
        let (confirm_slot, confirm_receiver) = oneshot::channel();
        self.transmit(FabricCommand::DeclareExchange { declaration, confirm_slot }).await?;
        confirm_receiver.await.map_err(|_| FabricError::ChannelCollapsed)?
    }

    /// Enlaza una cola durable a un exchange con un patrón topic.
    pub async fn bind_queue(
        &self,
        queue_name: &str,
        exchange_name: &str,
        pattern_source: &str,
    ) -> Result<(), FabricError> {
        let (confirm_slot, confirm_receiver) = oneshot::channel();
        self.transmit(FabricCommand::BindQueue {
            queue_name: queue_name.to_string(),
            exchange_name: exchange_name.to_string(),
            pattern_source: pattern_source.to_string(),
            confirm_slot,
        })
        .await?;
        confirm_receiver.await.map_err(|_| FabricError::ChannelCollapsed)?
    }
}

/// Núcleo del tejido de mensajes: estado compartido + tarea central.
#[derive(Clone)]
pub struct MessageFabric {
    state: Arc<Mutex<FabricState>>,
    arrival_signal: Arc<Notify>,
    returned_channel: broadcast::Sender<ReturnedMessage>,
    unroutable_counter: Arc<AtomicU64>,
    command_sender: mpsc::Sender<FabricCommand>,
}

impl MessageFabric {
    /// Enciende el núcleo: estado virgen, exchanges canónicos y tarea
    /// central servida por el canal acotado.
    pub fn ignite() -> Self {
        let (command_sender, command_receiver) =
            mpsc::channel::<FabricCommand>(COMMAND_CHANNEL_CAPACITY);
        let (returned_channel, _) = broadcast::channel(RETURN_CHANNEL_CAPACITY);

        let mut genesis_state = FabricState::default();
        for declaration in standard_declarations() {
            genesis_state.exchanges.insert(declaration.exchange_name.clone(), declaration);
        }

        let fabric = Self {
            state: Arc::new(Mutex::new(genesis_state)),
            arrival_signal: Arc::new(Notify::new()),
            returned_channel,
            unroutable_counter: Arc::new(AtomicU64::new(0)),
            command_sender,
        };

        fabric.spawn_core_task(command_receiver);
        info!("🕸️  [FABRIC]: Message fabric core online. Exchanges asserted.");
        fabric
    }

    /// Marca un nuevo conducto hacia la tarea central.
    pub fn dial(&self) -> Result<FabricConduit, FabricError> {
        if self.command_sender.is_closed() {
            return Err(FabricError::BrokerUnavailable("FABRIC_CORE_OFFLINE".into()));
        }
        Ok(FabricConduit {
            command_sender: self.command_sender.clone(),
            severed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Suscripción al flujo de retornos de mensajes no-ruteables.
    pub fn subscribe_returns(&self) -> broadcast::Receiver<ReturnedMessage> {
        self.returned_channel.subscribe()
    }

    /// Contador fuera de banda de mensajes retornados.
    pub fn unroutable_count(&self) -> u64 {
        self.unroutable_counter.load(Ordering::SeqCst)
    }

    // --- ESTRATO DE LECTURA DE GRUPOS (CONSUMER RUNTIME) ---

    /// Garantiza la existencia del grupo sobre la cola.
    pub fn ensure_group(&self, queue_name: &str, group_name: &str) {
        let mut state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        let queue = state_guard.queues.entry(queue_name.to_string()).or_default();
        queue.groups.entry(group_name.to_string()).or_default();
    }

    /// Entregas pendientes asignadas al consumidor (sesión anterior).
    pub fn read_pending(
        &self,
        queue_name: &str,
        group_name: &str,
        consumer_name: &str,
        batch_ceiling: usize,
    ) -> Vec<Delivery> {
        let mut state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        let Some(queue) = state_guard.queues.get_mut(queue_name) else {
            return Vec::new();
        };
        let Some(group) = queue.groups.get_mut(group_name) else {
            return Vec::new();
        };

        group
            .pending
            .iter_mut()
            .filter(|pending| pending.consumer_name == consumer_name)
            .take(batch_ceiling)
            .map(|pending| {
                pending.delivery_count += 1;
                Delivery {
                    message: pending.message.clone(),
                    delivery_count: pending.delivery_count,
                }
            })
            .collect()
    }

    /// Lee mensajes nuevos del grupo, reclamándolos como pendientes
    /// del consumidor. Suspende hasta 'block_budget' ante cola seca.
    pub async fn read_new(
        &self,
        queue_name: &str,
        group_name: &str,
        consumer_name: &str,
        batch_ceiling: usize,
        block_budget: Duration,
    ) -> Vec<Delivery> {
        let read_deadline = Instant::now() + block_budget;

        loop {
            let claimed_batch =
                self.claim_new_batch(queue_name, group_name, consumer_name, batch_ceiling);
            if !claimed_batch.is_empty() {
                return claimed_batch;
            }

            let remaining_budget = read_deadline.saturating_duration_since(Instant::now());
            if remaining_budget.is_zero() {
                return Vec::new();
            }

            let _ =
                tokio::time::timeout(remaining_budget, self.arrival_signal.notified()).await;
        }
    }

    /// Acusa una entrega: la retira de la lista de pendientes.
    pub fn acknowledge(&self, queue_name: &str, group_name: &str, event_identifier: &str) {
        let mut state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        if let Some(queue) = state_guard.queues.get_mut(queue_name) {
            if let Some(group) = queue.groups.get_mut(group_name) {
                group
                    .pending
                    .retain(|pending| pending.message.envelope.event_id != event_identifier);
            }
        }
    }

    /// Entregas pendientes vivas de un grupo (diagnóstico).
    pub fn pending_count(&self, queue_name: &str, group_name: &str) -> usize {
        let state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        state_guard
            .queues
            .get(queue_name)
            .and_then(|queue| queue.groups.get(group_name))
            .map(|group| group.pending.len())
            .unwrap_or(0)
    }

    /// Profundidad retenida de una cola (diagnóstico).
    pub fn queue_depth(&self, queue_name: &str) -> usize {
        let state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        state_guard.queues.get(queue_name).map(|queue| queue.retained.len()).unwrap_or(0)
    }

    fn claim_new_batch(
        &self,
        queue_name: &str,
        group_name: &str,
        consumer_name: &str,
        batch_ceiling: usize,
    ) -> Vec<Delivery> {
        let mut state_guard = self.state.lock().expect("FATAL: fabric state poisoned");
        let Some(queue) = state_guard.queues.get_mut(queue_name) else {
            return Vec::new();
        };
        // Préstamos disjuntos: el log retenido y los grupos viven en
        // campos separados de la cola.
        let QueueState { retained, groups } = queue;
        let Some(group) = groups.get_mut(group_name) else {
            return Vec::new();
        };

        let mut claimed_batch = Vec::new();
        while group.cursor < retained.len() && claimed_batch.len() < batch_ceiling {
            let message = retained[group.cursor].clone();
            group.cursor += 1;
            group.pending.push_back(PendingDelivery {
                message: message.clone(),
                consumer_name: consumer_name.to_string(),
                delivery_count: 1,
            });
            claimed_batch.push(Delivery { message, delivery_count: 1 });
        }
        claimed_batch
    }

    // --- ESTRATO DE LA TAREA CENTRAL ---

    fn spawn_core_task(&self, mut command_receiver: mpsc::Receiver<FabricCommand>) {
        let state = self.state.clone();
        let arrival_signal = self.arrival_signal.clone();
        let returned_channel = self.returned_channel.clone();
        let unroutable_counter = self.unroutable_counter.clone();

        tokio::spawn(async move {
            while let Some(command) = command_receiver.recv().await {
                match command {
                    FabricCommand::Publish {
                        exchange_name,
                        routing_key,
                        envelope,
                        mandatory,
                        persistent,
                        confirm_slot,
                    } => {
                        let confirmation = route_and_append(
                            &state,
                            &arrival_signal,
                            &returned_channel,
                            &unroutable_counter,
                            exchange_name,
                            routing_key,
                            envelope,
                            mandatory,
                            persistent,
                        );
                        let _ = confirm_slot.send(confirmation);
                    }
                    FabricCommand::DeclareExchange { declaration, confirm_slot } => {
                        let mut state_guard =
                            state.lock().expect("FATAL: fabric state poisoned");
                        // Declaración idempotente: re-asertar es un no-op.
                        state_guard
                            .exchanges
                            .entry(declaration.exchange_name.clone())
                            .or_insert(declaration);
                        let _ = confirm_slot.send(Ok(()));
                    }
                    FabricCommand::BindQueue {
                        queue_name,
                        exchange_name,
                        pattern_source,
                        confirm_slot,
                    } => {
                        let binding_result =
                            bind_queue(&state, queue_name, exchange_name, pattern_source);
                        let _ = confirm_slot.send(binding_result);
                    }
                }
            }
            error!("💀 [FABRIC_FATAL]: Command channel drained. Core task terminating.");
        });
    }
}

fn bind_queue(
    state: &Arc<Mutex<FabricState>>,
    queue_name: String,
    exchange_name: String,
    pattern_source: String,
) -> Result<(), FabricError> {
    let pattern = BindingPattern::parse(&pattern_source)?;

    let mut state_guard = state.lock().expect("FATAL: fabric state poisoned");
    if !state_guard.exchanges.contains_key(&exchange_name) {
        return Err(FabricError::DeclarationFault(format!(
            "UNKNOWN_EXCHANGE '{}'",
            exchange_name
        )));
    }

    state_guard.queues.entry(queue_name.clone()).or_default();

    let already_bound = state_guard.bindings.iter().any(|binding| {
        binding.queue_name == queue_name
            && binding.exchange_name == exchange_name
            && binding.pattern.source() == pattern.source()
    });
    if !already_bound {
        debug!(
            "🔗 [FABRIC]: Queue [{}] bound to [{}] with pattern [{}].",
            queue_name, exchange_name, pattern_source
        );
        state_guard.bindings.push(QueueBinding { queue_name, exchange_name, pattern });
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn route_and_append(
    state: &Arc<Mutex<FabricState>>,
    arrival_signal: &Arc<Notify>,
    returned_channel: &broadcast::Sender<ReturnedMessage>,
    unroutable_counter: &Arc<AtomicU64>,
    exchange_name: String,
    routing_key: String,
    envelope: InterAppEnvelope,
    mandatory: bool,
    persistent: bool,
) -> Result<PublishConfirmation, FabricError> {
    let mut state_guard = state.lock().expect("FATAL: fabric state poisoned");

    let exchange = state_guard
        .exchanges
        .get(&exchange_name)
        .cloned()
        .ok_or_else(|| FabricError::DeclarationFault(format!("UNKNOWN_EXCHANGE '{}'", exchange_name)))?;

    state_guard.sequence += 1;
    let sequence = state_guard.sequence;

    let destination_queues: Vec<String> = state_guard
        .bindings
        .iter()
        .filter(|binding| binding.exchange_name == exchange_name)
        .filter(|binding| match exchange.kind {
            // Fanout ignora la clave de ruteo por contrato.
            ExchangeKind::Fanout => true,
            ExchangeKind::Topic => binding.pattern.matches(&routing_key),
        })
        .map(|binding| binding.queue_name.clone())
        .collect();

    let message = Arc::new(FabricMessage {
        envelope,
        routing_key: routing_key.clone(),
        exchange_name: exchange_name.clone(),
        persistent,
        sequence,
    });

    for queue_name in &destination_queues {
        if let Some(queue) = state_guard.queues.get_mut(queue_name) {
            queue.retained.push(message.clone());
        }
    }

    let routed_queue_count = destination_queues.len();
    drop(state_guard);

    if routed_queue_count > 0 {
        arrival_signal.notify_waiters();
    } else if mandatory {
        // Retorno diagnóstico: la confirmación NO se invalida; el
        // contador fuera de banda y el rastro forense registran el
        // mensaje huérfano con su contexto de ruteo completo.
        unroutable_counter.fetch_add(1, Ordering::SeqCst);
        warn!(
            event = %message.envelope.event_id,
            exchange = %exchange_name,
            routing_key = %routing_key,
            target = %message.envelope.target_application,
            "📭 [FABRIC_RETURN]: unroutable_message — no queue matched the mandatory publish."
        );
        let _ = returned_channel.send(ReturnedMessage {
            event_identifier: message.envelope.event_id.clone(),
            exchange_name,
            routing_key,
            target_application: message.envelope.target_application.clone(),
        });
    }

    Ok(PublishConfirmation { sequence, routed_queue_count })
}
