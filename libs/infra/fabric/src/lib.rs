// [libs/infra/fabric/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MESSAGE FABRIC HUB (V3.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DEL TEJIDO DE EVENTOS
 * =================================================================
 */

pub mod broker;
pub mod consumer;
pub mod errors;
pub mod exchange;
pub mod publisher;
pub mod routing;

pub use broker::{
    Delivery, FabricConduit, FabricMessage, MessageFabric, PublishConfirmation, ReturnedMessage,
};
pub use consumer::{
    ConsumerRuntime, ConsumerSettings, EventHandler, HandlerOutcome, IdempotencyWindow,
};
pub use errors::FabricError;
pub use exchange::{
    standard_declarations, ExchangeDeclaration, ExchangeKind, INTER_APP_BROADCAST_EXCHANGE,
    INTER_APP_EVENTS_EXCHANGE,
};
pub use publisher::{forge_event_identifier, InterAppPublisher, PublishReceipt};
pub use routing::{acknowledgment_routing_key, derive_routing_key, BindingPattern};
