// [libs/infra/fabric/src/errors.rs]
/*!
 * =================================================================
 * APARATO: FABRIC ERROR CATALOG (V3.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE TRANSPORTE
 * =================================================================
 */

use meridian_domain_models::reliability::FailureClass;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FabricError {
    /// El enlace al broker está caído o rechazó la publicación.
    #[error("[L3_FABRIC_FAULT]: BROKER_UNAVAILABLE -> {0}")]
    BrokerUnavailable(String),

    /// La confirmación no llegó dentro del presupuesto (10 s).
    #[error("[L3_FABRIC_FAULT]: PUBLISH_CONFIRM_TIMEOUT for event '{event_identifier}'")]
    PublishConfirmTimeout { event_identifier: String },

    /// Exchange desconocido o declaración inconsistente.
    #[error("[L3_FABRIC_FAULT]: EXCHANGE_DECLARATION_FAULT -> {0}")]
    DeclarationFault(String),

    /// El patrón de enlace viola la gramática de segmentos.
    #[error("[L3_FABRIC_FAULT]: INVALID_BINDING_PATTERN '{0}'")]
    InvalidBindingPattern(String),

    /// El canal interno del tejido colapsó (condición terminal).
    #[error("[L3_FABRIC_FAULT]: TRANSMISSION_CHANNEL_COLLAPSED")]
    ChannelCollapsed,
}

impl FabricError {
    /// Proyección sobre la taxonomía cerrada de confiabilidad.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            FabricError::BrokerUnavailable(_) | FabricError::ChannelCollapsed => {
                FailureClass::BrokerUnavailable
            }
            FabricError::PublishConfirmTimeout { .. } => FailureClass::PublishConfirmTimeout,
            FabricError::DeclarationFault(_) | FabricError::InvalidBindingPattern(_) => {
                FailureClass::AuthConfigurationError
            }
        }
    }
}
