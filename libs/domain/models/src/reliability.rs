// [libs/domain/models/src/reliability.rs]
/*!
 * =================================================================
 * APARATO: RELIABILITY PROFILE (V1.4 - SLO SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DECLARACIÓN ESTÁTICA DE SLOs Y TAXONOMÍA DE FALLOS
 *
 * # Mathematical Proof (Closed Taxonomy):
 * Toda señal saliente cuyo acuse resulte 'failed' porta exactamente
 * una de las nueve clases. La taxonomía es cerrada: el caso residual
 * es 'unknown', nunca una etiqueta libre.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Clase de fallo que etiqueta los acuses negativos y el rastro
/// forense de la plataforma.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    BrokerUnavailable,
    UnroutableMessage,
    PublishConfirmTimeout,
    ConsumerProcessingFailure,
    RetryExhausted,
    AuthConfigurationError,
    ContractDrift,
    ReconciliationDrift,
    Unknown,
}

impl FailureClass {
    /// Etiqueta estable persistida y transportada en los acuses.
    pub fn as_code(&self) -> &'static str {
        match self {
            FailureClass::BrokerUnavailable => "broker_unavailable",
            FailureClass::UnroutableMessage => "unroutable_message",
            FailureClass::PublishConfirmTimeout => "publish_confirm_timeout",
            FailureClass::ConsumerProcessingFailure => "consumer_processing_failure",
            FailureClass::RetryExhausted => "retry_exhausted",
            FailureClass::AuthConfigurationError => "auth_configuration_error",
            FailureClass::ContractDrift => "contract_drift",
            FailureClass::ReconciliationDrift => "reconciliation_drift",
            FailureClass::Unknown => "unknown",
        }
    }

    pub fn from_code(persisted_code: &str) -> Self {
        match persisted_code {
            "broker_unavailable" => FailureClass::BrokerUnavailable,
            "unroutable_message" => FailureClass::UnroutableMessage,
            "publish_confirm_timeout" => FailureClass::PublishConfirmTimeout,
            "consumer_processing_failure" => FailureClass::ConsumerProcessingFailure,
            "retry_exhausted" => FailureClass::RetryExhausted,
            "auth_configuration_error" => FailureClass::AuthConfigurationError,
            "contract_drift" => FailureClass::ContractDrift,
            "reconciliation_drift" => FailureClass::ReconciliationDrift,
            _ => FailureClass::Unknown,
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_code())
    }
}

/// Objetivos de nivel de servicio del plano de distribución de eventos.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReliabilityProfile {
    /// Entrega inter-aplicación comprometida (porcentaje).
    pub inter_app_delivery_slo: f64,
    /// Acuse de eventos comprometido (porcentaje).
    pub event_acknowledgment_slo: f64,
    /// Latencia p95 de publicación confirmada (segundos).
    pub publish_latency_p95_seconds: u32,
    /// Objetivo de tiempo de recuperación (minutos).
    pub recovery_time_objective_minutes: u32,
    /// Objetivo de punto de recuperación (minutos), clase crítica.
    pub recovery_point_objective_minutes: u32,
}

/// Perfil vigente de la clase crítica del núcleo de créditos.
pub const RELIABILITY_PROFILE: ReliabilityProfile = ReliabilityProfile {
    inter_app_delivery_slo: 99.99,
    event_acknowledgment_slo: 99.9,
    publish_latency_p95_seconds: 5,
    recovery_time_objective_minutes: 15,
    recovery_point_objective_minutes: 5,
};
