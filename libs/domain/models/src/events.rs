// [libs/domain/models/src/events.rs]
/*!
 * =================================================================
 * APARATO: INTER-APPLICATION EVENT CONTRACTS (V4.0 - EXHAUSTIVE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRE DE EVENTOS Y PAYLOADS DISCRIMINADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED SUM TYPES: Los payloads libres del protocolo legado se
 *    remodelan como sumas etiquetadas por categoría; la decodificación
 *    es exhaustiva y el tipo desconocido es deriva de contrato.
 * 2. CAMELCASE WIRE PARITY: El sobre JSON preserva el contrato exacto
 *    consumido por los silos TypeScript (CRM, HR, Operations).
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones.
 *
 * # Mathematical Proof (Discriminator Totality):
 * decode() es una función total sobre (event_type, event_data): todo
 * par produce o bien una variante tipada o bien un 'ContractDrift'
 * clasificado. No existe camino silencioso.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use typeshare::typeshare;

/// Sobre canónico de todo evento inter-aplicación.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterAppEnvelope {
    /// Identificador "inter_{unixMillis}_{random8}" forjado al publicar.
    pub event_id: String,
    /// Tipo punteado ("credit.allocated") o con subrayados
    /// ("credit_config_updated"); discriminador del payload.
    pub event_type: String,
    pub source_application: String,
    pub target_application: String,
    pub tenant_id: String,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_data: Value,
    /// Operador originante o "system".
    pub published_by: String,
}

/// Estado de procesamiento reportado por un consumidor.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgmentStatus {
    Processed,
    Failed,
}

/// Registro espejo publicado en el canal de acuses por cada evento
/// procesado, con clave de ruteo "acks.{sourceApplication}".
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgmentRecord {
    pub original_event_id: String,
    pub status: AcknowledgmentStatus,
    pub processed_at: DateTime<Utc>,
    /// Resultado del manejador en éxito, o detalle del fallo.
    pub result: Value,
}

/// Deriva de contrato: el payload no honra el esquema publicado.
#[derive(Debug, Error)]
pub enum ContractDrift {
    #[error("[L2_CONTRACT_FAULT]: UNKNOWN_EVENT_TYPE -> {0}")]
    UnknownEventType(String),

    #[error("[L2_CONTRACT_FAULT]: MALFORMED_PAYLOAD for '{event_type}' -> {detail}")]
    MalformedPayload { event_type: String, detail: String },
}

// --- ESTRATO DE PAYLOADS TIPADOS POR CATEGORÍA ---

/// Payload de 'credit.allocated'.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditAllocatedData {
    pub allocation_id: String,
    pub amount: f64,
    #[serde(default)]
    pub credit_type: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub target_application: Option<String>,
}

/// Payload de 'credit.consumed'.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditConsumedData {
    pub operation_code: String,
    pub amount: f64,
    pub new_balance: f64,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// Payload de 'credit.expired'.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditExpiredData {
    pub allocation_id: String,
    pub unused_credits: f64,
    pub deducted_credits: f64,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

/// Payload de 'credit_config_updated'.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditConfigUpdatedData {
    pub operation_codes: Vec<String>,
    pub scope: String,
}

/// Payload de 'purchase.completed'.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCompletedData {
    pub purchase_id: String,
    pub credit_amount: f64,
    pub external_session_id: String,
}

/// Payload genérico de las familias de directorio (role.*, user.*,
/// org.*, org_assignment.*): sujeto, acción y atributos abiertos.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEventData {
    pub subject_id: String,
    pub action: String,
    #[serde(default)]
    pub attributes: Value,
}

/// Suma discriminada de todo evento emitido o consumido por el núcleo.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    CreditAllocated(CreditAllocatedData),
    CreditConsumed(CreditConsumedData),
    CreditExpired(CreditExpiredData),
    CreditConfigUpdated(CreditConfigUpdatedData),
    PurchaseCompleted(PurchaseCompletedData),
    Role(DirectoryEventData),
    User(DirectoryEventData),
    Org(DirectoryEventData),
    OrgAssignment(DirectoryEventData),
}

impl DomainEvent {
    /// Decodificación exhaustiva del payload según el discriminador.
    ///
    /// # Errors:
    /// 'ContractDrift' ante tipo desconocido o campos faltantes.
    pub fn decode(event_type: &str, event_data: Value) -> Result<Self, ContractDrift> {
        let malformed = |detail: serde_json::Error| ContractDrift::MalformedPayload {
            event_type: event_type.to_string(),
            detail: detail.to_string(),
        };

        match event_type {
            "credit.allocated" => serde_json::from_value(event_data)
                .map(DomainEvent::CreditAllocated)
                .map_err(malformed),
            "credit.consumed" => serde_json::from_value(event_data)
                .map(DomainEvent::CreditConsumed)
                .map_err(malformed),
            "credit.expired" => serde_json::from_value(event_data)
                .map(DomainEvent::CreditExpired)
                .map_err(malformed),
            "credit_config_updated" => serde_json::from_value(event_data)
                .map(DomainEvent::CreditConfigUpdated)
                .map_err(malformed),
            "purchase.completed" => serde_json::from_value(event_data)
                .map(DomainEvent::PurchaseCompleted)
                .map_err(malformed),
            other if other.starts_with("role.") => serde_json::from_value(event_data)
                .map(DomainEvent::Role)
                .map_err(malformed),
            other if other.starts_with("user.") => serde_json::from_value(event_data)
                .map(DomainEvent::User)
                .map_err(malformed),
            other if other.starts_with("org_assignment.") => serde_json::from_value(event_data)
                .map(DomainEvent::OrgAssignment)
                .map_err(malformed),
            other if other.starts_with("org.") => serde_json::from_value(event_data)
                .map(DomainEvent::Org)
                .map_err(malformed),
            unknown => Err(ContractDrift::UnknownEventType(unknown.to_string())),
        }
    }
}

impl InterAppEnvelope {
    /// Decodifica el payload transportado contra el discriminador del
    /// sobre.
    pub fn decode_payload(&self) -> Result<DomainEvent, ContractDrift> {
        DomainEvent::decode(&self.event_type, self.event_data.clone())
    }
}
