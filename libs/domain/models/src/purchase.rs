// [libs/domain/models/src/purchase.rs]
/*!
 * =================================================================
 * APARATO: CREDIT PURCHASE CONTRACTS (V2.0 - WEBHOOK HARDENED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CICLO DE VIDA DE COMPRAS DE CRÉDITOS PREPAGADOS
 *
 * # Mathematical Proof (Idempotent Completion):
 * La transición a 'completed' ocurre exactamente una vez por
 * 'external_session_identifier': el asiento 'purchase' del Ledger usa
 * la sesión como llave de idempotencia, de modo que la re-entrega del
 * webhook recupera el recibo previo sin doble acreditación (CP-1).
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Estado del ciclo de vida de una compra.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Refunded => "refunded",
        }
    }

    pub fn from_code(persisted_code: &str) -> Option<Self> {
        match persisted_code {
            "pending" => Some(PurchaseStatus::Pending),
            "completed" => Some(PurchaseStatus::Completed),
            "failed" => Some(PurchaseStatus::Failed),
            "refunded" => Some(PurchaseStatus::Refunded),
            _ => None,
        }
    }
}

/// Compra de créditos prepagados. Nace 'pending' y se finaliza cuando
/// la pasarela externa emite la señal autoritativa de pago.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPurchase {
    pub purchase_identifier: Uuid,
    pub tenant_identifier: Uuid,
    pub entity_identifier: Uuid,
    pub credit_amount: f64,
    /// Precio unitario en la divisa de la pasarela. Parámetro de
    /// configuración: el núcleo no impone un valor por defecto.
    pub unit_price: f64,
    pub total_amount: f64,
    /// Método declarado por el llamador ("stripe", "manual", ...).
    pub payment_method: String,
    pub status: PurchaseStatus,
    /// Sesión de checkout de la pasarela externa; llave de idempotencia
    /// de la finalización.
    pub external_session_identifier: Option<String>,
    pub requested_by: Option<Uuid>,
    /// Sello de la señal autoritativa de pago.
    pub paid_at: Option<DateTime<Utc>>,
    /// Sello del asiento 'purchase' correspondiente en el Ledger.
    pub credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
