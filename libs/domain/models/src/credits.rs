// [libs/domain/models/src/credits.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER CONTRACTS (V3.1 - CHAIN CERTIFIED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DEL BALANCE Y DEL LEDGER APPEND-ONLY
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CHAIN INTEGRITY: Cada fila del Ledger transporta la tripleta
 *    (previous, amount, new); la cadena por (tenant, entity) es
 *    verificable sin acceso al balance.
 * 2. OUTCOME SEMANTICS: Los rechazos de negocio (InsufficientCredits,
 *    InvalidAmount) son valores de resultado, nunca errores tipados.
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones.
 *
 * # Mathematical Proof (Balance/Ledger Coupling):
 * Para toda fila comprometida L: L.new_balance = L.previous_balance +
 * L.amount, y coincide con 'available_credits' del balance en el
 * instante posterior al commit. La mutación y el asiento comparten una
 * única unidad transaccional.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Precisión decimal del Ledger. Seis posiciones absorben los costos
/// fraccionales de tarifas por volumen sin deriva binaria observable.
const CREDIT_DECIMAL_SCALE: f64 = 1_000_000.0;

/// Normaliza una magnitud de créditos a la escala canónica del Ledger.
/// Toda frontera de mutación redondea antes de comparar o persistir.
pub fn round_credits(raw_magnitude: f64) -> f64 {
    (raw_magnitude * CREDIT_DECIMAL_SCALE).round() / CREDIT_DECIMAL_SCALE
}

/// Clasificación semántica de los asientos del Ledger.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Consumption,
    Expiry,
    Allocation,
    TransferIn,
    TransferOut,
    Adjustment,
}

impl TransactionKind {
    /// Etiqueta persistida en la columna 'transaction_type'.
    pub fn as_code(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Consumption => "consumption",
            TransactionKind::Expiry => "expiry",
            TransactionKind::Allocation => "allocation",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    /// Reconstruye la clasificación desde la etiqueta persistida.
    pub fn from_code(persisted_code: &str) -> Option<Self> {
        match persisted_code {
            "purchase" => Some(TransactionKind::Purchase),
            "consumption" => Some(TransactionKind::Consumption),
            "expiry" => Some(TransactionKind::Expiry),
            "allocation" => Some(TransactionKind::Allocation),
            "transfer_in" => Some(TransactionKind::TransferIn),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "adjustment" => Some(TransactionKind::Adjustment),
            _ => None,
        }
    }
}

/// Fila de balance por (inquilino, entidad). Creada perezosamente en la
/// primera mutación.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalance {
    pub credit_identifier: Uuid,
    pub tenant_identifier: Uuid,
    pub entity_identifier: Uuid,
    /// Invariante CB-1: jamás negativo.
    pub available_credits: f64,
    pub reserved_credits: f64,
    pub is_active: bool,
    pub last_updated_at: DateTime<Utc>,
}

/// Asiento inmutable del Ledger append-only.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub transaction_identifier: Uuid,
    pub tenant_identifier: Uuid,
    pub entity_identifier: Uuid,
    pub transaction_kind: TransactionKind,
    /// Magnitud con signo: positiva acredita, negativa debita.
    pub amount: f64,
    pub previous_balance: f64,
    pub new_balance: f64,
    /// Código punteado de la operación tarificada, o ancla semántica
    /// ("purchase:{session}", "credit_expiry:{app}:{allocation}").
    pub operation_code: Option<String>,
    pub initiated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Recibo de una mutación comprometida del Ledger.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub transaction_identifier: Uuid,
    pub previous_balance: f64,
    pub new_balance: f64,
    /// Verdadero cuando la llave de idempotencia recuperó un asiento
    /// previo en lugar de escribir uno nuevo.
    pub replayed: bool,
}

/// Rechazos de negocio del motor de Ledger. Resultados esperados del
/// dominio: se devuelven al llamador sin registro de error.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "refusal", rename_all = "snake_case")]
pub enum LedgerRefusal {
    /// El balance disponible no cubre la magnitud solicitada.
    InsufficientCredits { available: f64, required: f64 },
    /// Magnitud no positiva en un verbo que la exige.
    InvalidAmount { amount: f64 },
    /// El excedente sobre la franquicia gratuita no está autorizado
    /// por la configuración de la operación.
    OverageNotPermitted { allowance_remaining: f64, requested: f64 },
}

impl LedgerRefusal {
    /// Razón estable expuesta en los resultados del Orquestador.
    pub fn reason_label(&self) -> &'static str {
        match self {
            LedgerRefusal::InsufficientCredits { .. } => "InsufficientCredits",
            LedgerRefusal::InvalidAmount { .. } => "InvalidAmount",
            LedgerRefusal::OverageNotPermitted { .. } => "OverageNotPermitted",
        }
    }
}
