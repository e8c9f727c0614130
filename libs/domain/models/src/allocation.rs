// [libs/domain/models/src/allocation.rs]
/*!
 * =================================================================
 * APARATO: SEASONAL ALLOCATION CONTRACTS (V2.3 - EXPIRY ALIGNED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CUBETAS DE CRÉDITOS ACOTADAS EN EL TIEMPO
 *
 * # Mathematical Proof (Bucket Invariants):
 * SA-1: 0 ≤ used_credits ≤ allocated_credits en todo instante.
 * SA-2: is_expired ⇒ ¬is_active.
 * SA-3: en la transición a expirado, (allocated − used) se deduce del
 * balance de la entidad dentro de la misma unidad transaccional.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Naturaleza comercial de la cubeta de créditos.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalCreditKind {
    Seasonal,
    Bonus,
    Promotional,
    Event,
    Partnership,
    TrialExtension,
}

impl SeasonalCreditKind {
    pub fn as_code(&self) -> &'static str {
        match self {
            SeasonalCreditKind::Seasonal => "seasonal",
            SeasonalCreditKind::Bonus => "bonus",
            SeasonalCreditKind::Promotional => "promotional",
            SeasonalCreditKind::Event => "event",
            SeasonalCreditKind::Partnership => "partnership",
            SeasonalCreditKind::TrialExtension => "trial_extension",
        }
    }

    pub fn from_code(persisted_code: &str) -> Option<Self> {
        match persisted_code {
            "seasonal" => Some(SeasonalCreditKind::Seasonal),
            "bonus" => Some(SeasonalCreditKind::Bonus),
            "promotional" => Some(SeasonalCreditKind::Promotional),
            "event" => Some(SeasonalCreditKind::Event),
            "partnership" => Some(SeasonalCreditKind::Partnership),
            "trial_extension" => Some(SeasonalCreditKind::TrialExtension),
            _ => None,
        }
    }
}

/// Cubeta de créditos de campaña con expiración dura.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalAllocation {
    pub allocation_identifier: Uuid,
    pub tenant_identifier: Uuid,
    pub entity_identifier: Uuid,
    /// Silo de aplicación autorizado a consumir la cubeta. `None`
    /// habilita el consumo desde cualquier operación del inquilino.
    pub target_application: Option<String>,
    pub allocated_credits: f64,
    pub used_credits: f64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_expired: bool,
    pub credit_kind: SeasonalCreditKind,
    pub campaign_identifier: Option<String>,
    pub campaign_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SeasonalAllocation {
    /// Capacidad remanente de la cubeta.
    pub fn remaining_credits(&self) -> f64 {
        crate::credits::round_credits(self.allocated_credits - self.used_credits)
    }

    /// Determina si una operación identificada por su código punteado
    /// puede girar contra esta cubeta. Las cubetas con silo objetivo
    /// exigen que el código comience por ese silo.
    pub fn admits_operation(&self, operation_code: &str) -> bool {
        match &self.target_application {
            None => true,
            Some(application_code) => {
                operation_code.starts_with(&format!("{}.", application_code))
                    || operation_code == application_code
            }
        }
    }
}
