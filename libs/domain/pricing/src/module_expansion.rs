// [libs/domain/pricing/src/module_expansion.rs]
/*!
 * =================================================================
 * APARATO: MODULE EXPANSION ENGINE (V1.3 - BULK TARIFF)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: EXPANSIÓN DE MÓDULOS A CÓDIGOS DE OPERACIÓN
 *
 * # Mathematical Proof (Expansion Completeness):
 * Para un módulo con P permisos registrados, la expansión produce
 * exactamente P códigos "app.module.permission" validados, o un fallo
 * clasificado; ninguna combinación queda fuera de la tarificación
 * masiva.
 * =================================================================
 */

use crate::errors::PricingError;
use crate::operation_code::OperationCode;
use meridian_domain_models::config::{AllowancePeriod, VolumeTier};

/// Plantilla de configuración aplicada a cada código expandido de un
/// módulo durante la tarificación masiva.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    pub credit_cost: f64,
    pub unit: String,
    pub unit_multiplier: f64,
    pub free_allowance: i64,
    pub free_allowance_period: AllowancePeriod,
    pub volume_tiers: Vec<VolumeTier>,
    pub allow_overage: bool,
    pub overage_limit: Option<f64>,
    pub overage_cost: Option<f64>,
    pub priority: i64,
}

impl Default for ConfigTemplate {
    fn default() -> Self {
        Self {
            credit_cost: 1.0,
            unit: "operation".to_string(),
            unit_multiplier: 1.0,
            free_allowance: 0,
            free_allowance_period: AllowancePeriod::Month,
            volume_tiers: Vec::new(),
            allow_overage: true,
            overage_limit: None,
            overage_cost: None,
            priority: 0,
        }
    }
}

/// Expande los permisos registrados de un módulo al conjunto completo
/// de códigos de operación que le pertenecen.
///
/// # Errors:
/// - 'EmptyModuleExpansion' si el módulo no registra permisos.
/// - 'InvalidOperationCode' si algún permiso viola la gramática.
pub fn expand_module_operations(
    application_code: &str,
    module_code: &str,
    permission_codes: &[String],
) -> Result<Vec<OperationCode>, PricingError> {
    if permission_codes.is_empty() {
        return Err(PricingError::EmptyModuleExpansion {
            application_code: application_code.to_string(),
            module_code: module_code.to_string(),
        });
    }

    permission_codes
        .iter()
        .map(|permission_code| {
            OperationCode::from_segments(application_code, module_code, permission_code)
        })
        .collect()
}
