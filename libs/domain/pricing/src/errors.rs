// [libs/domain/pricing/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PRICING ERROR CATALOG (V1.2 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE TARIFICACIÓN
 * =================================================================
 */

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// El código no honra la gramática "app.module.op" de tres
    /// segmentos minúsculos alfanuméricos con subrayado.
    #[error("[L2_PRICING_FAULT]: INVALID_OPERATION_CODE '{code}' -> {detail}")]
    InvalidOperationCode { code: String, detail: String },

    /// El módulo no registra permisos expandibles.
    #[error("[L2_PRICING_FAULT]: EMPTY_MODULE_EXPANSION '{application_code}.{module_code}'")]
    EmptyModuleExpansion { application_code: String, module_code: String },
}
