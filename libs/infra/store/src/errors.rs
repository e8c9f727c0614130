// [libs/infra/store/src/errors.rs]
/*!
 * =================================================================
 * APARATO: STORE ERROR CATALOG (V4.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAXONOMY BRIDGE: Cada fallo se proyecta sobre la taxonomía de
 *    nueve clases del plano de confiabilidad.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijos de estrato para el
 *    renderizado cromático del rastro forense.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use meridian_domain_models::reliability::FailureClass;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Error de enlace físico o de red con el motor de persistencia.
    #[error("[L3_STORE_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Configuración de entorno ausente o malformada (URL vacía,
    /// token remoto faltante, unidad sin inquilino).
    #[error("[L3_STORE_CONFIG_FAULT]: AUTH_CONFIGURATION_VOID -> {0}")]
    AuthConfiguration(String),

    /// Unidad de trabajo solicitada desde un contexto sin inquilino.
    #[error("[L3_STORE_CONFIG_FAULT]: UNIT_WITHOUT_TENANT_CONTEXT")]
    TenantContextMissing,

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_STORE_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio.
    #[error("[L3_STORE_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Colapso al comprometer una secuencia multi-tabla.
    #[error("[L3_STORE_FAULT]: TRANSACTION_COLLAPSE -> {0}")]
    TransactionCollapse(String),

    /// La unidad superó su presupuesto de vida (30 s nominales).
    #[error("[L3_STORE_FAULT]: UNIT_LIFETIME_EXCEEDED")]
    UnitLifetimeExceeded,

    // --- ESTRATO DE LOCALIZACIÓN (NOT FOUND) ---

    /// La entidad organizacional no existe o está inactiva.
    #[error("[L3_STORE_FAULT]: ENTITY_NOT_FOUND")]
    EntityNotFound,

    /// La cubeta estacional solicitada no existe.
    #[error("[L3_STORE_FAULT]: ALLOCATION_NOT_FOUND")]
    AllocationNotFound,

    /// La compra referida no existe en la partición del inquilino.
    #[error("[L3_STORE_FAULT]: PURCHASE_NOT_FOUND")]
    PurchaseNotFound,
}

impl StoreError {
    /// Proyección sobre la taxonomía cerrada del plano de
    /// confiabilidad.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            StoreError::AuthConfiguration(_) | StoreError::TenantContextMissing => {
                FailureClass::AuthConfigurationError
            }
            StoreError::MappingError(_) => FailureClass::ContractDrift,
            _ => FailureClass::Unknown,
        }
    }
}
