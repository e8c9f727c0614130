// [libs/domain/pricing/src/resolution.rs]
/*!
 * =================================================================
 * APARATO: CONFIG RESOLUTION ENGINE (V2.2 - INHERITANCE SEALED)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: HERENCIA DE ÁMBITOS ENTIDAD -> INQUILINO -> GLOBAL
 *
 * # Mathematical Proof (First-Match Determinism):
 * La precedencia es una cadena estricta: gana la primera fila activa
 * en el orden entidad, inquilino, global; el residuo es el defecto
 * incorporado. La ausencia de configuración jamás es un fallo.
 * =================================================================
 */

use meridian_domain_models::config::{ConfigSource, OperationConfigRecord, ResolvedConfig};
use tracing::debug;

/// Filas candidatas recuperadas por el repositorio para un código,
/// una por ámbito. El repositorio ya filtra por inquilino y entidad;
/// el motor aplica la precedencia y el filtro de actividad.
#[derive(Debug, Default)]
pub struct ScopeCandidates {
    pub entity_scoped: Option<OperationConfigRecord>,
    pub tenant_scoped: Option<OperationConfigRecord>,
    pub global: Option<OperationConfigRecord>,
}

/// Resuelve la configuración efectiva de una operación.
///
/// Orden de precedencia (gana la primera coincidencia activa):
/// 1. Fila de ámbito de entidad.
/// 2. Fila de ámbito de inquilino (no global).
/// 3. Fila global.
/// 4. Defecto incorporado con 'source = default'.
pub fn resolve_effective_config(
    operation_code: &str,
    candidates: ScopeCandidates,
) -> ResolvedConfig {
    let active = |record: Option<OperationConfigRecord>| record.filter(|row| row.is_active);

    if let Some(entity_row) = active(candidates.entity_scoped) {
        debug!("🎯 [CONFIG_RESOLVER]: Entity-scoped tariff wins for [{}].", operation_code);
        return ResolvedConfig::from_record(&entity_row, ConfigSource::Entity);
    }

    if let Some(tenant_row) = active(candidates.tenant_scoped) {
        debug!("🎯 [CONFIG_RESOLVER]: Tenant-scoped tariff wins for [{}].", operation_code);
        return ResolvedConfig::from_record(&tenant_row, ConfigSource::Tenant);
    }

    if let Some(global_row) = active(candidates.global) {
        debug!("🎯 [CONFIG_RESOLVER]: Global tariff wins for [{}].", operation_code);
        return ResolvedConfig::from_record(&global_row, ConfigSource::Global);
    }

    debug!("🎯 [CONFIG_RESOLVER]: Built-in default applied for [{}].", operation_code);
    ResolvedConfig::built_in_default(operation_code)
}
