// [libs/domain/models/src/entity.rs]
/*!
 * =================================================================
 * APARATO: ORGANIZATIONAL ENTITY MODELS (V2.2 - FOREST ALIGNED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE INQUILINOS Y ÁRBOL ORGANIZACIONAL
 *
 * # Mathematical Proof (Primary Root Determinism):
 * La selección de la raíz primaria es una función total y determinista
 * sobre el bosque de entidades: bandera de membresía primaria, luego
 * bandera 'is_default', luego el 'created_at' más antiguo. Dos
 * evaluaciones sobre el mismo bosque producen la misma raíz.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Estado operativo del inquilino raíz.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// Raíz de la partición de aislamiento. Todo dato del núcleo cuelga de
/// exactamente un inquilino.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_identifier: Uuid,
    pub tenant_name: String,
    pub status: TenantStatus,
}

/// Clasificación jerárquica de la entidad organizacional.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Branch,
    Department,
}

/// Nodo del bosque organizacional; la unidad portadora de balance.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessEntity {
    pub entity_identifier: Uuid,
    pub tenant_identifier: Uuid,
    pub entity_kind: EntityKind,
    /// `None` marca una raíz del bosque (a lo sumo una por inquilino).
    pub parent_entity_identifier: Option<Uuid>,
    pub entity_name: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Candidato a raíz primaria, enriquecido con la bandera de membresía
/// del operador que origina la resolución.
#[derive(Debug, Clone)]
pub struct PrimaryRootCandidate {
    pub entity: BusinessEntity,
    /// Bandera 'isPrimary' de la membresía del operador sobre la entidad.
    pub is_primary_membership: bool,
}

/// Resuelve la raíz primaria de un inquilino sobre sus candidatas.
///
/// Orden de precedencia (gana la primera condición verdadera):
/// 1. Membresía marcada como primaria.
/// 2. Entidad con `is_default = true`.
/// 3. Entidad con el `created_at` más antiguo.
pub fn select_primary_root(candidates: &[PrimaryRootCandidate]) -> Option<&BusinessEntity> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(primary) = candidates.iter().find(|candidate| candidate.is_primary_membership) {
        return Some(&primary.entity);
    }

    if let Some(default_root) = candidates.iter().find(|candidate| candidate.entity.is_default) {
        return Some(&default_root.entity);
    }

    candidates
        .iter()
        .min_by_key(|candidate| candidate.entity.created_at)
        .map(|candidate| &candidate.entity)
}
