// [libs/domain/models/src/config.rs]
/*!
 * =================================================================
 * APARATO: OPERATION CONFIG CONTRACTS (V2.1 - INHERITANCE READY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE TARIFICACIÓN POR CÓDIGO DE OPERACIÓN
 *
 * # Mathematical Proof (Resolution Totality):
 * La resolución de configuración es total: ante ausencia de filas en
 * los tres ámbitos (entidad, inquilino, global) el resolutor produce
 * el defecto incorporado con 'source = default'. Ningún código de
 * operación carece de precio efectivo.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;
use uuid::Uuid;

/// Periodo de reinicio de la franquicia gratuita.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllowancePeriod {
    Day,
    Week,
    Month,
    Year,
}

impl AllowancePeriod {
    pub fn as_code(&self) -> &'static str {
        match self {
            AllowancePeriod::Day => "day",
            AllowancePeriod::Week => "week",
            AllowancePeriod::Month => "month",
            AllowancePeriod::Year => "year",
        }
    }

    pub fn from_code(persisted_code: &str) -> Option<Self> {
        match persisted_code {
            "day" => Some(AllowancePeriod::Day),
            "week" => Some(AllowancePeriod::Week),
            "month" => Some(AllowancePeriod::Month),
            "year" => Some(AllowancePeriod::Year),
            _ => None,
        }
    }
}

/// Escalón de tarifa por volumen. El escalón con el mayor umbral que no
/// supere el uso del mes corriente sobreescribe el costo base.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeTier {
    pub threshold: f64,
    pub cost: f64,
}

/// Fila persistida de configuración de una operación.
///
/// Unicidad OC-1: (operation_code, tenant) para filas no globales;
/// (operation_code) para la fila global, que carece de inquilino.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationConfigRecord {
    pub config_identifier: Uuid,
    /// Código punteado "app.module.op".
    pub operation_code: String,
    pub tenant_identifier: Option<Uuid>,
    /// Ámbito de entidad opcional, más específico que el de inquilino.
    pub entity_identifier: Option<Uuid>,
    pub is_global: bool,
    pub credit_cost: f64,
    pub unit: String,
    pub unit_multiplier: f64,
    pub free_allowance: i64,
    pub free_allowance_period: AllowancePeriod,
    pub volume_tiers: Vec<VolumeTier>,
    pub allow_overage: bool,
    pub overage_limit: Option<f64>,
    /// Costo unitario del excedente; multiplicador único configurable.
    pub overage_cost: Option<f64>,
    pub is_active: bool,
    pub priority: i64,
}

/// Origen del cual emergió la configuración efectiva.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Entity,
    Tenant,
    Global,
    Default,
}

impl ConfigSource {
    pub fn as_code(&self) -> &'static str {
        match self {
            ConfigSource::Entity => "entity",
            ConfigSource::Tenant => "tenant",
            ConfigSource::Global => "global",
            ConfigSource::Default => "default",
        }
    }
}

/// Configuración efectiva tras aplicar la herencia de ámbitos.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub operation_code: String,
    pub credit_cost: f64,
    pub unit: String,
    pub unit_multiplier: f64,
    pub free_allowance: i64,
    pub free_allowance_period: AllowancePeriod,
    pub volume_tiers: Vec<VolumeTier>,
    pub allow_overage: bool,
    pub overage_limit: Option<f64>,
    pub overage_cost: Option<f64>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// Defecto incorporado: costo 1.0 por operación, sin franquicia.
    pub fn built_in_default(operation_code: &str) -> Self {
        Self {
            operation_code: operation_code.to_string(),
            credit_cost: 1.0,
            unit: "operation".to_string(),
            unit_multiplier: 1.0,
            free_allowance: 0,
            free_allowance_period: AllowancePeriod::Month,
            volume_tiers: Vec::new(),
            allow_overage: true,
            overage_limit: None,
            overage_cost: None,
            source: ConfigSource::Default,
        }
    }

    /// Proyección de una fila persistida hacia el contrato efectivo.
    pub fn from_record(record: &OperationConfigRecord, source: ConfigSource) -> Self {
        Self {
            operation_code: record.operation_code.clone(),
            credit_cost: record.credit_cost,
            unit: record.unit.clone(),
            unit_multiplier: record.unit_multiplier,
            free_allowance: record.free_allowance,
            free_allowance_period: record.free_allowance_period,
            volume_tiers: record.volume_tiers.clone(),
            allow_overage: record.allow_overage,
            overage_limit: record.overage_limit,
            overage_cost: record.overage_cost,
            source,
        }
    }
}
