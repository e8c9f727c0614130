// [libs/infra/store/src/repositories/configs.rs]
/*!
 * =================================================================
 * APARATO: OPERATION CONFIG REPOSITORY (V3.4 - SCOPE AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DE TARIFAS POR ÁMBITO Y EXPANSIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SCOPE CANDIDATES: Recupera a lo sumo una fila por ámbito
 *    (entidad, inquilino, global); la precedencia vive en el motor
 *    de resolución del dominio, nunca en SQL.
 * 2. OC-1 UPSERT: La escritura respeta los índices únicos parciales;
 *    actualiza la fila del ámbito o la crea si no existe.
 * 3. BULK TEMPLATE: La tarificación masiva de un módulo aplica la
 *    plantilla a cada código expandido dentro de una sola unidad.
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::rows::{
    nullable_real, nullable_text, optional_identifier, optional_real, parse_identifier,
    required_flag, required_integer, required_real, required_text,
};
use crate::unit::UnitOfWork;
use chrono::Utc;
use libsql::{params, Row};
use meridian_domain_models::config::{AllowancePeriod, OperationConfigRecord, VolumeTier};
use meridian_domain_models::context::TenantContext;
use meridian_domain_pricing::{expand_module_operations, ConfigTemplate, ScopeCandidates};
use tracing::{info, instrument};
use uuid::Uuid;

const CONFIG_PROJECTION: &str = r#"
    SELECT config_id, operation_code, tenant_id, entity_id, is_global,
           credit_cost, unit, unit_multiplier, free_allowance,
           free_allowance_period, volume_tiers, allow_overage,
           overage_limit, overage_cost, is_active, priority
    FROM credit_configurations
"#;

/// Plantilla común de actualización de campos de tarifa; el predicado
/// de ámbito se concatena con placeholders ?12 en adelante.
const UPDATE_TARIFF_FIELDS: &str = r#"
    UPDATE credit_configurations
    SET credit_cost = ?1, unit = ?2, unit_multiplier = ?3,
        free_allowance = ?4, free_allowance_period = ?5,
        volume_tiers = ?6, allow_overage = ?7, overage_limit = ?8,
        overage_cost = ?9, is_active = 1, priority = ?10, updated_at = ?11
"#;

const INSERT_CONFIG_ROW: &str = r#"
    INSERT INTO credit_configurations (
        config_id, operation_code, tenant_id, entity_id, is_global,
        credit_cost, unit, unit_multiplier, free_allowance,
        free_allowance_period, volume_tiers, allow_overage,
        overage_limit, overage_cost, is_active, priority, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1, ?15, ?16)
"#;

/// Ámbito de escritura de una fila de configuración.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Entity { tenant_identifier: Uuid, entity_identifier: Uuid },
    Tenant { tenant_identifier: Uuid },
    Global,
}

pub struct ConfigRepository {
    store_client: CreditStoreClient,
}

impl ConfigRepository {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    /// Recupera las filas candidatas por ámbito para la resolución.
    #[instrument(skip(self, context))]
    pub async fn fetch_scope_candidates(
        &self,
        context: &TenantContext,
        operation_code: &str,
        entity_identifier: Option<Uuid>,
    ) -> Result<ScopeCandidates, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let entity_scoped = match entity_identifier {
            Some(entity) => {
                let sql_statement = format!(
                    "{} WHERE operation_code = ?1 AND tenant_id = ?2 AND entity_id = ?3",
                    CONFIG_PROJECTION
                );
                let mut query_results = connection
                    .query(
                        &sql_statement,
                        params![
                            operation_code.to_string(),
                            tenant_identifier.to_string(),
                            entity.to_string()
                        ],
                    )
                    .await?;
                match query_results.next().await? {
                    Some(data_row) => Some(map_config_row(&data_row)?),
                    None => None,
                }
            }
            None => None,
        };

        let tenant_scoped = {
            let sql_statement = format!(
                "{} WHERE operation_code = ?1 AND tenant_id = ?2 AND is_global = 0 AND entity_id IS NULL",
                CONFIG_PROJECTION
            );
            let mut query_results = connection
                .query(
                    &sql_statement,
                    params![operation_code.to_string(), tenant_identifier.to_string()],
                )
                .await?;
            match query_results.next().await? {
                Some(data_row) => Some(map_config_row(&data_row)?),
                None => None,
            }
        };

        let global = {
            let sql_statement =
                format!("{} WHERE operation_code = ?1 AND is_global = 1", CONFIG_PROJECTION);
            let mut query_results =
                connection.query(&sql_statement, params![operation_code.to_string()]).await?;
            match query_results.next().await? {
                Some(data_row) => Some(map_config_row(&data_row)?),
                None => None,
            }
        };

        Ok(ScopeCandidates { entity_scoped, tenant_scoped, global })
    }

    /// Escribe o actualiza la fila del ámbito indicado (OC-1).
    #[instrument(skip(self, context, template))]
    pub async fn upsert_config(
        &self,
        context: &TenantContext,
        operation_code: &str,
        scope: ConfigScope,
        template: &ConfigTemplate,
    ) -> Result<(), StoreError> {
        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;
        self.upsert_config_in_unit(&mut unit, operation_code, &scope, template).await?;
        unit.commit().await?;
        Ok(())
    }

    /// Aplica una plantilla a todos los códigos de un módulo en una
    /// sola unidad; devuelve los códigos tarificados.
    #[instrument(skip(self, context, permission_codes, template))]
    pub async fn apply_template_to_module(
        &self,
        context: &TenantContext,
        application_code: &str,
        module_code: &str,
        permission_codes: &[String],
        scope: ConfigScope,
        template: &ConfigTemplate,
    ) -> Result<Vec<String>, StoreError> {
        let expanded_codes =
            expand_module_operations(application_code, module_code, permission_codes).map_err(
                |expansion_fault| StoreError::MappingError(expansion_fault.to_string()),
            )?;

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;
        let mut configured_codes = Vec::with_capacity(expanded_codes.len());

        for operation_code in &expanded_codes {
            let code_label = operation_code.to_string();
            self.upsert_config_in_unit(&mut unit, &code_label, &scope, template).await?;
            configured_codes.push(code_label);
        }

        unit.commit().await?;

        info!(
            "🧾 [CONFIG]: Bulk tariff applied to {} operations of module [{}.{}].",
            configured_codes.len(),
            application_code,
            module_code
        );
        Ok(configured_codes)
    }

    /// Desactiva la fila del ámbito (la resolución degrada al ámbito
    /// siguiente de la cadena de herencia).
    pub async fn deactivate_config(
        &self,
        context: &TenantContext,
        operation_code: &str,
        scope: ConfigScope,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        let updated_at = Utc::now().to_rfc3339();

        match scope {
            ConfigScope::Entity { tenant_identifier, entity_identifier } => {
                unit.execute(
                    r#"UPDATE credit_configurations SET is_active = 0, updated_at = ?1
                       WHERE operation_code = ?2 AND tenant_id = ?3 AND entity_id = ?4"#,
                    params![
                        updated_at,
                        operation_code.to_string(),
                        tenant_identifier.to_string(),
                        entity_identifier.to_string()
                    ],
                )
                .await?;
            }
            ConfigScope::Tenant { tenant_identifier } => {
                unit.execute(
                    r#"UPDATE credit_configurations SET is_active = 0, updated_at = ?1
                       WHERE operation_code = ?2 AND tenant_id = ?3
                         AND is_global = 0 AND entity_id IS NULL"#,
                    params![
                        updated_at,
                        operation_code.to_string(),
                        tenant_identifier.to_string()
                    ],
                )
                .await?;
            }
            ConfigScope::Global => {
                unit.execute(
                    r#"UPDATE credit_configurations SET is_active = 0, updated_at = ?1
                       WHERE operation_code = ?2 AND is_global = 1"#,
                    params![updated_at, operation_code.to_string()],
                )
                .await?;
            }
        }

        unit.commit().await?;
        Ok(())
    }

    async fn upsert_config_in_unit(
        &self,
        unit: &mut UnitOfWork,
        operation_code: &str,
        scope: &ConfigScope,
        template: &ConfigTemplate,
    ) -> Result<(), StoreError> {
        let tiers_json = serde_json::to_string(&template.volume_tiers)
            .map_err(|encoding_fault| StoreError::MappingError(encoding_fault.to_string()))?;
        let updated_at = Utc::now().to_rfc3339();

        let updated_rows = match scope {
            ConfigScope::Entity { tenant_identifier, entity_identifier } => {
                let sql_statement = format!(
                    "{} WHERE operation_code = ?12 AND tenant_id = ?13 AND entity_id = ?14",
                    UPDATE_TARIFF_FIELDS
                );
                unit.execute(
                    &sql_statement,
                    params![
                        template.credit_cost,
                        template.unit.clone(),
                        template.unit_multiplier,
                        template.free_allowance,
                        template.free_allowance_period.as_code(),
                        tiers_json.clone(),
                        template.allow_overage as i64,
                        nullable_real(template.overage_limit),
                        nullable_real(template.overage_cost),
                        template.priority,
                        updated_at.clone(),
                        operation_code.to_string(),
                        tenant_identifier.to_string(),
                        entity_identifier.to_string()
                    ],
                )
                .await?
            }
            ConfigScope::Tenant { tenant_identifier } => {
                let sql_statement = format!(
                    "{} WHERE operation_code = ?12 AND tenant_id = ?13
                        AND is_global = 0 AND entity_id IS NULL",
                    UPDATE_TARIFF_FIELDS
                );
                unit.execute(
                    &sql_statement,
                    params![
                        template.credit_cost,
                        template.unit.clone(),
                        template.unit_multiplier,
                        template.free_allowance,
                        template.free_allowance_period.as_code(),
                        tiers_json.clone(),
                        template.allow_overage as i64,
                        nullable_real(template.overage_limit),
                        nullable_real(template.overage_cost),
                        template.priority,
                        updated_at.clone(),
                        operation_code.to_string(),
                        tenant_identifier.to_string()
                    ],
                )
                .await?
            }
            ConfigScope::Global => {
                let sql_statement = format!(
                    "{} WHERE operation_code = ?12 AND is_global = 1",
                    UPDATE_TARIFF_FIELDS
                );
                unit.execute(
                    &sql_statement,
                    params![
                        template.credit_cost,
                        template.unit.clone(),
                        template.unit_multiplier,
                        template.free_allowance,
                        template.free_allowance_period.as_code(),
                        tiers_json.clone(),
                        template.allow_overage as i64,
                        nullable_real(template.overage_limit),
                        nullable_real(template.overage_cost),
                        template.priority,
                        updated_at.clone(),
                        operation_code.to_string()
                    ],
                )
                .await?
            }
        };

        if updated_rows > 0 {
            return Ok(());
        }

        let (tenant_column, entity_column, is_global_flag) = match scope {
            ConfigScope::Entity { tenant_identifier, entity_identifier } => (
                Some(tenant_identifier.to_string()),
                Some(entity_identifier.to_string()),
                0_i64,
            ),
            ConfigScope::Tenant { tenant_identifier } => {
                (Some(tenant_identifier.to_string()), None, 0_i64)
            }
            ConfigScope::Global => (None, None, 1_i64),
        };

        unit.execute(
            INSERT_CONFIG_ROW,
            params![
                Uuid::new_v4().to_string(),
                operation_code.to_string(),
                nullable_text(tenant_column),
                nullable_text(entity_column),
                is_global_flag,
                template.credit_cost,
                template.unit.clone(),
                template.unit_multiplier,
                template.free_allowance,
                template.free_allowance_period.as_code(),
                tiers_json,
                template.allow_overage as i64,
                nullable_real(template.overage_limit),
                nullable_real(template.overage_cost),
                template.priority,
                updated_at
            ],
        )
        .await?;

        Ok(())
    }
}

/// Proyección fila -> registro de configuración del dominio.
pub(crate) fn map_config_row(data_row: &Row) -> Result<OperationConfigRecord, StoreError> {
    let period_code = required_text(data_row, 9)?;
    let free_allowance_period = AllowancePeriod::from_code(&period_code).ok_or_else(|| {
        StoreError::MappingError(format!("UNKNOWN_ALLOWANCE_PERIOD '{}'", period_code))
    })?;

    let tiers_json = required_text(data_row, 10)?;
    let volume_tiers: Vec<VolumeTier> = serde_json::from_str(&tiers_json)
        .map_err(|decoding_fault| StoreError::MappingError(decoding_fault.to_string()))?;

    Ok(OperationConfigRecord {
        config_identifier: parse_identifier(&required_text(data_row, 0)?)?,
        operation_code: required_text(data_row, 1)?,
        tenant_identifier: optional_identifier(data_row, 2)?,
        entity_identifier: optional_identifier(data_row, 3)?,
        is_global: required_flag(data_row, 4)?,
        credit_cost: required_real(data_row, 5)?,
        unit: required_text(data_row, 6)?,
        unit_multiplier: required_real(data_row, 7)?,
        free_allowance: required_integer(data_row, 8)?,
        free_allowance_period,
        volume_tiers,
        allow_overage: required_flag(data_row, 11)?,
        overage_limit: optional_real(data_row, 12)?,
        overage_cost: optional_real(data_row, 13)?,
        is_active: required_flag(data_row, 14)?,
        priority: required_integer(data_row, 15)?,
    })
}
