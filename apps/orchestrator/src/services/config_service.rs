// [apps/orchestrator/src/services/config_service.rs]
/*!
 * =================================================================
 * APARATO: TARIFF ADMINISTRATION SERVICE (V1.2 - BROADCAST COUPLED)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: VERBOS ADMINISTRATIVOS DE TARIFAS Y REGISTRO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WRITE + ANNOUNCE: Toda escritura de configuración exitosa emite
 *    'credit_config_updated' por el exchange fanout; los silos
 *    invalidan sus cachés de tarifas con ese pulso.
 * 2. MODULE EXPANSION LIVE: La tarificación masiva compone el
 *    catálogo de permisos del registro con la expansión del dominio
 *    y el upsert por ámbito, en un solo verbo.
 * 3. ADMINISTRATIVE GUARD: Los verbos exigen contexto administrativo;
 *    el rechazo es un resultado de negocio, jamás una excepción.
 *
 * # Mathematical Proof (Announce-After-Commit):
 * La difusión ocurre estrictamente después del commit del upsert: un
 * colapso del broker deja las tarifas consistentes y el silencio se
 * resuelve en la siguiente resolución (el resolutor lee filas, no
 * cachés del núcleo).
 * =================================================================
 */

use crate::services::credit_service::ServiceError;
use crate::state::AppState;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::events::CreditConfigUpdatedData;
use meridian_domain_pricing::{is_valid_code_segment, ConfigTemplate, OperationCode};
use meridian_infra_store::repositories::ConfigScope;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

/// Resultado de negocio de un verbo administrativo de tarifas.
#[derive(Debug, Clone, Serialize)]
pub struct TariffOutcome {
    pub success: bool,
    pub reason: Option<String>,
    /// Códigos de operación afectados por la escritura.
    pub operation_codes: Vec<String>,
    /// Identificador del pulso 'credit_config_updated' emitido.
    pub event_identifier: Option<String>,
}

impl TariffOutcome {
    fn applied(operation_codes: Vec<String>, event_identifier: Option<String>) -> Self {
        Self { success: true, reason: None, operation_codes, event_identifier }
    }

    fn failed(reason: &str) -> Self {
        Self {
            success: false,
            reason: Some(reason.to_string()),
            operation_codes: Vec::new(),
            event_identifier: None,
        }
    }
}

fn scope_label(scope: &ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Entity { .. } => "entity",
        ConfigScope::Tenant { .. } => "tenant",
        ConfigScope::Global => "global",
    }
}

pub struct TariffAdministrationService {
    state: AppState,
}

impl TariffAdministrationService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Guardia común: los verbos de tarifas son de mando.
    fn refuse_non_administrative(context: &TenantContext) -> Option<TariffOutcome> {
        if context.is_administrative {
            None
        } else {
            Some(TariffOutcome::failed("AdministrativeContextRequired"))
        }
    }

    // --- ESTRATO DE REGISTRO (CATÁLOGO DE SILOS Y MÓDULOS) ---

    /// Registra o reactiva un silo de aplicación en el catálogo.
    #[instrument(skip(self, context))]
    pub async fn register_application(
        &self,
        context: &TenantContext,
        application_code: &str,
        status: &str,
    ) -> Result<TariffOutcome, ServiceError> {
        if let Some(refusal) = Self::refuse_non_administrative(context) {
            return Ok(refusal);
        }
        if !is_valid_code_segment(application_code) {
            return Ok(TariffOutcome::failed("InvalidApplicationCode"));
        }

        self.state
            .registry_repository
            .register_application(context, application_code, status)
            .await?;

        info!("🏛️  [TARIFF_ADMIN]: Application silo [{}] registered.", application_code);
        Ok(TariffOutcome::applied(Vec::new(), None))
    }

    /// Registra un módulo con su lista de permisos expandibles.
    #[instrument(skip(self, context, permission_codes))]
    pub async fn register_module(
        &self,
        context: &TenantContext,
        application_code: &str,
        module_code: &str,
        permission_codes: &[String],
    ) -> Result<TariffOutcome, ServiceError> {
        if let Some(refusal) = Self::refuse_non_administrative(context) {
            return Ok(refusal);
        }
        if !is_valid_code_segment(module_code)
            || !permission_codes.iter().all(|permission| is_valid_code_segment(permission))
        {
            return Ok(TariffOutcome::failed("InvalidModuleGrammar"));
        }
        if self
            .state
            .registry_repository
            .application_status(application_code)
            .await?
            .is_none()
        {
            return Ok(TariffOutcome::failed("ApplicationNotRegistered"));
        }

        self.state
            .registry_repository
            .register_module(context, application_code, module_code, permission_codes)
            .await?;

        info!(
            "🏛️  [TARIFF_ADMIN]: Module [{}.{}] registered with {} permissions.",
            application_code,
            module_code,
            permission_codes.len()
        );
        Ok(TariffOutcome::applied(Vec::new(), None))
    }

    // --- ESTRATO DE ESCRITURA DE TARIFAS ---

    /// Escribe o actualiza la tarifa de una operación en un ámbito y
    /// difunde el pulso de invalidación.
    #[instrument(skip(self, context, template))]
    pub async fn set_operation_tariff(
        &self,
        context: &TenantContext,
        operation_code: &str,
        scope: ConfigScope,
        template: &ConfigTemplate,
    ) -> Result<TariffOutcome, ServiceError> {
        if let Some(refusal) = Self::refuse_non_administrative(context) {
            return Ok(refusal);
        }
        if OperationCode::parse(operation_code).is_err() {
            return Ok(TariffOutcome::failed("InvalidOperationCode"));
        }

        self.state
            .config_repository
            .upsert_config(context, operation_code, scope.clone(), template)
            .await?;

        let affected_codes = vec![operation_code.to_string()];
        let event_identifier =
            self.announce_config_updated(context, &scope, &affected_codes).await;

        Ok(TariffOutcome::applied(affected_codes, event_identifier))
    }

    /// Tarificación masiva: expande los permisos registrados del
    /// módulo, aplica la plantilla a cada código en una sola unidad y
    /// difunde el conjunto completo.
    #[instrument(skip(self, context, template))]
    pub async fn apply_module_tariff(
        &self,
        context: &TenantContext,
        application_code: &str,
        module_code: &str,
        scope: ConfigScope,
        template: &ConfigTemplate,
    ) -> Result<TariffOutcome, ServiceError> {
        if let Some(refusal) = Self::refuse_non_administrative(context) {
            return Ok(refusal);
        }
        if self
            .state
            .registry_repository
            .application_status(application_code)
            .await?
            .is_none()
        {
            return Ok(TariffOutcome::failed("ApplicationNotRegistered"));
        }

        let permission_codes = self
            .state
            .registry_repository
            .module_permissions(application_code, module_code)
            .await?;
        if permission_codes.is_empty() {
            return Ok(TariffOutcome::failed("EmptyModuleExpansion"));
        }

        let configured_codes = self
            .state
            .config_repository
            .apply_template_to_module(
                context,
                application_code,
                module_code,
                &permission_codes,
                scope.clone(),
                template,
            )
            .await?;

        let event_identifier =
            self.announce_config_updated(context, &scope, &configured_codes).await;

        info!(
            "🧾 [TARIFF_ADMIN]: Module [{}.{}] bulk-tariffed ({} operations).",
            application_code,
            module_code,
            configured_codes.len()
        );
        Ok(TariffOutcome::applied(configured_codes, event_identifier))
    }

    /// Desactiva la fila del ámbito (la resolución degrada al ámbito
    /// siguiente) y difunde el pulso de invalidación.
    #[instrument(skip(self, context))]
    pub async fn retire_operation_tariff(
        &self,
        context: &TenantContext,
        operation_code: &str,
        scope: ConfigScope,
    ) -> Result<TariffOutcome, ServiceError> {
        if let Some(refusal) = Self::refuse_non_administrative(context) {
            return Ok(refusal);
        }
        if OperationCode::parse(operation_code).is_err() {
            return Ok(TariffOutcome::failed("InvalidOperationCode"));
        }

        self.state
            .config_repository
            .deactivate_config(context, operation_code, scope.clone())
            .await?;

        let affected_codes = vec![operation_code.to_string()];
        let event_identifier =
            self.announce_config_updated(context, &scope, &affected_codes).await;

        Ok(TariffOutcome::applied(affected_codes, event_identifier))
    }

    // --- ESTRATO DE DIFUSIÓN (INVALIDACIÓN DE CACHÉS DE SILO) ---

    /// Pulso 'credit_config_updated' por el exchange fanout, emitido
    /// estrictamente después del commit. Un colapso del broker queda
    /// en el rastro forense y jamás alcanza al llamador de negocio.
    async fn announce_config_updated(
        &self,
        context: &TenantContext,
        scope: &ConfigScope,
        operation_codes: &[String],
    ) -> Option<String> {
        let announcement = CreditConfigUpdatedData {
            operation_codes: operation_codes.to_vec(),
            scope: scope_label(scope).to_string(),
        };
        let event_data = serde_json::to_value(&announcement).unwrap_or(Value::Null);

        let tenant_label = context
            .tenant_identifier
            .map(|identifier| identifier.to_string())
            .unwrap_or_default();
        let entity_label = match scope {
            ConfigScope::Entity { entity_identifier, .. } => entity_identifier.to_string(),
            ConfigScope::Tenant { tenant_identifier } => tenant_identifier.to_string(),
            ConfigScope::Global => "platform".to_string(),
        };

        match self
            .state
            .publisher
            .publish_broadcast(
                "credit_config_updated",
                &tenant_label,
                &entity_label,
                event_data,
                &context.actor_label(),
            )
            .await
        {
            Ok(receipt) => Some(receipt.event_identifier),
            Err(transport_fault) => {
                error!(
                    failure_class = %transport_fault.failure_class(),
                    scope = scope_label(scope),
                    "📡 [TARIFF_ADMIN]: credit_config_updated broadcast collapsed."
                );
                None
            }
        }
    }
}
