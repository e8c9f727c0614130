// [libs/domain/models/src/context.rs]
/*!
 * =================================================================
 * APARATO: TENANT CONTEXT CONTRACT (V2.0 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: PROPAGACIÓN EXPLÍCITA DE IDENTIDAD MULTI-TENANT
 *
 * # Mathematical Proof (Row-Level Isolation):
 * Todo acceso al Ledger viaja acompañado de este valor. El Storage
 * Gateway rechaza unidades de trabajo sin 'tenant_identifier',
 * garantizando que ninguna sentencia SQL se ejecute fuera de la
 * partición del inquilino.
 * =================================================================
 */

use uuid::Uuid;

/// Identidad de ejecución que acompaña cada llamada al núcleo.
///
/// Nunca se almacena en estado global del proceso: se construye en el
/// perímetro (middleware externo, daemon) y se transporta por valor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Partición de aislamiento. `None` únicamente en contextos de
    /// barrido administrativo de solo lectura.
    pub tenant_identifier: Option<Uuid>,
    /// Operador humano o de servicio que origina la llamada.
    pub user_identifier: Option<Uuid>,
    /// Autoriza lecturas cruzadas de inquilino (barridos del Scheduler).
    pub is_administrative: bool,
    /// Ancla de correlación para el rastro forense distribuido.
    pub correlation_identifier: String,
}

impl TenantContext {
    /// Contexto nominal de un inquilino sin operador asociado.
    pub fn for_tenant(tenant_identifier: Uuid) -> Self {
        Self {
            tenant_identifier: Some(tenant_identifier),
            user_identifier: None,
            is_administrative: false,
            correlation_identifier: Uuid::new_v4().to_string(),
        }
    }

    /// Contexto completo de una petición de usuario.
    pub fn for_user(tenant_identifier: Uuid, user_identifier: Uuid) -> Self {
        Self {
            tenant_identifier: Some(tenant_identifier),
            user_identifier: Some(user_identifier),
            is_administrative: false,
            correlation_identifier: Uuid::new_v4().to_string(),
        }
    }

    /// Contexto administrativo de barrido cruzado.
    ///
    /// Válido únicamente para el camino de lectura no transaccional; el
    /// Storage Gateway rechaza unidades de escritura sin inquilino.
    pub fn system_sweep() -> Self {
        Self {
            tenant_identifier: None,
            user_identifier: None,
            is_administrative: true,
            correlation_identifier: Uuid::new_v4().to_string(),
        }
    }

    /// Deriva un contexto hijo anclado a un inquilino concreto,
    /// preservando la correlación del barrido padre.
    pub fn narrowed_to_tenant(&self, tenant_identifier: Uuid) -> Self {
        Self {
            tenant_identifier: Some(tenant_identifier),
            user_identifier: self.user_identifier,
            is_administrative: self.is_administrative,
            correlation_identifier: self.correlation_identifier.clone(),
        }
    }

    /// Etiqueta del actor para el rastro de auditoría (`publishedBy`).
    pub fn actor_label(&self) -> String {
        self.user_identifier
            .map(|identifier| identifier.to_string())
            .unwrap_or_else(|| "system".to_string())
    }
}
