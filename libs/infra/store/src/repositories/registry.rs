// [libs/infra/store/src/repositories/registry.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION REGISTRY REPOSITORY (V2.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CATÁLOGO DE APLICACIONES, MÓDULOS Y PERMISOS
 *
 * El resolutor de configuración deriva de este catálogo el conjunto
 * completo de códigos de operación de un módulo para la tarificación
 * masiva.
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::rows::required_text;
use crate::unit::UnitOfWork;
use libsql::params;
use meridian_domain_models::context::TenantContext;
use tracing::instrument;
use uuid::Uuid;

const UPSERT_APPLICATION: &str = r#"
    INSERT INTO applications (app_id, app_code, status)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(app_code) DO UPDATE SET status = excluded.status
"#;

const SELECT_APPLICATION: &str = r#"
    SELECT app_id, status FROM applications WHERE app_code = ?1
"#;

const UPSERT_MODULE: &str = r#"
    INSERT INTO application_modules (module_id, app_id, module_code, permissions)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(app_id, module_code) DO UPDATE SET permissions = excluded.permissions
"#;

const SELECT_MODULE_PERMISSIONS: &str = r#"
    SELECT application_modules.permissions
    FROM application_modules
    JOIN applications ON applications.app_id = application_modules.app_id
    WHERE applications.app_code = ?1 AND application_modules.module_code = ?2
"#;

pub struct RegistryRepository {
    store_client: CreditStoreClient,
}

impl RegistryRepository {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    /// Registra o reactiva un silo de aplicación.
    #[instrument(skip(self, context))]
    pub async fn register_application(
        &self,
        context: &TenantContext,
        application_code: &str,
        status: &str,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            UPSERT_APPLICATION,
            params![
                Uuid::new_v4().to_string(),
                application_code.to_string(),
                status.to_string()
            ],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }

    /// Registra un módulo con su lista de permisos (JSON).
    #[instrument(skip(self, context, permission_codes))]
    pub async fn register_module(
        &self,
        context: &TenantContext,
        application_code: &str,
        module_code: &str,
        permission_codes: &[String],
    ) -> Result<(), StoreError> {
        let application_identifier = self
            .application_identifier(application_code)
            .await?
            .ok_or(StoreError::EntityNotFound)?;

        let permissions_json = serde_json::to_string(permission_codes)
            .map_err(|encoding_fault| StoreError::MappingError(encoding_fault.to_string()))?;

        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            UPSERT_MODULE,
            params![
                Uuid::new_v4().to_string(),
                application_identifier,
                module_code.to_string(),
                permissions_json
            ],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }

    /// Permisos registrados de un módulo, para la expansión de códigos.
    pub async fn module_permissions(
        &self,
        application_code: &str,
        module_code: &str,
    ) -> Result<Vec<String>, StoreError> {
        let connection = self.store_client.get_connection()?;
        let mut query_results = connection
            .query(
                SELECT_MODULE_PERMISSIONS,
                params![application_code.to_string(), module_code.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => {
                let permissions_json = required_text(&data_row, 0)?;
                serde_json::from_str(&permissions_json).map_err(|decoding_fault| {
                    StoreError::MappingError(decoding_fault.to_string())
                })
            }
            None => Ok(Vec::new()),
        }
    }

    /// Estado vigente del silo, o None si no está registrado.
    pub async fn application_status(
        &self,
        application_code: &str,
    ) -> Result<Option<String>, StoreError> {
        let connection = self.store_client.get_connection()?;
        let mut query_results = connection
            .query(SELECT_APPLICATION, params![application_code.to_string()])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(required_text(&data_row, 1)?)),
            None => Ok(None),
        }
    }

    async fn application_identifier(
        &self,
        application_code: &str,
    ) -> Result<Option<String>, StoreError> {
        let connection = self.store_client.get_connection()?;
        let mut query_results = connection
            .query(SELECT_APPLICATION, params![application_code.to_string()])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(required_text(&data_row, 0)?)),
            None => Ok(None),
        }
    }
}
