// [libs/infra/store/src/repositories/entities.rs]
/*!
 * =================================================================
 * APARATO: ORGANIZATIONAL ENTITY REPOSITORY (V2.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: BOSQUE ORGANIZACIONAL Y RAÍZ PRIMARIA
 *
 * El onboarding externo crea inquilinos y entidades; el núcleo solo
 * los lee y, a lo sumo, los desactiva. Las inserciones de este
 * aparato sirven a la siembra y al Proving Grounds.
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::rows::{
    nullable_text, optional_identifier, parse_identifier, parse_instant, required_flag,
    required_text,
};
use crate::unit::UnitOfWork;
use libsql::{params, Row};
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::entity::{
    select_primary_root, BusinessEntity, EntityKind, PrimaryRootCandidate, Tenant, TenantStatus,
};
use tracing::instrument;
use uuid::Uuid;

const INSERT_TENANT: &str = r#"
    INSERT INTO tenants (tenant_id, tenant_name, status, created_at)
    VALUES (?1, ?2, ?3, ?4)
"#;

const INSERT_ENTITY: &str = r#"
    INSERT INTO entities (
        entity_id, tenant_id, entity_type, parent_entity_id,
        entity_name, is_active, is_default, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

const ENTITY_PROJECTION: &str = r#"
    SELECT entity_id, tenant_id, entity_type, parent_entity_id,
           entity_name, is_active, is_default, created_at
    FROM entities
"#;

const DEACTIVATE_ENTITY: &str = r#"
    UPDATE entities SET is_active = 0
    WHERE entity_id = ?1 AND tenant_id = ?2
"#;

pub struct EntityRepository {
    store_client: CreditStoreClient,
}

impl EntityRepository {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    /// Siembra de inquilino (onboarding externo / Proving Grounds).
    #[instrument(skip(self, context, tenant))]
    pub async fn register_tenant(
        &self,
        context: &TenantContext,
        tenant: &Tenant,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            INSERT_TENANT,
            params![
                tenant.tenant_identifier.to_string(),
                tenant.tenant_name.clone(),
                match tenant.status {
                    TenantStatus::Active => "active",
                    TenantStatus::Suspended => "suspended",
                },
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }

    /// Siembra de entidad organizacional.
    #[instrument(skip(self, context, entity))]
    pub async fn register_entity(
        &self,
        context: &TenantContext,
        entity: &BusinessEntity,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            INSERT_ENTITY,
            params![
                entity.entity_identifier.to_string(),
                entity.tenant_identifier.to_string(),
                entity_kind_code(entity.entity_kind),
                nullable_text(
                    entity.parent_entity_identifier.map(|identifier| identifier.to_string())
                ),
                entity.entity_name.clone(),
                entity.is_active as i64,
                entity.is_default as i64,
                entity.created_at.to_rfc3339()
            ],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }

    /// Localiza una entidad dentro de la partición del inquilino.
    pub async fn find(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
    ) -> Result<Option<BusinessEntity>, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let sql_statement =
            format!("{} WHERE tenant_id = ?1 AND entity_id = ?2", ENTITY_PROJECTION);
        let mut query_results = connection
            .query(
                &sql_statement,
                params![tenant_identifier.to_string(), entity_identifier.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(map_entity_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Exige una entidad activa; el rechazo es 'EntityNotFound'.
    pub async fn ensure_active(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
    ) -> Result<BusinessEntity, StoreError> {
        match self.find(context, entity_identifier).await? {
            Some(entity) if entity.is_active => Ok(entity),
            _ => Err(StoreError::EntityNotFound),
        }
    }

    /// Resuelve la raíz primaria del inquilino: bandera de membresía,
    /// luego 'is_default', luego el 'created_at' más antiguo.
    pub async fn primary_root(
        &self,
        context: &TenantContext,
        primary_membership_entity: Option<Uuid>,
    ) -> Result<Option<BusinessEntity>, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let sql_statement = format!(
            "{} WHERE tenant_id = ?1 AND parent_entity_id IS NULL AND is_active = 1",
            ENTITY_PROJECTION
        );
        let mut query_results =
            connection.query(&sql_statement, params![tenant_identifier.to_string()]).await?;

        let mut candidates = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let entity = map_entity_row(&data_row)?;
            let is_primary_membership =
                primary_membership_entity == Some(entity.entity_identifier);
            candidates.push(PrimaryRootCandidate { entity, is_primary_membership });
        }

        Ok(select_primary_root(&candidates).cloned())
    }

    /// Desactivación lógica; el núcleo jamás borra entidades.
    pub async fn deactivate(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            DEACTIVATE_ENTITY,
            params![entity_identifier.to_string(), unit.tenant_identifier().to_string()],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }
}

fn entity_kind_code(entity_kind: EntityKind) -> &'static str {
    match entity_kind {
        EntityKind::Organization => "organization",
        EntityKind::Branch => "branch",
        EntityKind::Department => "department",
    }
}

fn map_entity_row(data_row: &Row) -> Result<BusinessEntity, StoreError> {
    let kind_code = required_text(data_row, 2)?;
    let entity_kind = match kind_code.as_str() {
        "organization" => EntityKind::Organization,
        "branch" => EntityKind::Branch,
        "department" => EntityKind::Department,
        unknown => {
            return Err(StoreError::MappingError(format!("UNKNOWN_ENTITY_KIND '{}'", unknown)))
        }
    };

    Ok(BusinessEntity {
        entity_identifier: parse_identifier(&required_text(data_row, 0)?)?,
        tenant_identifier: parse_identifier(&required_text(data_row, 1)?)?,
        entity_kind,
        parent_entity_identifier: optional_identifier(data_row, 3)?,
        entity_name: required_text(data_row, 4)?,
        is_active: required_flag(data_row, 5)?,
        is_default: required_flag(data_row, 6)?,
        created_at: parse_instant(&required_text(data_row, 7)?)?,
    })
}
