// [libs/infra/store/src/repositories/purchases.rs]
/*!
 * =================================================================
 * APARATO: CREDIT PURCHASE REPOSITORY (V3.2 - SESSION GUARDED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL CICLO DE VIDA DE COMPRAS
 *
 * # Mathematical Proof (Single Completion):
 * La transición 'pending' -> 'completed' usa un guardia de estado en
 * la sentencia; ante la re-entrega del webhook la segunda transición
 * afecta cero filas y el llamador recupera el recibo idempotente del
 * Ledger en lugar de doble acreditación (CP-1).
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::rows::{
    nullable_text, optional_identifier, optional_text, parse_identifier, parse_instant,
    required_real, required_text,
};
use crate::unit::UnitOfWork;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::purchase::{CreditPurchase, PurchaseStatus};
use tracing::instrument;
use uuid::Uuid;

const INSERT_PENDING_PURCHASE: &str = r#"
    INSERT INTO credit_purchases (
        purchase_id, tenant_id, entity_id, credit_amount, unit_price,
        total_amount, payment_method, status, external_session_id,
        requested_by, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10)
"#;

const ATTACH_EXTERNAL_SESSION: &str = r#"
    UPDATE credit_purchases
    SET external_session_id = ?3
    WHERE purchase_id = ?1 AND tenant_id = ?2
"#;

/// Guardia de estado: solo una finalización gana la carrera.
const MARK_COMPLETED_GUARDED: &str = r#"
    UPDATE credit_purchases
    SET status = 'completed', paid_at = ?3
    WHERE purchase_id = ?1 AND tenant_id = ?2 AND status = 'pending'
"#;

const STAMP_CREDITED: &str = r#"
    UPDATE credit_purchases
    SET credited_at = ?3
    WHERE purchase_id = ?1 AND tenant_id = ?2
"#;

const MARK_FAILED: &str = r#"
    UPDATE credit_purchases
    SET status = 'failed'
    WHERE purchase_id = ?1 AND tenant_id = ?2 AND status = 'pending'
"#;

const PURCHASE_PROJECTION: &str = r#"
    SELECT purchase_id, tenant_id, entity_id, credit_amount, unit_price,
           total_amount, payment_method, status, external_session_id,
           requested_by, paid_at, credited_at, created_at
    FROM credit_purchases
"#;

/// Borrador de una compra pendiente.
#[derive(Debug, Clone)]
pub struct PurchaseDraft {
    pub entity_identifier: Uuid,
    pub credit_amount: f64,
    pub unit_price: f64,
    pub payment_method: String,
    pub external_session_identifier: Option<String>,
    pub requested_by: Option<Uuid>,
}

pub struct PurchaseRepository {
    store_client: CreditStoreClient,
}

impl PurchaseRepository {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    /// Inserta la compra en estado 'pending'.
    #[instrument(skip(self, context, draft))]
    pub async fn create_pending(
        &self,
        context: &TenantContext,
        draft: PurchaseDraft,
    ) -> Result<CreditPurchase, StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;

        let purchase_identifier = Uuid::new_v4();
        let created_at = Utc::now();
        let total_amount = draft.credit_amount * draft.unit_price;

        unit.execute(
            INSERT_PENDING_PURCHASE,
            params![
                purchase_identifier.to_string(),
                unit.tenant_identifier().to_string(),
                draft.entity_identifier.to_string(),
                draft.credit_amount,
                draft.unit_price,
                total_amount,
                draft.payment_method.clone(),
                nullable_text(draft.external_session_identifier.clone()),
                nullable_text(draft.requested_by.map(|identifier| identifier.to_string())),
                created_at.to_rfc3339()
            ],
        )
        .await?;

        unit.commit().await?;

        Ok(CreditPurchase {
            purchase_identifier,
            tenant_identifier: unit_tenant(context)?,
            entity_identifier: draft.entity_identifier,
            credit_amount: draft.credit_amount,
            unit_price: draft.unit_price,
            total_amount,
            payment_method: draft.payment_method,
            status: PurchaseStatus::Pending,
            external_session_identifier: draft.external_session_identifier,
            requested_by: draft.requested_by,
            paid_at: None,
            credited_at: None,
            created_at,
        })
    }

    /// Ancla la sesión de checkout devuelta por la pasarela.
    pub async fn attach_external_session(
        &self,
        context: &TenantContext,
        purchase_identifier: Uuid,
        external_session_identifier: &str,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        let updated_rows = unit
            .execute(
                ATTACH_EXTERNAL_SESSION,
                params![
                    purchase_identifier.to_string(),
                    unit.tenant_identifier().to_string(),
                    external_session_identifier.to_string()
                ],
            )
            .await?;

        if updated_rows == 0 {
            unit.rollback().await?;
            return Err(StoreError::PurchaseNotFound);
        }

        unit.commit().await?;
        Ok(())
    }

    /// Localiza la compra por la sesión de la pasarela externa.
    pub async fn find_by_external_session(
        &self,
        context: &TenantContext,
        external_session_identifier: &str,
    ) -> Result<Option<CreditPurchase>, StoreError> {
        let tenant_identifier = unit_tenant(context)?;
        let connection = self.store_client.get_connection()?;

        let sql_statement =
            format!("{} WHERE tenant_id = ?1 AND external_session_id = ?2", PURCHASE_PROJECTION);
        let mut query_results = connection
            .query(
                &sql_statement,
                params![tenant_identifier.to_string(), external_session_identifier.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(map_purchase_row(&data_row)?)),
            None => Ok(None),
        }
    }

    pub async fn find(
        &self,
        context: &TenantContext,
        purchase_identifier: Uuid,
    ) -> Result<Option<CreditPurchase>, StoreError> {
        let tenant_identifier = unit_tenant(context)?;
        let connection = self.store_client.get_connection()?;

        let sql_statement =
            format!("{} WHERE tenant_id = ?1 AND purchase_id = ?2", PURCHASE_PROJECTION);
        let mut query_results = connection
            .query(
                &sql_statement,
                params![tenant_identifier.to_string(), purchase_identifier.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(map_purchase_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Transición guardada a 'completed' dentro de una unidad ajena.
    /// Devuelve falso cuando otra finalización ganó la carrera.
    pub async fn mark_completed_in_unit(
        &self,
        unit: &UnitOfWork,
        purchase_identifier: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated_rows = unit
            .execute(
                MARK_COMPLETED_GUARDED,
                params![
                    purchase_identifier.to_string(),
                    unit.tenant_identifier().to_string(),
                    paid_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(updated_rows > 0)
    }

    /// Sella el instante del asiento 'purchase' correspondiente.
    pub async fn stamp_credited_in_unit(
        &self,
        unit: &UnitOfWork,
        purchase_identifier: Uuid,
        credited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        unit.execute(
            STAMP_CREDITED,
            params![
                purchase_identifier.to_string(),
                unit.tenant_identifier().to_string(),
                credited_at.to_rfc3339()
            ],
        )
        .await?;
        Ok(())
    }

    /// Marca el fracaso de una compra aún pendiente.
    pub async fn mark_failed(
        &self,
        context: &TenantContext,
        purchase_identifier: Uuid,
    ) -> Result<(), StoreError> {
        let unit = UnitOfWork::begin(&self.store_client, context).await?;
        unit.execute(
            MARK_FAILED,
            params![purchase_identifier.to_string(), unit.tenant_identifier().to_string()],
        )
        .await?;
        unit.commit().await?;
        Ok(())
    }
}

fn unit_tenant(context: &TenantContext) -> Result<Uuid, StoreError> {
    context.tenant_identifier.ok_or(StoreError::TenantContextMissing)
}

fn map_purchase_row(data_row: &Row) -> Result<CreditPurchase, StoreError> {
    let status_code = required_text(data_row, 7)?;
    let status = PurchaseStatus::from_code(&status_code).ok_or_else(|| {
        StoreError::MappingError(format!("UNKNOWN_PURCHASE_STATUS '{}'", status_code))
    })?;

    Ok(CreditPurchase {
        purchase_identifier: parse_identifier(&required_text(data_row, 0)?)?,
        tenant_identifier: parse_identifier(&required_text(data_row, 1)?)?,
        entity_identifier: parse_identifier(&required_text(data_row, 2)?)?,
        credit_amount: required_real(data_row, 3)?,
        unit_price: required_real(data_row, 4)?,
        total_amount: required_real(data_row, 5)?,
        payment_method: required_text(data_row, 6)?,
        status,
        external_session_identifier: optional_text(data_row, 8)?,
        requested_by: optional_identifier(data_row, 9)?,
        paid_at: optional_text(data_row, 10)?.map(|raw| parse_instant(&raw)).transpose()?,
        credited_at: optional_text(data_row, 11)?.map(|raw| parse_instant(&raw)).transpose()?,
        created_at: parse_instant(&required_text(data_row, 12)?)?,
    })
}
