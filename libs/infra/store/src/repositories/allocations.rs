// [libs/infra/store/src/repositories/allocations.rs]
/*!
 * =================================================================
 * APARATO: SEASONAL ALLOCATION ENGINE (V4.1 - FIFO SEALED)
 * CLASIFICACIÓN: INFRASTRUCTURE ENGINE (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE CUBETAS Y CONSUMO FIFO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COUPLED GENESIS: La creación inserta la cubeta y acredita el
 *    Ledger ("seasonal_allocation:{campaign}") en la misma unidad.
 * 2. FIFO DISCIPLINE: El consumo drena cubetas por 'expires_at'
 *    ascendente con desempate por 'created_at'; las cubetas con silo
 *    objetivo solo admiten operaciones de ese silo.
 * 3. SINGLE FINALIZATION: La transición a expirado usa un guardia de
 *    estado; la doble finalización es un no-op detectable.
 *
 * # Mathematical Proof (SA-1/SA-2/SA-3):
 * used_credits solo crece acotado por allocated_credits dentro de la
 * unidad de consumo (SA-1); la finalización sella is_expired=1 e
 * is_active=0 en la misma sentencia (SA-2) y la deducción best-effort
 * del remanente comparte esa unidad (SA-3).
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::repositories::ledger::{
    CreditInstruction, ExpiryDeduction, LedgerEngine, LedgerOutcome,
};
use crate::rows::{
    nullable_text, optional_text, parse_identifier, parse_instant, required_flag, required_real,
    required_text,
};
use crate::unit::UnitOfWork;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::{round_credits, LedgerReceipt, LedgerRefusal, TransactionKind};
use meridian_domain_models::allocation::{SeasonalAllocation, SeasonalCreditKind};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

// --- ESTRATO DE SENTENCIAS ATÓMICAS ---

const INSERT_ALLOCATION: &str = r#"
    INSERT INTO seasonal_credit_allocations (
        allocation_id, tenant_id, entity_id, target_application,
        allocated_credits, used_credits, expires_at, is_active,
        is_expired, credit_type, campaign_id, campaign_name, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 1, 0, ?7, ?8, ?9, ?10)
"#;

/// Cubetas vivas elegibles para el drenaje FIFO.
const SELECT_DRAWABLE_ALLOCATIONS: &str = r#"
    SELECT allocation_id, tenant_id, entity_id, target_application,
           allocated_credits, used_credits, expires_at, is_active,
           is_expired, credit_type, campaign_id, campaign_name, created_at
    FROM seasonal_credit_allocations
    WHERE tenant_id = ?1 AND entity_id = ?2
      AND is_active = 1 AND is_expired = 0 AND expires_at > ?3
    ORDER BY expires_at ASC, created_at ASC
"#;

const INCREMENT_USED_CREDITS: &str = r#"
    UPDATE seasonal_credit_allocations
    SET used_credits = used_credits + ?3
    WHERE allocation_id = ?1 AND tenant_id = ?2
"#;

/// Cubetas vencidas pendientes de finalización (barrido cruzado).
const SELECT_DUE_FOR_EXPIRY: &str = r#"
    SELECT allocation_id, tenant_id, entity_id, target_application,
           allocated_credits, used_credits, expires_at, is_active,
           is_expired, credit_type, campaign_id, campaign_name, created_at
    FROM seasonal_credit_allocations
    WHERE is_active = 1 AND is_expired = 0 AND expires_at <= ?1
    ORDER BY expires_at ASC
    LIMIT ?2
"#;

/// Sella SA-2 con guardia de estado: una sola finalización gana.
const MARK_EXPIRED_GUARDED: &str = r#"
    UPDATE seasonal_credit_allocations
    SET is_expired = 1, is_active = 0
    WHERE allocation_id = ?1 AND tenant_id = ?2 AND is_expired = 0
"#;

const SELECT_ENTITY_ALLOCATIONS: &str = r#"
    SELECT allocation_id, tenant_id, entity_id, target_application,
           allocated_credits, used_credits, expires_at, is_active,
           is_expired, credit_type, campaign_id, campaign_name, created_at
    FROM seasonal_credit_allocations
    WHERE tenant_id = ?1 AND entity_id = ?2
    ORDER BY expires_at ASC, created_at ASC
"#;

// --- ESTRATO DE INSTRUCCIONES Y RESULTADOS ---

/// Borrador de creación de una cubeta estacional.
#[derive(Debug, Clone)]
pub struct AllocationDraft {
    pub entity_identifier: Uuid,
    pub amount: f64,
    pub credit_kind: SeasonalCreditKind,
    pub target_application: Option<String>,
    pub campaign_identifier: Option<String>,
    pub campaign_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub initiated_by: Option<Uuid>,
}

/// Resultado de la creación acoplada cubeta + acreditación.
#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    Created { allocation: SeasonalAllocation, receipt: LedgerReceipt },
    Refused(LedgerRefusal),
}

/// Giro individual contra una cubeta durante el drenaje FIFO.
#[derive(Debug, Clone)]
pub struct AllocationDraw {
    pub allocation_identifier: Uuid,
    pub drawn_credits: f64,
}

/// Resultado del consumo contra cubetas.
#[derive(Debug, Clone)]
pub enum AllocationDrawOutcome {
    Drawn { receipt: LedgerReceipt, draws: Vec<AllocationDraw> },
    Refused(LedgerRefusal),
}

/// Resultado de la finalización de una cubeta vencida.
#[derive(Debug, Clone)]
pub struct ExpiryFinalization {
    pub allocation_identifier: Uuid,
    pub unused_credits: f64,
    pub deducted_credits: f64,
    pub drifted: bool,
    /// Verdadero cuando otro barrido ganó la carrera de finalización.
    pub already_finalized: bool,
}

pub struct AllocationEngine {
    store_client: CreditStoreClient,
    ledger_engine: LedgerEngine,
}

impl AllocationEngine {
    pub fn new(store_client: CreditStoreClient) -> Self {
        let ledger_engine = LedgerEngine::new(store_client.clone());
        Self { store_client, ledger_engine }
    }

    /// Crea la cubeta y acredita el Ledger en una sola unidad.
    #[instrument(skip(self, context, draft))]
    pub async fn create_allocation(
        &self,
        context: &TenantContext,
        draft: AllocationDraft,
    ) -> Result<AllocationOutcome, StoreError> {
        if draft.amount <= 0.0 || !draft.amount.is_finite() {
            return Ok(AllocationOutcome::Refused(LedgerRefusal::InvalidAmount {
                amount: draft.amount,
            }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;

        let allocation_identifier = Uuid::new_v4();
        let created_at = Utc::now();
        let campaign_anchor = draft
            .campaign_identifier
            .clone()
            .unwrap_or_else(|| allocation_identifier.to_string());

        unit.execute(
            INSERT_ALLOCATION,
            params![
                allocation_identifier.to_string(),
                unit.tenant_identifier().to_string(),
                draft.entity_identifier.to_string(),
                nullable_text(draft.target_application.clone()),
                round_credits(draft.amount),
                draft.expires_at.to_rfc3339(),
                draft.credit_kind.as_code(),
                nullable_text(draft.campaign_identifier.clone()),
                nullable_text(draft.campaign_name.clone()),
                created_at.to_rfc3339()
            ],
        )
        .await?;

        let receipt = self
            .ledger_engine
            .apply_credit_in_unit(
                &mut unit,
                &CreditInstruction {
                    entity_identifier: draft.entity_identifier,
                    amount: draft.amount,
                    transaction_kind: TransactionKind::Allocation,
                    operation_code: Some(format!("seasonal_allocation:{}", campaign_anchor)),
                    initiated_by: draft.initiated_by,
                    idempotency_key: None,
                },
            )
            .await?;

        unit.commit().await?;

        let allocation = SeasonalAllocation {
            allocation_identifier,
            tenant_identifier: context.tenant_identifier.unwrap_or_default(),
            entity_identifier: draft.entity_identifier,
            target_application: draft.target_application,
            allocated_credits: round_credits(draft.amount),
            used_credits: 0.0,
            expires_at: draft.expires_at,
            is_active: true,
            is_expired: false,
            credit_kind: draft.credit_kind,
            campaign_identifier: draft.campaign_identifier,
            campaign_name: draft.campaign_name,
            created_at,
        };

        Ok(AllocationOutcome::Created { allocation, receipt })
    }

    /// Drena cubetas en orden FIFO hasta satisfacer la magnitud y
    /// debita el balance general en la misma unidad.
    ///
    /// Rehúsa sin escribir cuando las cubetas elegibles no cubren la
    /// magnitud; el Orquestador decide el repliegue al balance general.
    #[instrument(skip(self, context))]
    pub async fn consume_from_allocations(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        amount: f64,
        operation_code: &str,
        initiated_by: Option<Uuid>,
    ) -> Result<AllocationDrawOutcome, StoreError> {
        if amount <= 0.0 || !amount.is_finite() {
            return Ok(AllocationDrawOutcome::Refused(LedgerRefusal::InvalidAmount { amount }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;
        let now = Utc::now();

        let mut query_results = unit
            .query(
                SELECT_DRAWABLE_ALLOCATIONS,
                params![
                    unit.tenant_identifier().to_string(),
                    entity_identifier.to_string(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        let mut drawable_buckets = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let bucket = map_allocation_row(&data_row)?;
            if bucket.admits_operation(operation_code) && bucket.remaining_credits() > 0.0 {
                drawable_buckets.push(bucket);
            }
        }
        drop(query_results);

        let drawable_total: f64 = round_credits(
            drawable_buckets.iter().map(SeasonalAllocation::remaining_credits).sum(),
        );

        if drawable_total < amount {
            unit.rollback().await?;
            return Ok(AllocationDrawOutcome::Refused(LedgerRefusal::InsufficientCredits {
                available: drawable_total,
                required: amount,
            }));
        }

        // Drenaje FIFO: cada giro incrementa 'used_credits' acotado por
        // el remanente de la cubeta (SA-1).
        let mut outstanding = amount;
        let mut draws = Vec::new();

        for bucket in drawable_buckets {
            if outstanding <= 0.0 {
                break;
            }

            let drawn_credits = round_credits(outstanding.min(bucket.remaining_credits()));
            unit.execute(
                INCREMENT_USED_CREDITS,
                params![
                    bucket.allocation_identifier.to_string(),
                    unit.tenant_identifier().to_string(),
                    drawn_credits
                ],
            )
            .await?;

            outstanding = round_credits(outstanding - drawn_credits);
            draws.push(AllocationDraw {
                allocation_identifier: bucket.allocation_identifier,
                drawn_credits,
            });
        }

        // Asiento de consumo único por el total, en la misma unidad.
        let debit_outcome = self
            .ledger_engine
            .apply_debit_in_unit(
                &mut unit,
                &crate::repositories::ledger::DebitInstruction {
                    entity_identifier,
                    amount,
                    operation_code: operation_code.to_string(),
                    initiated_by,
                    idempotency_key: None,
                },
            )
            .await?;

        match debit_outcome {
            LedgerOutcome::Applied(receipt) => {
                unit.commit().await?;
                debug!(
                    entity = %entity_identifier,
                    buckets = draws.len(),
                    "🪣 [ALLOCATIONS]: FIFO drain crystallized."
                );
                Ok(AllocationDrawOutcome::Drawn { receipt, draws })
            }
            LedgerOutcome::Refused(refusal) => {
                // El balance general no respalda las cubetas: deriva.
                warn!(
                    entity = %entity_identifier,
                    "🟠 [ALLOCATIONS]: Bucket capacity not backed by balance. Rolling back."
                );
                unit.rollback().await?;
                Ok(AllocationDrawOutcome::Refused(refusal))
            }
        }
    }

    /// Barrido administrativo de cubetas vencidas (lectura cruzada).
    ///
    /// # Errors:
    /// 'AuthConfiguration' si el contexto no es administrativo.
    pub async fn sweep_due_allocations(
        &self,
        context: &TenantContext,
        now: DateTime<Utc>,
        sweep_limit: i64,
    ) -> Result<Vec<SeasonalAllocation>, StoreError> {
        if !context.is_administrative {
            return Err(StoreError::AuthConfiguration(
                "CROSS_TENANT_SWEEP_DENIED: administrative context required".into(),
            ));
        }

        let connection = self.store_client.get_connection()?;
        let mut query_results = connection
            .query(SELECT_DUE_FOR_EXPIRY, params![now.to_rfc3339(), sweep_limit])
            .await?;

        let mut due_allocations = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            due_allocations.push(map_allocation_row(&data_row)?);
        }
        Ok(due_allocations)
    }

    /// Finaliza una cubeta vencida: sella SA-2 y deduce el remanente
    /// best-effort del balance en la misma unidad (SA-3).
    #[instrument(skip(self, context, allocation))]
    pub async fn finalize_expiry(
        &self,
        context: &TenantContext,
        allocation: &SeasonalAllocation,
    ) -> Result<ExpiryFinalization, StoreError> {
        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;

        let sealed_rows = unit
            .execute(
                MARK_EXPIRED_GUARDED,
                params![
                    allocation.allocation_identifier.to_string(),
                    unit.tenant_identifier().to_string()
                ],
            )
            .await?;

        if sealed_rows == 0 {
            unit.rollback().await?;
            return Ok(ExpiryFinalization {
                allocation_identifier: allocation.allocation_identifier,
                unused_credits: 0.0,
                deducted_credits: 0.0,
                drifted: false,
                already_finalized: true,
            });
        }

        let unused_credits = allocation.remaining_credits();
        let application_label = allocation
            .target_application
            .clone()
            .unwrap_or_else(|| "primary_org".to_string());
        let operation_code = format!(
            "credit_expiry:{}:{}",
            application_label, allocation.allocation_identifier
        );

        let deduction = if unused_credits > 0.0 {
            self.ledger_engine
                .apply_expiry_deduction_in_unit(
                    &mut unit,
                    allocation.entity_identifier,
                    unused_credits,
                    operation_code,
                )
                .await?
        } else {
            ExpiryDeduction { receipt: None, deducted_credits: 0.0, drifted: false }
        };

        unit.commit().await?;

        Ok(ExpiryFinalization {
            allocation_identifier: allocation.allocation_identifier,
            unused_credits,
            deducted_credits: deduction.deducted_credits,
            drifted: deduction.drifted,
            already_finalized: false,
        })
    }

    /// Cubetas de una entidad, opcionalmente incluyendo expiradas.
    pub async fn list_for_entity(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        include_expired: bool,
    ) -> Result<Vec<SeasonalAllocation>, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let mut query_results = connection
            .query(
                SELECT_ENTITY_ALLOCATIONS,
                params![tenant_identifier.to_string(), entity_identifier.to_string()],
            )
            .await?;

        let mut entity_allocations = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let allocation = map_allocation_row(&data_row)?;
            if include_expired || !allocation.is_expired {
                entity_allocations.push(allocation);
            }
        }
        Ok(entity_allocations)
    }
}

/// Proyección fila -> cubeta del dominio.
pub(crate) fn map_allocation_row(data_row: &Row) -> Result<SeasonalAllocation, StoreError> {
    let kind_code = required_text(data_row, 9)?;
    let credit_kind = SeasonalCreditKind::from_code(&kind_code).ok_or_else(|| {
        StoreError::MappingError(format!("UNKNOWN_CREDIT_KIND '{}'", kind_code))
    })?;

    Ok(SeasonalAllocation {
        allocation_identifier: parse_identifier(&required_text(data_row, 0)?)?,
        tenant_identifier: parse_identifier(&required_text(data_row, 1)?)?,
        entity_identifier: parse_identifier(&required_text(data_row, 2)?)?,
        target_application: optional_text(data_row, 3)?,
        allocated_credits: required_real(data_row, 4)?,
        used_credits: required_real(data_row, 5)?,
        expires_at: parse_instant(&required_text(data_row, 6)?)?,
        is_active: required_flag(data_row, 7)?,
        is_expired: required_flag(data_row, 8)?,
        credit_kind,
        campaign_identifier: optional_text(data_row, 10)?,
        campaign_name: optional_text(data_row, 11)?,
        created_at: parse_instant(&required_text(data_row, 12)?)?,
    })
}
