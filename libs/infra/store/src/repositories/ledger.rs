// [libs/infra/store/src/repositories/ledger.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER ENGINE (V5.0 - CHAIN SEALED)
 * CLASIFICACIÓN: INFRASTRUCTURE ENGINE (ESTRATO L3)
 * RESPONSABILIDAD: MUTACIÓN ATÓMICA DE BALANCES Y ASIENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRIPLE COUPLING: Cada mutación lee el balance bajo candado,
 *    actualiza 'available_credits' y apendiza el asiento con la
 *    tripleta (previous, amount, new) en la misma unidad.
 * 2. OUTCOME DISCIPLINE: InsufficientCredits e InvalidAmount son
 *    resultados de negocio; jamás errores ni registros de error.
 * 3. IDEMPOTENT REPLAY: Una llave de idempotencia recupera el asiento
 *    previo cuyo 'operation_code' porta el mismo sufijo, sin escribir.
 * 4. BEST-EFFORT EXPIRY: Los débitos de expiración toman
 *    min(unused, available) y reportan deriva de conciliación.
 *
 * # Mathematical Proof (LT-1 / LT-2 / CB-1):
 * Bajo el candado IMMEDIATE, previous se lee del balance vigente, de
 * modo que el asiento n encadena con el n-1 (LT-2) y new = previous +
 * amount por construcción (LT-1). Todo débito verifica available ≥
 * amount antes de escribir, preservando CB-1.
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
use libsql::params;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::{
    round_credits, CreditBalance, CreditTransaction, LedgerReceipt, LedgerRefusal,
    TransactionKind,
};
use tracing::{debug, instrument};
use uuid::Uuid;

// --- ESTRATO DE SENTENCIAS ATÓMICAS ---

/// Lee el balance vigente bajo el candado de la unidad.
const SELECT_BALANCE_FOR_MUTATION: &str = r#"
    SELECT available_credits FROM credit_balances
    WHERE tenant_id = ?1 AND entity_id = ?2
"#;

/// Génesis perezosa de la fila de balance en la primera mutación.
const INITIALIZE_BALANCE_ROW: &str = r#"
    INSERT INTO credit_balances (
        credit_id, tenant_id, entity_id, available_credits,
        reserved_credits, is_active, last_updated_at
    ) VALUES (?1, ?2, ?3, 0, 0, 1, ?4)
"#;

const UPDATE_BALANCE_ROW: &str = r#"
    UPDATE credit_balances
    SET available_credits = ?3, last_updated_at = ?4
    WHERE tenant_id = ?1 AND entity_id = ?2
"#;

/// Apendiza el asiento inmutable con la tripleta de la cadena.
const APPEND_LEDGER_ROW: &str = r#"
    INSERT INTO credit_transactions (
        transaction_id, tenant_id, entity_id, transaction_type,
        amount, previous_balance, new_balance, operation_code,
        initiated_by, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;

/// Recupera el asiento previo anclado a la llave de idempotencia
/// (sufijo del código de operación).
const FIND_IDEMPOTENT_REPLAY: &str = r#"
    SELECT transaction_id, previous_balance, new_balance
    FROM credit_transactions
    WHERE tenant_id = ?1 AND entity_id = ?2 AND operation_code LIKE ?3
    ORDER BY created_at DESC, rowid DESC
    LIMIT 1
"#;

const SELECT_BALANCE_SNAPSHOT: &str = r#"
    SELECT credit_id, tenant_id, entity_id, available_credits,
           reserved_credits, is_active, last_updated_at
    FROM credit_balances
    WHERE tenant_id = ?1 AND entity_id = ?2
"#;

/// Magnitud consumida del mes corriente para los escalones de volumen.
const SUM_MONTH_TO_DATE_CONSUMPTION: &str = r#"
    SELECT COALESCE(SUM(ABS(amount)), 0)
    FROM credit_transactions
    WHERE tenant_id = ?1 AND entity_id = ?2 AND operation_code = ?3
      AND transaction_type = 'consumption' AND created_at >= ?4
"#;

/// Unidades de uso del periodo de franquicia (cuenta de operaciones).
const COUNT_PERIOD_CONSUMPTIONS: &str = r#"
    SELECT COUNT(*)
    FROM credit_transactions
    WHERE tenant_id = ?1 AND entity_id = ?2 AND operation_code = ?3
      AND transaction_type = 'consumption' AND created_at >= ?4
"#;

const SELECT_TRANSACTION_PAGE: &str = r#"
    SELECT transaction_id, tenant_id, entity_id, transaction_type,
           amount, previous_balance, new_balance, operation_code,
           initiated_by, created_at
    FROM credit_transactions
    WHERE tenant_id = ?1 AND entity_id = ?2
    ORDER BY created_at DESC, rowid DESC
    LIMIT ?3 OFFSET ?4
"#;

// --- ESTRATO DE INSTRUCCIONES Y RESULTADOS ---

/// Instrucción de acreditación.
#[derive(Debug, Clone)]
pub struct CreditInstruction {
    pub entity_identifier: Uuid,
    pub amount: f64,
    pub transaction_kind: TransactionKind,
    pub operation_code: Option<String>,
    pub initiated_by: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

/// Instrucción de débito de consumo.
#[derive(Debug, Clone)]
pub struct DebitInstruction {
    pub entity_identifier: Uuid,
    pub amount: f64,
    pub operation_code: String,
    pub initiated_by: Option<Uuid>,
    pub idempotency_key: Option<String>,
}

/// Resultado de un verbo del motor: aplicado o rehusado.
#[derive(Debug, Clone)]
pub enum LedgerOutcome {
    Applied(LedgerReceipt),
    Refused(LedgerRefusal),
}

/// Resultado de una transferencia entre entidades.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Applied { outgoing: LedgerReceipt, incoming: LedgerReceipt },
    Refused(LedgerRefusal),
}

/// Deducción best-effort de una expiración.
#[derive(Debug, Clone)]
pub struct ExpiryDeduction {
    pub receipt: Option<LedgerReceipt>,
    pub deducted_credits: f64,
    /// Verdadero cuando available < unused: deriva de conciliación.
    pub drifted: bool,
}

pub struct LedgerEngine {
    store_client: CreditStoreClient,
}

impl LedgerEngine {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    // --- ESTRATO DE VERBOS ATÓMICOS (UNA UNIDAD POR VERBO) ---

    /// Acredita una magnitud positiva sobre la entidad.
    #[instrument(skip(self, context, instruction))]
    pub async fn credit(
        &self,
        context: &TenantContext,
        instruction: CreditInstruction,
    ) -> Result<LedgerOutcome, StoreError> {
        if instruction.amount <= 0.0 || !instruction.amount.is_finite() {
            return Ok(LedgerOutcome::Refused(LedgerRefusal::InvalidAmount {
                amount: instruction.amount,
            }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;

        if let Some(idempotency_key) = &instruction.idempotency_key {
            if let Some(replayed_receipt) = self
                .find_idempotent_replay(&unit, instruction.entity_identifier, idempotency_key)
                .await?
            {
                unit.rollback().await?;
                return Ok(LedgerOutcome::Applied(replayed_receipt));
            }
        }

        let receipt = self.apply_credit_in_unit(&mut unit, &instruction).await?;
        unit.commit().await?;
        Ok(LedgerOutcome::Applied(receipt))
    }

    /// Debita un consumo; rehúsa sin escribir ante balance corto.
    #[instrument(skip(self, context, instruction))]
    pub async fn debit(
        &self,
        context: &TenantContext,
        instruction: DebitInstruction,
    ) -> Result<LedgerOutcome, StoreError> {
        if instruction.amount <= 0.0 || !instruction.amount.is_finite() {
            return Ok(LedgerOutcome::Refused(LedgerRefusal::InvalidAmount {
                amount: instruction.amount,
            }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;

        if let Some(idempotency_key) = &instruction.idempotency_key {
            if let Some(replayed_receipt) = self
                .find_idempotent_replay(&unit, instruction.entity_identifier, idempotency_key)
                .await?
            {
                unit.rollback().await?;
                return Ok(LedgerOutcome::Applied(replayed_receipt));
            }
        }

        match self.apply_debit_in_unit(&mut unit, &instruction).await? {
            LedgerOutcome::Applied(receipt) => {
                unit.commit().await?;
                Ok(LedgerOutcome::Applied(receipt))
            }
            refused => {
                unit.rollback().await?;
                Ok(refused)
            }
        }
    }

    /// Transfiere entre dos entidades del mismo inquilino.
    ///
    /// Los balances se procesan en orden lexicográfico de entidad para
    /// mantener determinista la disciplina de candados; los asientos
    /// 'transfer_out' / 'transfer_in' comparten la unidad.
    #[instrument(skip(self, context))]
    pub async fn transfer(
        &self,
        context: &TenantContext,
        source_entity: Uuid,
        destination_entity: Uuid,
        amount: f64,
        initiated_by: Option<Uuid>,
    ) -> Result<TransferOutcome, StoreError> {
        if amount <= 0.0 || !amount.is_finite() || source_entity == destination_entity {
            return Ok(TransferOutcome::Refused(LedgerRefusal::InvalidAmount { amount }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;

        // Materialización en orden determinista (lexicográfico).
        let mut ordered_entities = [source_entity, destination_entity];
        ordered_entities.sort_by_key(|entity| entity.to_string());
        for entity in ordered_entities {
            self.materialize_balance_row(&unit, entity).await?;
        }

        let source_available = self.read_locked_balance(&unit, source_entity).await?;
        if source_available < amount {
            unit.rollback().await?;
            return Ok(TransferOutcome::Refused(LedgerRefusal::InsufficientCredits {
                available: source_available,
                required: amount,
            }));
        }

        let outgoing = self
            .apply_mutation_in_unit(
                &mut unit,
                source_entity,
                -amount,
                TransactionKind::TransferOut,
                Some(format!("transfer:{}", destination_entity)),
                initiated_by,
            )
            .await?;

        let incoming = self
            .apply_mutation_in_unit(
                &mut unit,
                destination_entity,
                amount,
                TransactionKind::TransferIn,
                Some(format!("transfer:{}", source_entity)),
                initiated_by,
            )
            .await?;

        unit.commit().await?;
        Ok(TransferOutcome::Applied { outgoing, incoming })
    }

    /// Ajuste administrativo con signo; los negativos honran CB-1.
    #[instrument(skip(self, context))]
    pub async fn adjust(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        signed_amount: f64,
        operation_code: Option<String>,
        initiated_by: Option<Uuid>,
    ) -> Result<LedgerOutcome, StoreError> {
        if signed_amount == 0.0 || !signed_amount.is_finite() {
            return Ok(LedgerOutcome::Refused(LedgerRefusal::InvalidAmount {
                amount: signed_amount,
            }));
        }

        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;
        self.materialize_balance_row(&unit, entity_identifier).await?;

        if signed_amount < 0.0 {
            let available = self.read_locked_balance(&unit, entity_identifier).await?;
            if available < -signed_amount {
                unit.rollback().await?;
                return Ok(LedgerOutcome::Refused(LedgerRefusal::InsufficientCredits {
                    available,
                    required: -signed_amount,
                }));
            }
        }

        let receipt = self
            .apply_mutation_in_unit(
                &mut unit,
                entity_identifier,
                signed_amount,
                TransactionKind::Adjustment,
                operation_code,
                initiated_by,
            )
            .await?;

        unit.commit().await?;
        Ok(LedgerOutcome::Applied(receipt))
    }

    // --- ESTRATO DE COMPOSICIÓN EN UNIDAD AJENA ---

    /// Acreditación dentro de una unidad compuesta (compras, cubetas).
    pub async fn apply_credit_in_unit(
        &self,
        unit: &mut UnitOfWork,
        instruction: &CreditInstruction,
    ) -> Result<LedgerReceipt, StoreError> {
        self.materialize_balance_row(unit, instruction.entity_identifier).await?;
        self.apply_mutation_in_unit(
            unit,
            instruction.entity_identifier,
            instruction.amount,
            instruction.transaction_kind,
            instruction.operation_code.clone(),
            instruction.initiated_by,
        )
        .await
    }

    /// Débito de consumo dentro de una unidad compuesta.
    pub async fn apply_debit_in_unit(
        &self,
        unit: &mut UnitOfWork,
        instruction: &DebitInstruction,
    ) -> Result<LedgerOutcome, StoreError> {
        self.materialize_balance_row(unit, instruction.entity_identifier).await?;

        let available = self.read_locked_balance(unit, instruction.entity_identifier).await?;
        if available < instruction.amount {
            return Ok(LedgerOutcome::Refused(LedgerRefusal::InsufficientCredits {
                available,
                required: instruction.amount,
            }));
        }

        let receipt = self
            .apply_mutation_in_unit(
                unit,
                instruction.entity_identifier,
                -instruction.amount,
                TransactionKind::Consumption,
                Some(instruction.operation_code.clone()),
                instruction.initiated_by,
            )
            .await?;

        Ok(LedgerOutcome::Applied(receipt))
    }

    /// Asiento de consumo de magnitud cero: registra el uso de la
    /// franquicia gratuita sin alterar el balance.
    pub async fn record_free_consumption(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        operation_code: &str,
        initiated_by: Option<Uuid>,
    ) -> Result<LedgerReceipt, StoreError> {
        let mut unit = UnitOfWork::begin(&self.store_client, context).await?;
        self.materialize_balance_row(&unit, entity_identifier).await?;
        let receipt = self
            .apply_mutation_in_unit(
                &mut unit,
                entity_identifier,
                0.0,
                TransactionKind::Consumption,
                Some(operation_code.to_string()),
                initiated_by,
            )
            .await?;
        unit.commit().await?;
        Ok(receipt)
    }

    /// Deducción best-effort de una expiración: toma
    /// min(unused, available) y reporta la deriva cuando difieren.
    pub async fn apply_expiry_deduction_in_unit(
        &self,
        unit: &mut UnitOfWork,
        entity_identifier: Uuid,
        unused_credits: f64,
        operation_code: String,
    ) -> Result<ExpiryDeduction, StoreError> {
        self.materialize_balance_row(unit, entity_identifier).await?;

        let available = self.read_locked_balance(unit, entity_identifier).await?;
        let deducted_credits = round_credits(unused_credits.min(available));
        let drifted = round_credits(unused_credits - deducted_credits) > 0.0;

        let receipt = if deducted_credits > 0.0 {
            Some(
                self.apply_mutation_in_unit(
                    unit,
                    entity_identifier,
                    -deducted_credits,
                    TransactionKind::Expiry,
                    Some(operation_code),
                    None,
                )
                .await?,
            )
        } else {
            None
        };

        Ok(ExpiryDeduction { receipt, deducted_credits, drifted })
    }

    // --- ESTRATO DE LECTURA ---

    /// Balance vigente; sintetiza la fila perezosa en cero si no existe.
    pub async fn get_balance(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
    ) -> Result<CreditBalance, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let mut query_results = connection
            .query(
                SELECT_BALANCE_SNAPSHOT,
                params![tenant_identifier.to_string(), entity_identifier.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(CreditBalance {
                credit_identifier: parse_identifier(&required_text(&data_row, 0)?)?,
                tenant_identifier: parse_identifier(&required_text(&data_row, 1)?)?,
                entity_identifier: parse_identifier(&required_text(&data_row, 2)?)?,
                available_credits: required_real(&data_row, 3)?,
                reserved_credits: required_real(&data_row, 4)?,
                is_active: crate::rows::required_flag(&data_row, 5)?,
                last_updated_at: parse_instant(&required_text(&data_row, 6)?)?,
            }),
            None => Ok(CreditBalance {
                credit_identifier: Uuid::new_v4(),
                tenant_identifier,
                entity_identifier,
                available_credits: 0.0,
                reserved_credits: 0.0,
                is_active: true,
                last_updated_at: Utc::now(),
            }),
        }
    }

    /// Magnitud consumida del mes corriente para un código (escalones).
    pub async fn month_to_date_consumption(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        operation_code: &str,
        month_start: DateTime<Utc>,
    ) -> Result<f64, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let mut query_results = connection
            .query(
                SUM_MONTH_TO_DATE_CONSUMPTION,
                params![
                    tenant_identifier.to_string(),
                    entity_identifier.to_string(),
                    operation_code.to_string(),
                    month_start.to_rfc3339()
                ],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => required_real(&data_row, 0),
            None => Ok(0.0),
        }
    }

    /// Unidades de uso del periodo de franquicia (una por consumo,
    /// incluidos los asientos gratuitos de magnitud cero).
    pub async fn consumption_units_since(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        operation_code: &str,
        period_start: DateTime<Utc>,
    ) -> Result<f64, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let mut query_results = connection
            .query(
                COUNT_PERIOD_CONSUMPTIONS,
                params![
                    tenant_identifier.to_string(),
                    entity_identifier.to_string(),
                    operation_code.to_string(),
                    period_start.to_rfc3339()
                ],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(crate::rows::required_integer(&data_row, 0)? as f64),
            None => Ok(0.0),
        }
    }

    /// Página del historial de asientos, más reciente primero.
    pub async fn transaction_history(
        &self,
        context: &TenantContext,
        entity_identifier: Uuid,
        page_size: i64,
        page_offset: i64,
    ) -> Result<Vec<CreditTransaction>, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;
        let connection = self.store_client.get_connection()?;

        let mut query_results = connection
            .query(
                SELECT_TRANSACTION_PAGE,
                params![
                    tenant_identifier.to_string(),
                    entity_identifier.to_string(),
                    page_size,
                    page_offset
                ],
            )
            .await?;

        let mut ledger_page = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            ledger_page.push(map_transaction_row(&data_row)?);
        }
        Ok(ledger_page)
    }

    // --- ESTRATO PRIVADO (FÍSICA DE LA MUTACIÓN) ---

    /// Génesis perezosa de la fila de balance bajo el candado.
    async fn materialize_balance_row(
        &self,
        unit: &UnitOfWork,
        entity_identifier: Uuid,
    ) -> Result<(), StoreError> {
        let tenant_identifier = unit.tenant_identifier();

        let mut existing = unit
            .query(
                SELECT_BALANCE_FOR_MUTATION,
                params![tenant_identifier.to_string(), entity_identifier.to_string()],
            )
            .await?;

        if existing.next().await?.is_none() {
            unit.execute(
                INITIALIZE_BALANCE_ROW,
                params![
                    Uuid::new_v4().to_string(),
                    tenant_identifier.to_string(),
                    entity_identifier.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
            debug!(entity = %entity_identifier, "🌱 [LEDGER]: Balance row lazily materialized.");
        }

        Ok(())
    }

    /// Lee 'available_credits' vigente dentro de la unidad.
    async fn read_locked_balance(
        &self,
        unit: &UnitOfWork,
        entity_identifier: Uuid,
    ) -> Result<f64, StoreError> {
        let mut query_results = unit
            .query(
                SELECT_BALANCE_FOR_MUTATION,
                params![unit.tenant_identifier().to_string(), entity_identifier.to_string()],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => required_real(&data_row, 0),
            None => Ok(0.0),
        }
    }

    /// Física de la mutación: actualiza el balance y apendiza la
    /// tripleta. El llamador garantiza las precondiciones (CB-1).
    async fn apply_mutation_in_unit(
        &self,
        unit: &mut UnitOfWork,
        entity_identifier: Uuid,
        signed_amount: f64,
        transaction_kind: TransactionKind,
        operation_code: Option<String>,
        initiated_by: Option<Uuid>,
    ) -> Result<LedgerReceipt, StoreError> {
        let tenant_identifier = unit.tenant_identifier();
        let previous_balance = self.read_locked_balance(unit, entity_identifier).await?;
        let normalized_amount = round_credits(signed_amount);
        let new_balance = round_credits(previous_balance + normalized_amount);

        if new_balance < 0.0 {
            return Err(StoreError::TransactionCollapse(format!(
                "CB1_VIOLATION: balance would reach {}",
                new_balance
            )));
        }

        let mutation_instant = Utc::now().to_rfc3339();

        unit.execute(
            UPDATE_BALANCE_ROW,
            params![
                tenant_identifier.to_string(),
                entity_identifier.to_string(),
                new_balance,
                mutation_instant.clone()
            ],
        )
        .await?;

        let transaction_identifier = Uuid::new_v4();
        unit.execute(
            APPEND_LEDGER_ROW,
            params![
                transaction_identifier.to_string(),
                tenant_identifier.to_string(),
                entity_identifier.to_string(),
                transaction_kind.as_code(),
                normalized_amount,
                previous_balance,
                new_balance,
                nullable_text(operation_code),
                nullable_text(initiated_by.map(|identifier| identifier.to_string())),
                mutation_instant
            ],
        )
        .await?;

        Ok(LedgerReceipt {
            transaction_identifier,
            previous_balance,
            new_balance,
            replayed: false,
        })
    }

    /// Busca un asiento previo anclado a la llave de idempotencia.
    async fn find_idempotent_replay(
        &self,
        unit: &UnitOfWork,
        entity_identifier: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<LedgerReceipt>, StoreError> {
        let mut query_results = unit
            .query(
                FIND_IDEMPOTENT_REPLAY,
                params![
                    unit.tenant_identifier().to_string(),
                    entity_identifier.to_string(),
                    format!("%:{}", idempotency_key)
                ],
            )
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(LedgerReceipt {
                transaction_identifier: parse_identifier(&required_text(&data_row, 0)?)?,
                previous_balance: required_real(&data_row, 1)?,
                new_balance: required_real(&data_row, 2)?,
                replayed: true,
            })),
            None => Ok(None),
        }
    }
}

/// Proyección fila -> asiento del dominio.
pub(crate) fn map_transaction_row(
    data_row: &libsql::Row,
) -> Result<CreditTransaction, StoreError> {
    let kind_code = required_text(data_row, 3)?;
    let transaction_kind = TransactionKind::from_code(&kind_code).ok_or_else(|| {
        StoreError::MappingError(format!("UNKNOWN_TRANSACTION_KIND '{}'", kind_code))
    })?;

    Ok(CreditTransaction {
        transaction_identifier: parse_identifier(&required_text(data_row, 0)?)?,
        tenant_identifier: parse_identifier(&required_text(data_row, 1)?)?,
        entity_identifier: parse_identifier(&required_text(data_row, 2)?)?,
        transaction_kind,
        amount: required_real(data_row, 4)?,
        previous_balance: required_real(data_row, 5)?,
        new_balance: required_real(data_row, 6)?,
        operation_code: optional_text(data_row, 7)?,
        initiated_by: optional_identifier(data_row, 8)?,
        created_at: parse_instant(&required_text(data_row, 9)?)?,
    })
}
