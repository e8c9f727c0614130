// [apps/orchestrator/src/services/credit_service.rs]
/*!
 * =================================================================
 * APARATO: CREDIT SERVICE FACADE (V5.1 - VERB ORCHESTRATION)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: COMPOSICIÓN DE LOS VERBOS DEL NÚCLEO DE CRÉDITOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VERB COMPOSITION: purchase -> consume -> allocate -> transfer
 *    componen resolutor, motor de Ledger, cubetas y publicador.
 * 2. OUTCOME DISCIPLINE: Los fallos de negocio viajan como
 *    {success:false, reason}; los colapsos del broker JAMÁS alcanzan
 *    al llamador de negocio: rastro forense + fila de auditoría.
 * 3. OUTBOX ORDER: La fila de auditoría se escribe antes del intento
 *    de publicación y siempre fuera de la unidad del Ledger; el
 *    escáner re-emite lo no acusado.
 *
 * # Mathematical Proof (Ledger Consistency Under Publish Failure):
 * El publish vive fuera de la unidad transaccional: un colapso de
 * transporte posterior al COMMIT deja el Ledger consistente y el
 * sobre persistido en la auditoría para su re-emisión at-least-once;
 * la defensa idempotente del consumidor absorbe el duplicado.
 * =================================================================
 */

use crate::state::AppState;
use chrono::Utc;
use meridian_domain_models::config::AllowancePeriod;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::{LedgerReceipt, LedgerRefusal};
use meridian_domain_models::credits::TransactionKind;
use meridian_domain_models::events::InterAppEnvelope;
use meridian_domain_models::purchase::{CreditPurchase, PurchaseStatus};
use meridian_domain_pricing::tariff::{allowance_period_start, quote};
use meridian_domain_pricing::{resolve_effective_config, OperationCode};
use meridian_infra_fabric::{derive_routing_key, forge_event_identifier};
use meridian_infra_store::repositories::{
    AllocationDraft, AllocationDrawOutcome, AllocationOutcome, CreditInstruction,
    DebitInstruction, LedgerOutcome, PurchaseDraft, TransferOutcome,
};
use meridian_infra_store::{StoreError, UnitOfWork};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Petición estructuralmente inválida (no un rechazo de negocio).
    #[error("[L4_SERVICE_FAULT]: INVALID_REQUEST -> {0}")]
    InvalidRequest(String),

    /// Fallo de la pasarela de checkout.
    #[error("[L4_SERVICE_FAULT]: CHECKOUT_FAULT -> {0}")]
    Checkout(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// --- ESTRATO DE PETICIONES Y RESULTADOS ---

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub entity_identifier: Uuid,
    pub credit_amount: f64,
    pub unit_price: f64,
    pub payment_method: String,
    pub requested_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PurchaseInitiation {
    pub purchase: CreditPurchase,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub entity_identifier: Uuid,
    pub operation_code: String,
    pub quantity: f64,
    pub target_application: Option<String>,
    pub initiated_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct AllocateRequest {
    pub source_entity: Uuid,
    pub amount: f64,
    pub target_application: String,
    pub initiated_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_entity: Uuid,
    pub destination_entity: Uuid,
    pub amount: f64,
    pub initiated_by: Option<Uuid>,
}

/// Resultado de negocio de un verbo del Orquestador.
#[derive(Debug, Clone, Serialize)]
pub struct VerbOutcome {
    pub success: bool,
    pub reason: Option<String>,
    pub available: Option<f64>,
    pub required: Option<f64>,
    pub applied_cost: Option<f64>,
    pub receipt: Option<LedgerReceipt>,
    pub event_identifier: Option<String>,
}

impl VerbOutcome {
    fn applied(receipt: LedgerReceipt, applied_cost: f64, event_identifier: Option<String>) -> Self {
        Self {
            success: true,
            reason: None,
            available: None,
            required: None,
            applied_cost: Some(applied_cost),
            receipt: Some(receipt),
            event_identifier,
        }
    }

    fn refused(refusal: &LedgerRefusal) -> Self {
        let (available, required) = match refusal {
            LedgerRefusal::InsufficientCredits { available, required } => {
                (Some(*available), Some(*required))
            }
            _ => (None, None),
        };
        Self {
            success: false,
            reason: Some(refusal.reason_label().to_string()),
            available,
            required,
            applied_cost: None,
            receipt: None,
            event_identifier: None,
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            success: false,
            reason: Some(reason.to_string()),
            available: None,
            required: None,
            applied_cost: None,
            receipt: None,
            event_identifier: None,
        }
    }
}

pub struct CreditService {
    state: AppState,
}

impl CreditService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    // --- VERBO 1: COMPRA DE CRÉDITOS ---

    /// Abre la compra pendiente y, para métodos de pasarela, negocia
    /// la sesión de checkout. La acreditación llega con el webhook.
    #[instrument(skip(self, context, request))]
    pub async fn purchase_credits(
        &self,
        context: &TenantContext,
        request: PurchaseRequest,
    ) -> Result<PurchaseInitiation, ServiceError> {
        if request.credit_amount <= 0.0 || !request.credit_amount.is_finite() {
            return Err(ServiceError::InvalidRequest(format!(
                "non-positive credit amount {}",
                request.credit_amount
            )));
        }
        if request.unit_price <= 0.0 || !request.unit_price.is_finite() {
            return Err(ServiceError::InvalidRequest(format!(
                "non-positive unit price {}",
                request.unit_price
            )));
        }

        self.state.entity_repository.ensure_active(context, request.entity_identifier).await?;

        let purchase = self
            .state
            .purchase_repository
            .create_pending(
                context,
                PurchaseDraft {
                    entity_identifier: request.entity_identifier,
                    credit_amount: request.credit_amount,
                    unit_price: request.unit_price,
                    payment_method: request.payment_method.clone(),
                    external_session_identifier: None,
                    requested_by: request.requested_by,
                },
            )
            .await?;

        // Métodos de pasarela: sesión opaca de checkout. El resto se
        // ancla a una sesión manual determinista para el finalizador.
        let checkout_session = if request.payment_method == "stripe" {
            let session = self
                .state
                .checkout_gateway
                .create_session(&purchase)
                .await
                .map_err(|gateway_fault| ServiceError::Checkout(gateway_fault.to_string()))?;
            Some(session)
        } else {
            None
        };

        let (external_session_identifier, checkout_url) = match checkout_session {
            Some(session) => {
                (session.external_session_identifier, Some(session.checkout_url))
            }
            None => (format!("manual_{}", purchase.purchase_identifier), None),
        };

        self.state
            .purchase_repository
            .attach_external_session(
                context,
                purchase.purchase_identifier,
                &external_session_identifier,
            )
            .await?;

        info!(
            purchase = %purchase.purchase_identifier,
            session = %external_session_identifier,
            "🧾 [CREDIT_SERVICE]: Purchase opened in pending state."
        );

        let mut opened_purchase = purchase;
        opened_purchase.external_session_identifier = Some(external_session_identifier);

        Ok(PurchaseInitiation { purchase: opened_purchase, checkout_url })
    }

    /// Finaliza la compra ante la señal autoritativa de pago.
    ///
    /// Idempotente sobre la sesión externa: la re-entrega del webhook
    /// recupera el recibo previo sin doble acreditación ni segundo
    /// evento (CP-1).
    #[instrument(skip(self, context))]
    pub async fn finalize_purchase(
        &self,
        context: &TenantContext,
        external_session_identifier: &str,
    ) -> Result<VerbOutcome, ServiceError> {
        let Some(purchase) = self
            .state
            .purchase_repository
            .find_by_external_session(context, external_session_identifier)
            .await?
        else {
            return Ok(VerbOutcome::failed("PurchaseNotFound"));
        };

        let mut unit = UnitOfWork::begin(&self.state.store_client, context).await?;
        let won_transition = self
            .state
            .purchase_repository
            .mark_completed_in_unit(&unit, purchase.purchase_identifier, Utc::now())
            .await?;

        if !won_transition {
            unit.rollback().await?;

            // Re-lectura del estado vigente: la fila pudo completarse
            // entre la búsqueda y el guardia de transición.
            let current_status = self
                .state
                .purchase_repository
                .find_by_external_session(context, external_session_identifier)
                .await?
                .map(|current| current.status);
            if current_status != Some(PurchaseStatus::Completed) {
                return Ok(VerbOutcome::failed("PurchaseNotPending"));
            }

            // Re-entrega del webhook: recibo idempotente, sin evento.
            let replayed = self
                .state
                .ledger_engine
                .credit(
                    context,
                    CreditInstruction {
                        entity_identifier: purchase.entity_identifier,
                        amount: purchase.credit_amount,
                        transaction_kind: TransactionKind::Purchase,
                        operation_code: Some(format!(
                            "purchase:{}",
                            external_session_identifier
                        )),
                        initiated_by: purchase.requested_by,
                        idempotency_key: Some(external_session_identifier.to_string()),
                    },
                )
                .await?;

            return Ok(match replayed {
                LedgerOutcome::Applied(receipt) => {
                    VerbOutcome::applied(receipt, purchase.credit_amount, None)
                }
                LedgerOutcome::Refused(refusal) => VerbOutcome::refused(&refusal),
            });
        }

        let receipt = self
            .state
            .ledger_engine
            .apply_credit_in_unit(
                &mut unit,
                &CreditInstruction {
                    entity_identifier: purchase.entity_identifier,
                    amount: purchase.credit_amount,
                    transaction_kind: TransactionKind::Purchase,
                    operation_code: Some(format!("purchase:{}", external_session_identifier)),
                    initiated_by: purchase.requested_by,
                    idempotency_key: None,
                },
            )
            .await?;

        self.state
            .purchase_repository
            .stamp_credited_in_unit(&unit, purchase.purchase_identifier, Utc::now())
            .await?;

        let purchase_label = purchase.purchase_identifier.to_string();
        unit.defer_post_commit(Box::new(move || {
            info!(purchase = %purchase_label, "💰 [CREDIT_SERVICE]: Purchase crystallized in the ledger.");
        }));
        unit.commit().await?;

        // Notificación a los silos, fuera de la unidad.
        let mut last_event_identifier = None;
        for target_application in self.state.purchase_event_targets.clone() {
            last_event_identifier = self
                .emit_directed_event(
                    context,
                    &target_application,
                    "credit.allocated",
                    &purchase.entity_identifier.to_string(),
                    json!({
                        "allocationId": purchase.purchase_identifier,
                        "amount": purchase.credit_amount,
                        "creditType": "purchase",
                    }),
                )
                .await
                .or(last_event_identifier);
        }

        self.emit_broadcast_event(
            context,
            "purchase.completed",
            &purchase.entity_identifier.to_string(),
            json!({
                "purchaseId": purchase.purchase_identifier,
                "creditAmount": purchase.credit_amount,
                "externalSessionId": external_session_identifier,
            }),
        )
        .await;

        Ok(VerbOutcome::applied(receipt, purchase.credit_amount, last_event_identifier))
    }

    // --- VERBO 2: CONSUMO TARIFICADO ---

    /// Resuelve el precio, intenta las cubetas del silo objetivo y
    /// repliega al balance general; publica 'credit.consumed'.
    #[instrument(skip(self, context, request))]
    pub async fn consume_credits(
        &self,
        context: &TenantContext,
        request: ConsumeRequest,
    ) -> Result<VerbOutcome, ServiceError> {
        // El parseo punteado vive en el resolutor, jamás en el caller.
        let operation_code = match OperationCode::parse(&request.operation_code) {
            Ok(parsed_code) => parsed_code,
            Err(_) => return Ok(VerbOutcome::failed("InvalidOperationCode")),
        };

        if self
            .state
            .entity_repository
            .ensure_active(context, request.entity_identifier)
            .await
            .is_err()
        {
            return Ok(VerbOutcome::failed("EntityNotFound"));
        }

        // 1. RESOLUCIÓN DE TARIFA (herencia de ámbitos).
        let candidates = self
            .state
            .config_repository
            .fetch_scope_candidates(
                context,
                &request.operation_code,
                Some(request.entity_identifier),
            )
            .await?;
        let resolved = resolve_effective_config(&request.operation_code, candidates);

        // 2. USO VIGENTE (franquicia del periodo + mes para escalones).
        let now = Utc::now();
        let period_usage = self
            .state
            .ledger_engine
            .consumption_units_since(
                context,
                request.entity_identifier,
                &request.operation_code,
                allowance_period_start(resolved.free_allowance_period, now),
            )
            .await?;
        let month_usage = self
            .state
            .ledger_engine
            .month_to_date_consumption(
                context,
                request.entity_identifier,
                &request.operation_code,
                allowance_period_start(AllowancePeriod::Month, now),
            )
            .await?;

        // 3. COTIZACIÓN DETERMINISTA.
        let quotation = match quote(&resolved, request.quantity, period_usage, month_usage) {
            Ok(quotation) => quotation,
            Err(refusal) => return Ok(VerbOutcome::refused(&refusal)),
        };

        let publish_target = request
            .target_application
            .clone()
            .unwrap_or_else(|| operation_code.application_code().to_string());

        // 4. CONSUMO GRATUITO: asiento de magnitud cero para el rastro
        //    de franquicia; el balance no se altera.
        if quotation.total_cost <= 0.0 {
            let receipt = self
                .state
                .ledger_engine
                .record_free_consumption(
                    context,
                    request.entity_identifier,
                    &request.operation_code,
                    request.initiated_by,
                )
                .await?;

            let event_identifier = self
                .emit_directed_event(
                    context,
                    &publish_target,
                    "credit.consumed",
                    &request.entity_identifier.to_string(),
                    json!({
                        "operationCode": request.operation_code,
                        "amount": 0.0,
                        "newBalance": receipt.new_balance,
                        "quantity": request.quantity,
                    }),
                )
                .await;
            return Ok(VerbOutcome::applied(receipt, 0.0, event_identifier));
        }

        // 5. CUBETAS DEL SILO OBJETIVO PRIMERO; REPLIEGUE AL BALANCE.
        let ledger_outcome = match &request.target_application {
            Some(_) => {
                let draw_outcome = self
                    .state
                    .allocation_engine
                    .consume_from_allocations(
                        context,
                        request.entity_identifier,
                        quotation.total_cost,
                        &request.operation_code,
                        request.initiated_by,
                    )
                    .await?;

                match draw_outcome {
                    AllocationDrawOutcome::Drawn { receipt, .. } => {
                        LedgerOutcome::Applied(receipt)
                    }
                    AllocationDrawOutcome::Refused(LedgerRefusal::InsufficientCredits {
                        ..
                    }) => {
                        // Cubetas secas: el Orquestador decide el
                        // repliegue al balance general.
                        self.state
                            .ledger_engine
                            .debit(
                                context,
                                DebitInstruction {
                                    entity_identifier: request.entity_identifier,
                                    amount: quotation.total_cost,
                                    operation_code: request.operation_code.clone(),
                                    initiated_by: request.initiated_by,
                                    idempotency_key: None,
                                },
                            )
                            .await?
                    }
                    AllocationDrawOutcome::Refused(other_refusal) => {
                        LedgerOutcome::Refused(other_refusal)
                    }
                }
            }
            None => {
                self.state
                    .ledger_engine
                    .debit(
                        context,
                        DebitInstruction {
                            entity_identifier: request.entity_identifier,
                            amount: quotation.total_cost,
                            operation_code: request.operation_code.clone(),
                            initiated_by: request.initiated_by,
                            idempotency_key: None,
                        },
                    )
                    .await?
            }
        };

        let receipt = match ledger_outcome {
            LedgerOutcome::Applied(receipt) => receipt,
            // Rechazo esperado del dominio: sin rastro de error y sin
            // evento publicado.
            LedgerOutcome::Refused(refusal) => return Ok(VerbOutcome::refused(&refusal)),
        };

        // 6. NOTIFICACIÓN AL SILO (fuera de la unidad del Ledger).
        let event_identifier = self
            .emit_directed_event(
                context,
                &publish_target,
                "credit.consumed",
                &request.entity_identifier.to_string(),
                json!({
                    "operationCode": request.operation_code,
                    "amount": -quotation.total_cost,
                    "newBalance": receipt.new_balance,
                    "quantity": request.quantity,
                }),
            )
            .await;

        Ok(VerbOutcome::applied(receipt, quotation.total_cost, event_identifier))
    }

    // --- VERBO 3: EARMARK HACIA UN SILO ---

    /// Debita la entidad fuente y anuncia la asignación al silo.
    #[instrument(skip(self, context, request))]
    pub async fn allocate_to_application(
        &self,
        context: &TenantContext,
        request: AllocateRequest,
    ) -> Result<VerbOutcome, ServiceError> {
        let outcome = self
            .state
            .ledger_engine
            .debit(
                context,
                DebitInstruction {
                    entity_identifier: request.source_entity,
                    amount: request.amount,
                    operation_code: format!(
                        "application_allocation:{}",
                        request.target_application
                    ),
                    initiated_by: request.initiated_by,
                    idempotency_key: None,
                },
            )
            .await?;

        let receipt = match outcome {
            LedgerOutcome::Applied(receipt) => receipt,
            LedgerOutcome::Refused(refusal) => return Ok(VerbOutcome::refused(&refusal)),
        };

        let allocation_identifier = Uuid::new_v4();
        let event_identifier = self
            .emit_directed_event(
                context,
                &request.target_application,
                "credit.allocated",
                &request.source_entity.to_string(),
                json!({
                    "allocationId": allocation_identifier,
                    "amount": request.amount,
                    "targetApplication": request.target_application,
                }),
            )
            .await;

        Ok(VerbOutcome::applied(receipt, request.amount, event_identifier))
    }

    /// Crea una cubeta estacional y anuncia la asignación cuando la
    /// cubeta apunta a un silo concreto.
    #[instrument(skip(self, context, draft))]
    pub async fn create_seasonal_allocation(
        &self,
        context: &TenantContext,
        draft: AllocationDraft,
    ) -> Result<VerbOutcome, ServiceError> {
        let target_application = draft.target_application.clone();
        let entity_identifier = draft.entity_identifier;
        let amount = draft.amount;

        let outcome = self.state.allocation_engine.create_allocation(context, draft).await?;

        let (allocation, receipt) = match outcome {
            AllocationOutcome::Created { allocation, receipt } => (allocation, receipt),
            AllocationOutcome::Refused(refusal) => return Ok(VerbOutcome::refused(&refusal)),
        };

        let event_identifier = match target_application {
            Some(target) => {
                self.emit_directed_event(
                    context,
                    &target,
                    "credit.allocated",
                    &entity_identifier.to_string(),
                    json!({
                        "allocationId": allocation.allocation_identifier,
                        "amount": amount,
                        "creditType": allocation.credit_kind.as_code(),
                        "campaignId": allocation.campaign_identifier,
                        "targetApplication": target,
                    }),
                )
                .await
            }
            None => None,
        };

        Ok(VerbOutcome::applied(receipt, amount, event_identifier))
    }

    // --- VERBO 4: TRANSFERENCIA ENTRE ENTIDADES ---

    /// Delegación directa al motor de Ledger; sin evento por contrato.
    #[instrument(skip(self, context, request))]
    pub async fn transfer(
        &self,
        context: &TenantContext,
        request: TransferRequest,
    ) -> Result<VerbOutcome, ServiceError> {
        let outcome = self
            .state
            .ledger_engine
            .transfer(
                context,
                request.source_entity,
                request.destination_entity,
                request.amount,
                request.initiated_by,
            )
            .await?;

        Ok(match outcome {
            TransferOutcome::Applied { outgoing, .. } => {
                VerbOutcome::applied(outgoing, request.amount, None)
            }
            TransferOutcome::Refused(refusal) => VerbOutcome::refused(&refusal),
        })
    }

    // --- ESTRATO DE EMISIÓN (OUTBOX + PUBLISH) ---

    /// Forja el sobre, persiste la fila de auditoría y publica. Un
    /// colapso de transporte queda en el rastro; jamás alcanza al
    /// llamador de negocio.
    async fn emit_directed_event(
        &self,
        context: &TenantContext,
        target_application: &str,
        event_type: &str,
        entity_identifier: &str,
        event_data: Value,
    ) -> Option<String> {
        let envelope = InterAppEnvelope {
            event_id: forge_event_identifier(),
            event_type: event_type.to_string(),
            source_application: self.state.service_name.clone(),
            target_application: target_application.to_string(),
            tenant_id: context
                .tenant_identifier
                .map(|identifier| identifier.to_string())
                .unwrap_or_default(),
            entity_id: entity_identifier.to_string(),
            timestamp: Utc::now(),
            event_data,
            published_by: context.actor_label(),
        };
        let routing_key = derive_routing_key(target_application, event_type);

        // Disciplina de outbox: el rastro precede al intento.
        if let Err(audit_fault) =
            self.state.event_audit.record_published(&envelope, &routing_key).await
        {
            warn!(event = %envelope.event_id, "⚠️ [CREDIT_SERVICE]: Audit row write failed: {}", audit_fault);
        }

        match self.state.publisher.publish_envelope(&envelope).await {
            Ok(receipt) => Some(receipt.event_identifier),
            Err(transport_fault) => {
                error!(
                    event = %envelope.event_id,
                    failure_class = %transport_fault.failure_class(),
                    envelope = %serde_json::to_string(&envelope).unwrap_or_default(),
                    "📡 [CREDIT_SERVICE]: Publish collapsed; retry scanner will re-emit."
                );
                None
            }
        }
    }

    async fn emit_broadcast_event(
        &self,
        context: &TenantContext,
        event_type: &str,
        entity_identifier: &str,
        event_data: Value,
    ) {
        let tenant_label = context
            .tenant_identifier
            .map(|identifier| identifier.to_string())
            .unwrap_or_default();

        if let Err(transport_fault) = self
            .state
            .publisher
            .publish_broadcast(
                event_type,
                &tenant_label,
                entity_identifier,
                event_data,
                &context.actor_label(),
            )
            .await
        {
            error!(
                failure_class = %transport_fault.failure_class(),
                "📡 [CREDIT_SERVICE]: Broadcast collapsed for [{}].",
                event_type
            );
        }
    }
}
