// [apps/orchestrator/src/services/expiry_scheduler.rs]
/*!
 * =================================================================
 * APARATO: EXPIRY SWEEP SCHEDULER (V4.2 - DRIFT AWARE)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: BARRIDO PERIÓDICO DE CUBETAS VENCIDAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COOPERATIVE TICK: Despierta cada T segundos (60 nominales),
 *    localiza cubetas vencidas con lectura administrativa cruzada y
 *    finaliza cada una en su propia unidad de inquilino.
 * 2. NEVER FATAL: Un fallo por cubeta incrementa el contador del tick
 *    y el bucle continúa; >5 % de fallos en un tick eleva
 *    'reconciliation_drift'.
 * 3. EVENT TRAIL: Cada finalización publica 'credit.expired' hacia el
 *    silo de la cubeta, o en difusión cuando carece de silo.
 * =================================================================
 */

use crate::state::AppState;
use chrono::Utc;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::events::InterAppEnvelope;
use meridian_infra_fabric::{derive_routing_key, forge_event_identifier};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

/// Ráfaga máxima de cubetas por tick.
const SWEEP_BATCH_CEILING: i64 = 100;

/// Umbral de deriva: fracción de fallos del tick que la eleva.
const DRIFT_FAILURE_THRESHOLD: f64 = 0.05;

/// Resultado observable de un tick de barrido.
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub swept: usize,
    pub finalized: usize,
    pub failed: usize,
    pub drifted: usize,
    pub drift_raised: bool,
}

pub struct ExpirySweepScheduler {
    state: AppState,
    tick_budget: Duration,
    shutdown_signal: watch::Receiver<bool>,
}

impl ExpirySweepScheduler {
    pub fn new(
        state: AppState,
        tick_budget: Duration,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self { state, tick_budget, shutdown_signal }
    }

    /// Lanza el bucle perpetuo de barrido en el reactor de Tokio.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("⏳ [EXPIRY_SCHEDULER]: Sweep daemon online (tick {:?}).", self.tick_budget);
            let mut sweep_ticker = interval(self.tick_budget);
            sweep_ticker.tick().await; // El primer tick es inmediato.

            let mut shutdown_watch = self.shutdown_signal.clone();
            loop {
                tokio::select! {
                    _ = sweep_ticker.tick() => {
                        let report = self.sweep_once().await;
                        if report.swept > 0 {
                            info!(
                                swept = report.swept,
                                finalized = report.finalized,
                                failed = report.failed,
                                "⏳ [EXPIRY_SCHEDULER]: Tick completed."
                            );
                        }
                    }
                    _ = shutdown_watch.changed() => {
                        if *shutdown_watch.borrow() {
                            info!("🛑 [EXPIRY_SCHEDULER]: Shutdown honored between ticks.");
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Un tick completo de barrido. Jamás eleva un error fatal.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let sweep_context = TenantContext::system_sweep();

        let due_allocations = match self
            .state
            .allocation_engine
            .sweep_due_allocations(&sweep_context, Utc::now(), SWEEP_BATCH_CEILING)
            .await
        {
            Ok(due_allocations) => due_allocations,
            Err(sweep_fault) => {
                error!("❌ [EXPIRY_SCHEDULER]: Due-allocation scan failed: {}", sweep_fault);
                return report;
            }
        };

        report.swept = due_allocations.len();

        for due_allocation in due_allocations {
            let tenant_context =
                sweep_context.narrowed_to_tenant(due_allocation.tenant_identifier);

            match self
                .state
                .allocation_engine
                .finalize_expiry(&tenant_context, &due_allocation)
                .await
            {
                Ok(finalization) if finalization.already_finalized => {}
                Ok(finalization) => {
                    report.finalized += 1;
                    if finalization.drifted {
                        report.drifted += 1;
                        warn!(
                            allocation = %finalization.allocation_identifier,
                            unused = finalization.unused_credits,
                            deducted = finalization.deducted_credits,
                            failure_class = "reconciliation_drift",
                            "🟠 [EXPIRY_SCHEDULER]: Balance did not back the bucket remainder."
                        );
                    }

                    self.publish_expired_event(
                        &tenant_context,
                        &due_allocation.allocation_identifier.to_string(),
                        &due_allocation.entity_identifier.to_string(),
                        due_allocation.target_application.as_deref(),
                        due_allocation.campaign_identifier.as_deref(),
                        finalization.unused_credits,
                        finalization.deducted_credits,
                    )
                    .await;
                }
                Err(finalization_fault) => {
                    report.failed += 1;
                    error!(
                        allocation = %due_allocation.allocation_identifier,
                        "❌ [EXPIRY_SCHEDULER]: Finalization failed: {}",
                        finalization_fault
                    );
                }
            }
        }

        if report.swept > 0 {
            let failure_fraction = report.failed as f64 / report.swept as f64;
            if failure_fraction > DRIFT_FAILURE_THRESHOLD {
                report.drift_raised = true;
                error!(
                    failed = report.failed,
                    swept = report.swept,
                    failure_class = "reconciliation_drift",
                    "🚨 [EXPIRY_SCHEDULER]: Tick failure fraction exceeded the drift threshold."
                );
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish_expired_event(
        &self,
        context: &TenantContext,
        allocation_identifier: &str,
        entity_identifier: &str,
        target_application: Option<&str>,
        campaign_identifier: Option<&str>,
        unused_credits: f64,
        deducted_credits: f64,
    ) {
        let event_data = json!({
            "allocationId": allocation_identifier,
            "unusedCredits": unused_credits,
            "deductedCredits": deducted_credits,
            "campaignId": campaign_identifier,
        });
        let tenant_label = context
            .tenant_identifier
            .map(|identifier| identifier.to_string())
            .unwrap_or_default();

        match target_application {
            Some(target) => {
                let envelope = InterAppEnvelope {
                    event_id: forge_event_identifier(),
                    event_type: "credit.expired".to_string(),
                    source_application: self.state.service_name.clone(),
                    target_application: target.to_string(),
                    tenant_id: tenant_label,
                    entity_id: entity_identifier.to_string(),
                    timestamp: Utc::now(),
                    event_data,
                    published_by: "system".to_string(),
                };
                let routing_key = derive_routing_key(target, "credit.expired");

                if let Err(audit_fault) =
                    self.state.event_audit.record_published(&envelope, &routing_key).await
                {
                    warn!("⚠️ [EXPIRY_SCHEDULER]: Audit row write failed: {}", audit_fault);
                }
                if let Err(transport_fault) =
                    self.state.publisher.publish_envelope(&envelope).await
                {
                    error!(
                        event = %envelope.event_id,
                        failure_class = %transport_fault.failure_class(),
                        "📡 [EXPIRY_SCHEDULER]: credit.expired publish collapsed."
                    );
                }
            }
            None => {
                if let Err(transport_fault) = self
                    .state
                    .publisher
                    .publish_broadcast(
                        "credit.expired",
                        &tenant_label,
                        entity_identifier,
                        event_data,
                        "system",
                    )
                    .await
                {
                    error!(
                        failure_class = %transport_fault.failure_class(),
                        "📡 [EXPIRY_SCHEDULER]: credit.expired broadcast collapsed."
                    );
                }
            }
        }
    }
}
