// [apps/orchestrator/src/services/retry_scanner.rs]
/*!
 * =================================================================
 * APARATO: ACK RETRY SCANNER (V3.1 - AT-LEAST-ONCE RELAY)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: RE-EMISIÓN DE EVENTOS SIN ACUSE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LEDGER-DRIVEN: Lee la auditoría de eventos publicados cuyos
 *    acuses no llegaron en N minutos (5 nominales) y re-emite el
 *    sobre ORIGINAL, preservando el eventId para la defensa
 *    idempotente aguas abajo.
 * 2. CEILING: Cinco reintentos; el agotamiento sella la fila como
 *    'retry_exhausted' de forma terminal.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use meridian_infra_store::repositories::RETRY_CEILING;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

/// Ráfaga máxima de filas por escaneo.
const SCAN_BATCH_CEILING: i64 = 25;

/// Resultado observable de un escaneo.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    pub scanned: usize,
    pub republished: usize,
    pub exhausted: usize,
}

pub struct AckRetryScanner {
    state: AppState,
    scan_budget: Duration,
    /// Antigüedad mínima de una fila pendiente antes de re-emitirla.
    pending_grace: ChronoDuration,
    shutdown_signal: watch::Receiver<bool>,
}

impl AckRetryScanner {
    pub fn new(
        state: AppState,
        scan_budget: Duration,
        pending_grace_minutes: i64,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            scan_budget,
            pending_grace: ChronoDuration::minutes(pending_grace_minutes),
            shutdown_signal,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("🔁 [RETRY_SCANNER]: Relay daemon online (scan {:?}).", self.scan_budget);
            let mut scan_ticker = interval(self.scan_budget);
            scan_ticker.tick().await;

            let mut shutdown_watch = self.shutdown_signal.clone();
            loop {
                tokio::select! {
                    _ = scan_ticker.tick() => {
                        let report = self.scan_once().await;
                        if report.scanned > 0 {
                            info!(
                                scanned = report.scanned,
                                republished = report.republished,
                                exhausted = report.exhausted,
                                "🔁 [RETRY_SCANNER]: Scan completed."
                            );
                        }
                    }
                    _ = shutdown_watch.changed() => {
                        if *shutdown_watch.borrow() {
                            info!("🛑 [RETRY_SCANNER]: Shutdown honored between scans.");
                            return;
                        }
                    }
                }
            }
        })
    }

    /// Un escaneo completo del rastro pendiente.
    #[instrument(skip(self))]
    pub async fn scan_once(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let pending_threshold = Utc::now() - self.pending_grace;

        let unsettled_rows = match self
            .state
            .event_audit
            .fetch_unsettled(pending_threshold, SCAN_BATCH_CEILING)
            .await
        {
            Ok(unsettled_rows) => unsettled_rows,
            Err(scan_fault) => {
                error!("❌ [RETRY_SCANNER]: Audit scan failed: {}", scan_fault);
                return report;
            }
        };

        report.scanned = unsettled_rows.len();

        for unsettled in unsettled_rows {
            // Techo alcanzado: sellado terminal 'retry_exhausted'.
            if unsettled.retry_count >= RETRY_CEILING {
                if let Err(seal_fault) = self
                    .state
                    .event_audit
                    .mark_retry_exhausted(&unsettled.event_identifier)
                    .await
                {
                    error!(
                        event = %unsettled.event_identifier,
                        "❌ [RETRY_SCANNER]: Exhaustion sealing failed: {}",
                        seal_fault
                    );
                    continue;
                }
                report.exhausted += 1;
                error!(
                    event = %unsettled.event_identifier,
                    retries = unsettled.retry_count,
                    failure_class = "retry_exhausted",
                    "💀 [RETRY_SCANNER]: Retry ceiling exhausted. Row sealed."
                );
                continue;
            }

            if let Err(increment_fault) =
                self.state.event_audit.increment_retry(&unsettled.event_identifier).await
            {
                error!(
                    event = %unsettled.event_identifier,
                    "❌ [RETRY_SCANNER]: Retry increment failed: {}",
                    increment_fault
                );
                continue;
            }

            // Re-emisión del sobre ORIGINAL (mismo eventId).
            match self.state.publisher.publish_envelope(&unsettled.envelope).await {
                Ok(_) => {
                    report.republished += 1;
                    info!(
                        event = %unsettled.event_identifier,
                        attempt = unsettled.retry_count + 1,
                        "🔁 [RETRY_SCANNER]: Unacknowledged event re-emitted."
                    );
                }
                Err(transport_fault) => {
                    warn!(
                        event = %unsettled.event_identifier,
                        failure_class = %transport_fault.failure_class(),
                        "⚠️ [RETRY_SCANNER]: Re-emission failed; next scan retries."
                    );
                }
            }
        }

        report
    }
}
