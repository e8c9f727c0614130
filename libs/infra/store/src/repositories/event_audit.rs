// [libs/infra/store/src/repositories/event_audit.rs]
/*!
 * =================================================================
 * APARATO: EVENT AUDIT LEDGER (V2.2 - RETRY SCANNER READY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RASTRO DURABLE DE EVENTOS PUBLICADOS Y ACUSES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. OUTBOX DISCIPLINE: La fila de auditoría se escribe ANTES del
 *    intento de publicación; un colapso de transporte deja el rastro
 *    para que el escáner de reintentos re-emita el sobre original.
 * 2. SETTLEMENT: El oyente de acuses sella 'processed' o 'failed' con
 *    la clase de fallo de la taxonomía cerrada.
 * 3. CEILING: Cinco reintentos; el agotamiento sella
 *    'retry_exhausted' de forma terminal.
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use crate::rows::{nullable_text, parse_instant, required_integer, required_text};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use meridian_domain_models::events::{AcknowledgmentStatus, InterAppEnvelope};
use meridian_domain_models::reliability::FailureClass;
use tracing::instrument;

/// Techo de reintentos del escáner.
pub const RETRY_CEILING: i64 = 5;

const RECORD_PUBLISHED_EVENT: &str = r#"
    INSERT INTO event_audit (
        event_id, tenant_id, entity_id, target_application, event_type,
        routing_key, envelope_json, published_at, ack_status, retry_count
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', 0)
    ON CONFLICT(event_id) DO NOTHING
"#;

const SETTLE_EVENT: &str = r#"
    UPDATE event_audit
    SET ack_status = ?2, ack_at = ?3, failure_class = ?4
    WHERE event_id = ?1
"#;

/// Filas pendientes más antiguas que el umbral. Incluye las que ya
/// alcanzaron el techo para que el escáner las selle como agotadas.
const SELECT_UNSETTLED: &str = r#"
    SELECT event_id, envelope_json, routing_key, retry_count, published_at
    FROM event_audit
    WHERE ack_status = 'pending' AND published_at <= ?1 AND retry_count <= ?2
    ORDER BY published_at ASC
    LIMIT ?3
"#;

const INCREMENT_RETRY: &str = r#"
    UPDATE event_audit
    SET retry_count = retry_count + 1
    WHERE event_id = ?1
"#;

/// Sellado terminal por agotamiento del techo de reintentos.
const MARK_RETRY_EXHAUSTED: &str = r#"
    UPDATE event_audit
    SET ack_status = 'failed', failure_class = 'retry_exhausted', ack_at = ?2
    WHERE event_id = ?1 AND ack_status = 'pending'
"#;

const COUNT_PENDING: &str = r#"
    SELECT COUNT(*) FROM event_audit WHERE ack_status = 'pending'
"#;

/// Fila del rastro pendiente de re-emisión.
#[derive(Debug, Clone)]
pub struct UnsettledEvent {
    pub event_identifier: String,
    pub envelope: InterAppEnvelope,
    pub routing_key: String,
    pub retry_count: i64,
    pub published_at: DateTime<Utc>,
}

pub struct EventAuditRepository {
    store_client: CreditStoreClient,
}

impl EventAuditRepository {
    pub fn new(store_client: CreditStoreClient) -> Self {
        Self { store_client }
    }

    /// Registra el sobre antes del intento de publicación.
    ///
    /// El plano de auditoría es infraestructural: corre fuera de las
    /// unidades de inquilino y la re-inserción del mismo evento es un
    /// no-op (re-emisiones del escáner).
    #[instrument(skip(self, envelope))]
    pub async fn record_published(
        &self,
        envelope: &InterAppEnvelope,
        routing_key: &str,
    ) -> Result<(), StoreError> {
        let envelope_json = serde_json::to_string(envelope)
            .map_err(|encoding_fault| StoreError::MappingError(encoding_fault.to_string()))?;

        let connection = self.store_client.get_connection()?;
        connection
            .execute(
                RECORD_PUBLISHED_EVENT,
                params![
                    envelope.event_id.clone(),
                    envelope.tenant_id.clone(),
                    envelope.entity_id.clone(),
                    envelope.target_application.clone(),
                    envelope.event_type.clone(),
                    routing_key.to_string(),
                    envelope_json,
                    envelope.timestamp.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Sella el acuse de un evento publicado.
    #[instrument(skip(self))]
    pub async fn settle(
        &self,
        event_identifier: &str,
        status: AcknowledgmentStatus,
        failure_class: Option<FailureClass>,
    ) -> Result<(), StoreError> {
        let status_code = match status {
            AcknowledgmentStatus::Processed => "processed",
            AcknowledgmentStatus::Failed => "failed",
        };

        let connection = self.store_client.get_connection()?;
        connection
            .execute(
                SETTLE_EVENT,
                params![
                    event_identifier.to_string(),
                    status_code,
                    Utc::now().to_rfc3339(),
                    nullable_text(failure_class.map(|class| class.as_code().to_string()))
                ],
            )
            .await?;
        Ok(())
    }

    /// Filas pendientes elegibles para re-emisión.
    pub async fn fetch_unsettled(
        &self,
        pending_since: DateTime<Utc>,
        scan_limit: i64,
    ) -> Result<Vec<UnsettledEvent>, StoreError> {
        let connection = self.store_client.get_connection()?;
        let mut query_results = connection
            .query(
                SELECT_UNSETTLED,
                params![pending_since.to_rfc3339(), RETRY_CEILING, scan_limit],
            )
            .await?;

        let mut unsettled_events = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            unsettled_events.push(map_unsettled_row(&data_row)?);
        }
        Ok(unsettled_events)
    }

    pub async fn increment_retry(&self, event_identifier: &str) -> Result<(), StoreError> {
        let connection = self.store_client.get_connection()?;
        connection
            .execute(INCREMENT_RETRY, params![event_identifier.to_string()])
            .await?;
        Ok(())
    }

    /// Sellado terminal de un evento que agotó el techo.
    pub async fn mark_retry_exhausted(&self, event_identifier: &str) -> Result<(), StoreError> {
        let connection = self.store_client.get_connection()?;
        connection
            .execute(
                MARK_RETRY_EXHAUSTED,
                params![event_identifier.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        let connection = self.store_client.get_connection()?;
        let mut query_results = connection.query(COUNT_PENDING, ()).await?;
        match query_results.next().await? {
            Some(data_row) => required_integer(&data_row, 0),
            None => Ok(0),
        }
    }
}

fn map_unsettled_row(data_row: &Row) -> Result<UnsettledEvent, StoreError> {
    let envelope_json = required_text(data_row, 1)?;
    let envelope: InterAppEnvelope = serde_json::from_str(&envelope_json)
        .map_err(|decoding_fault| StoreError::MappingError(decoding_fault.to_string()))?;

    Ok(UnsettledEvent {
        event_identifier: required_text(data_row, 0)?,
        envelope,
        routing_key: required_text(data_row, 2)?,
        retry_count: required_integer(data_row, 3)?,
        published_at: parse_instant(&required_text(data_row, 4)?)?,
    })
}
