// [libs/infra/store/tests/event_audit_ledger.test.rs]
/**
 * =================================================================
 * APARATO: EVENT AUDIT LEDGER TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-STORE)
 * RESPONSABILIDAD: CERTIFICACIÓN DEL RASTRO DE PUBLICACIÓN Y ACUSES
 * =================================================================
 */

use chrono::{Duration, Utc};
use meridian_domain_models::events::{AcknowledgmentStatus, InterAppEnvelope};
use meridian_domain_models::reliability::FailureClass;
use meridian_infra_store::repositories::{EventAuditRepository, RETRY_CEILING};
use meridian_infra_store::CreditStoreClient;
use serde_json::json;

fn forge_envelope(event_identifier: &str) -> InterAppEnvelope {
    InterAppEnvelope {
        event_id: event_identifier.to_string(),
        event_type: "credit.consumed".to_string(),
        source_application: "credit-core".to_string(),
        target_application: "crm".to_string(),
        tenant_id: uuid::Uuid::new_v4().to_string(),
        entity_id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now() - Duration::minutes(10),
        event_data: json!({ "operationCode": "crm.leads.create", "amount": -2.0, "newBalance": 8.0 }),
        published_by: "system".to_string(),
    }
}

#[tokio::test]
async fn certify_outbox_discipline_and_settlement() {
    println!("\n📮 [PROVING_GROUNDS]: Auditing event audit ledger strata...");

    let client =
        CreditStoreClient::connect("file:event_audit_test?mode=memory&cache=shared", None)
            .await
            .expect("store ignition");
    let audit = EventAuditRepository::new(client);

    let envelope = forge_envelope("inter_1767225600000_aa11bb22");
    audit.record_published(&envelope, "crm.credit.consumed").await.expect("record");

    // La re-inserción del mismo evento (re-emisión) es un no-op.
    audit.record_published(&envelope, "crm.credit.consumed").await.expect("record replay");
    assert_eq!(audit.pending_count().await.expect("count"), 1);

    // El escáner localiza la fila pendiente más antigua que el umbral.
    let unsettled = audit
        .fetch_unsettled(Utc::now() - Duration::minutes(5), 10)
        .await
        .expect("fetch unsettled");
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].event_identifier, envelope.event_id);
    assert_eq!(unsettled[0].routing_key, "crm.credit.consumed");
    assert_eq!(unsettled[0].envelope.event_type, "credit.consumed");

    // El acuse positivo sella la fila y la retira del barrido.
    audit
        .settle(&envelope.event_id, AcknowledgmentStatus::Processed, None)
        .await
        .expect("settle");
    assert_eq!(audit.pending_count().await.expect("count"), 0);

    let drained = audit
        .fetch_unsettled(Utc::now() - Duration::minutes(5), 10)
        .await
        .expect("fetch after settle");
    assert!(drained.is_empty());

    println!("   ✅ [SUCCESS]: Outbox discipline certified.");
}

#[tokio::test]
async fn certify_retry_ceiling_seals_exhaustion() {
    let client =
        CreditStoreClient::connect("file:event_audit_retry_test?mode=memory&cache=shared", None)
            .await
            .expect("store ignition");
    let audit = EventAuditRepository::new(client);

    let envelope = forge_envelope("inter_1767225600000_cc33dd44");
    audit.record_published(&envelope, "crm.credit.consumed").await.expect("record");

    // Cinco reintentos consumen el techo.
    for _ in 0..RETRY_CEILING {
        audit.increment_retry(&envelope.event_id).await.expect("increment");
    }

    // Al techo, la fila sigue visible para que el escáner la selle.
    let unsettled = audit
        .fetch_unsettled(Utc::now() - Duration::minutes(5), 10)
        .await
        .expect("fetch at ceiling");
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].retry_count, RETRY_CEILING);

    // El sellado terminal clasifica 'retry_exhausted' y la retira.
    audit.mark_retry_exhausted(&envelope.event_id).await.expect("seal exhaustion");
    assert_eq!(audit.pending_count().await.expect("count"), 0);
    let drained = audit
        .fetch_unsettled(Utc::now() - Duration::minutes(5), 10)
        .await
        .expect("fetch after seal");
    assert!(drained.is_empty(), "RETRY_FAULT: sealed row must leave the scan");

    // Un acuse tardío de fallo clasificado también es persistible.
    let late_envelope = forge_envelope("inter_1767225600000_ee55ff66");
    audit.record_published(&late_envelope, "crm.credit.consumed").await.expect("record");
    audit
        .settle(
            &late_envelope.event_id,
            AcknowledgmentStatus::Failed,
            Some(FailureClass::ConsumerProcessingFailure),
        )
        .await
        .expect("settle failed");
    assert_eq!(audit.pending_count().await.expect("count"), 0);
}
