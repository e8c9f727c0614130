// [apps/orchestrator/tests/autonomous_daemons.test.rs]
/**
 * =================================================================
 * APARATO: AUTONOMOUS DAEMONS TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPIRACIÓN PROGRAMADA, REINTENTOS Y ACUSES
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use meridian_domain_models::allocation::SeasonalCreditKind;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::TransactionKind;
use meridian_domain_models::events::{AcknowledgmentStatus, InterAppEnvelope};
use meridian_infra_fabric::{
    InterAppPublisher, MessageFabric, INTER_APP_BROADCAST_EXCHANGE, INTER_APP_EVENTS_EXCHANGE,
};
use meridian_infra_store::repositories::{
    AllocationDraft, AllocationDrawOutcome, AllocationOutcome, CreditInstruction, RETRY_CEILING,
};
use meridian_infra_store::CreditStoreClient;
use meridian_orchestrator::prelude::*;
use meridian_orchestrator::services::{AckRetryScanner, ExpirySweepScheduler};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

async fn ignite_state(memory_label: &str) -> AppState {
    let store_client = CreditStoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("store ignition");

    let fabric = MessageFabric::ignite();
    let control_conduit = fabric.dial().expect("dial");
    control_conduit
        .bind_queue("crm-events", INTER_APP_EVENTS_EXCHANGE, "crm.#")
        .await
        .expect("bind crm");
    control_conduit
        .bind_queue("expired-broadcast", INTER_APP_BROADCAST_EXCHANGE, "#")
        .await
        .expect("bind broadcast");

    let publisher = InterAppPublisher::ignite("credit-core", fabric.clone()).expect("publisher");
    let checkout_gateway =
        Arc::new(CheckoutGateway::new(None, "http://localhost:3000".to_string()));

    AppState::new(
        store_client,
        fabric,
        publisher,
        checkout_gateway,
        "credit-core".to_string(),
        vec!["crm".to_string()],
    )
}

#[tokio::test]
async fn certify_scheduled_expiry_sweep_scenario() {
    println!("\n⏳ [PROVING_GROUNDS]: Scenario S4 — scheduled expiry sweep...");

    let state = ignite_state("daemon_expiry").await;
    let tenant = Uuid::new_v4();
    let context = TenantContext::for_tenant(tenant);
    let entity = Uuid::new_v4();

    // Siembra S4: 130 comprados + cubeta 100; 30 consumidos de la
    // cubeta dejan el balance en 200 con 70 remanentes.
    state
        .ledger_engine
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 130.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: None,
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("seed");

    let bucket = match state
        .allocation_engine
        .create_allocation(
            &context,
            AllocationDraft {
                entity_identifier: entity,
                amount: 100.0,
                credit_kind: SeasonalCreditKind::Seasonal,
                target_application: None,
                campaign_identifier: Some("winter_burst".to_string()),
                campaign_name: None,
                expires_at: Utc::now() + ChronoDuration::milliseconds(400),
                initiated_by: None,
            },
        )
        .await
        .expect("bucket")
    {
        AllocationOutcome::Created { allocation, .. } => allocation,
        other => panic!("{:?}", other),
    };

    let drained = state
        .allocation_engine
        .consume_from_allocations(&context, entity, 30.0, "crm.leads.create", None)
        .await
        .expect("drain");
    assert!(matches!(drained, AllocationDrawOutcome::Drawn { .. }));

    tokio::time::sleep(Duration::from_millis(600)).await;

    // Un tick del scheduler: finaliza, deduce y publica.
    let (_shutdown_sender, shutdown_receiver) = watch::channel(false);
    let scheduler =
        ExpirySweepScheduler::new(state.clone(), Duration::from_secs(60), shutdown_receiver);
    let report = scheduler.sweep_once().await;

    assert_eq!(report.swept, 1);
    assert_eq!(report.finalized, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.drift_raised);

    let balance = state
        .ledger_engine
        .get_balance(&context, entity)
        .await
        .expect("balance")
        .available_credits;
    assert_eq!(balance, 130.0, "S4_FAULT: unused credits must be deducted");

    let history = state
        .ledger_engine
        .transaction_history(&context, entity, 10, 0)
        .await
        .expect("history");
    let expiry_row = history
        .iter()
        .find(|row| row.transaction_kind == TransactionKind::Expiry)
        .expect("expiry row");
    assert_eq!(expiry_row.amount, -70.0);
    assert_eq!(
        expiry_row.operation_code.as_deref(),
        Some(format!("credit_expiry:primary_org:{}", bucket.allocation_identifier).as_str())
    );

    // La cubeta sin silo publica 'credit.expired' en difusión.
    state.fabric.ensure_group("expired-broadcast", "s4-audit");
    let broadcast_batch = state
        .fabric
        .read_new("expired-broadcast", "s4-audit", "auditor", 16, Duration::from_millis(300))
        .await;
    assert!(broadcast_batch
        .iter()
        .any(|delivery| delivery.message.envelope.event_type == "credit.expired"));

    // El tick siguiente no encuentra residuo.
    let idle_report = scheduler.sweep_once().await;
    assert_eq!(idle_report.swept, 0);

    println!("   ✅ [SUCCESS]: S4 certified end to end.");
}

#[tokio::test]
async fn certify_retry_scanner_and_acknowledgment_settlement() {
    println!("\n🔁 [PROVING_GROUNDS]: Auditing retry relay + settlement loop...");

    let state = ignite_state("daemon_retry").await;
    let (shutdown_sender, shutdown_receiver) = watch::channel(false);

    // Oyente de acuses en línea.
    let listener = meridian_orchestrator::services::AcknowledgmentListener::new(
        state.clone(),
        shutdown_receiver.clone(),
    );
    let listener_handle = listener.spawn().await.expect("listener online");

    // Fila de auditoría envejecida sin acuse (publicación perdida).
    let stale_envelope = InterAppEnvelope {
        event_id: "inter_1767225600000_relay001".to_string(),
        event_type: "credit.consumed".to_string(),
        source_application: "credit-core".to_string(),
        target_application: "crm".to_string(),
        tenant_id: Uuid::new_v4().to_string(),
        entity_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now() - ChronoDuration::minutes(10),
        event_data: json!({ "operationCode": "crm.leads.create", "amount": -1.0, "newBalance": 4.0 }),
        published_by: "system".to_string(),
    };
    state
        .event_audit
        .record_published(&stale_envelope, "crm.credit.consumed")
        .await
        .expect("audit row");

    let scanner = AckRetryScanner::new(
        state.clone(),
        Duration::from_secs(60),
        5,
        shutdown_receiver.clone(),
    );
    let report = scanner.scan_once().await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.republished, 1, "RELAY_FAULT: stale pending row must be re-emitted");

    // La re-emisión preserva el eventId original en la cola del silo.
    state.fabric.ensure_group("crm-events", "relay-audit");
    let redelivered = state
        .fabric
        .read_new("crm-events", "relay-audit", "auditor", 16, Duration::from_millis(300))
        .await;
    assert!(redelivered
        .iter()
        .any(|delivery| delivery.message.envelope.event_id == stale_envelope.event_id));

    // El consumidor acusa; el oyente sella la fila de auditoría.
    state
        .publisher
        .publish_acknowledgment(
            &stale_envelope,
            AcknowledgmentStatus::Processed,
            json!({ "status": "lead_created" }),
        )
        .await
        .expect("acknowledgment publish");

    let mut settlement_confirmed = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if state.event_audit.pending_count().await.expect("count") == 0 {
            settlement_confirmed = true;
            break;
        }
    }
    assert!(settlement_confirmed, "SETTLEMENT_FAULT: audit row never settled");

    shutdown_sender.send(true).expect("shutdown");
    tokio::time::timeout(Duration::from_secs(3), listener_handle)
        .await
        .expect("listener shutdown")
        .expect("join");

    println!("   ✅ [SUCCESS]: Relay + settlement certified.");
}

#[tokio::test]
async fn certify_retry_exhaustion_is_sealed_terminally() {
    let state = ignite_state("daemon_exhaustion").await;
    let (_shutdown_sender, shutdown_receiver) = watch::channel(false);

    let doomed_envelope = InterAppEnvelope {
        event_id: "inter_1767225600000_doomed01".to_string(),
        event_type: "credit.consumed".to_string(),
        source_application: "credit-core".to_string(),
        target_application: "billing".to_string(),
        tenant_id: Uuid::new_v4().to_string(),
        entity_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now() - ChronoDuration::minutes(30),
        event_data: json!({ "operationCode": "billing.invoices.send", "amount": -1.0, "newBalance": 1.0 }),
        published_by: "system".to_string(),
    };
    state
        .event_audit
        .record_published(&doomed_envelope, "billing.credit.consumed")
        .await
        .expect("audit row");

    for _ in 0..RETRY_CEILING {
        state.event_audit.increment_retry(&doomed_envelope.event_id).await.expect("increment");
    }

    let scanner =
        AckRetryScanner::new(state.clone(), Duration::from_secs(60), 5, shutdown_receiver);
    let report = scanner.scan_once().await;

    assert_eq!(report.exhausted, 1, "EXHAUSTION_FAULT: ceiling must seal the row");
    assert_eq!(state.event_audit.pending_count().await.expect("count"), 0);

    // El siguiente escaneo no encuentra residuo.
    let idle_report = scanner.scan_once().await;
    assert_eq!(idle_report.scanned, 0);
}
