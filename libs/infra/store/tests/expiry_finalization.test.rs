// [libs/infra/store/tests/expiry_finalization.test.rs]
/**
 * =================================================================
 * APARATO: EXPIRY FINALIZATION TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-STORE)
 * RESPONSABILIDAD: CERTIFICACIÓN DE SA-2/SA-3 Y DEDUCCIÓN BEST-EFFORT
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use meridian_domain_models::allocation::SeasonalCreditKind;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::TransactionKind;
use meridian_infra_store::repositories::{
    AllocationDraft, AllocationDrawOutcome, AllocationEngine, AllocationOutcome,
    CreditInstruction, DebitInstruction, LedgerEngine, LedgerOutcome,
};
use meridian_infra_store::CreditStoreClient;
use std::time::Duration;
use uuid::Uuid;

async fn ignite(memory_label: &str) -> CreditStoreClient {
    CreditStoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("store ignition")
}

#[tokio::test]
async fn certify_expiry_deducts_unused_credits_in_one_unit() {
    println!("\n⏳ [PROVING_GROUNDS]: Auditing expiry finalization strata...");

    let client = ignite("expiry_deduction_test").await;
    let allocations = AllocationEngine::new(client.clone());
    let ledger = LedgerEngine::new(client);

    let tenant = Uuid::new_v4();
    let context = TenantContext::for_tenant(tenant);
    let entity = Uuid::new_v4();

    // Siembra: 130 comprados + cubeta de 100 = 230; consumo de 30
    // desde la cubeta deja el balance en 200 con 70 remanentes.
    ledger
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
        .expect("seed purchase");

    let bucket = match allocations
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
        .expect("create bucket")
    {
        AllocationOutcome::Created { allocation, .. } => allocation,
        other => panic!("{:?}", other),
    };

    let drained = allocations
        .consume_from_allocations(&context, entity, 30.0, "crm.leads.create", None)
        .await
        .expect("drain 30");
    assert!(matches!(drained, AllocationDrawOutcome::Drawn { .. }));

    let balance_before =
        ledger.get_balance(&context, entity).await.expect("balance").available_credits;
    assert_eq!(balance_before, 200.0);

    // La cubeta vence; el barrido administrativo la localiza.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let sweep_context = TenantContext::system_sweep();
    let due = allocations
        .sweep_due_allocations(&sweep_context, Utc::now(), 50)
        .await
        .expect("sweep");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].allocation_identifier, bucket.allocation_identifier);

    let finalization = allocations
        .finalize_expiry(&sweep_context.narrowed_to_tenant(tenant), &due[0])
        .await
        .expect("finalize");

    assert!(!finalization.already_finalized);
    assert_eq!(finalization.unused_credits, 70.0);
    assert_eq!(finalization.deducted_credits, 70.0);
    assert!(!finalization.drifted);

    // SA-2: expirado implica inactivo.
    let listed = allocations.list_for_entity(&context, entity, true).await.expect("list");
    let finalized_bucket = listed
        .iter()
        .find(|candidate| candidate.allocation_identifier == bucket.allocation_identifier)
        .expect("bucket listed");
    assert!(finalized_bucket.is_expired);
    assert!(!finalized_bucket.is_active, "SA2_VIOLATION: expired bucket still active");

    // SA-3: el balance perdió exactamente el remanente.
    let balance_after =
        ledger.get_balance(&context, entity).await.expect("balance").available_credits;
    assert_eq!(balance_after, 130.0);

    // El asiento de expiración porta el código canónico.
    let history = ledger.transaction_history(&context, entity, 10, 0).await.expect("history");
    let expiry_row = history
        .iter()
        .find(|ledger_row| ledger_row.transaction_kind == TransactionKind::Expiry)
        .expect("expiry row");
    assert_eq!(expiry_row.amount, -70.0);
    assert_eq!(
        expiry_row.operation_code.as_deref(),
        Some(format!("credit_expiry:primary_org:{}", bucket.allocation_identifier).as_str())
    );

    println!("   ✅ [SUCCESS]: SA-2/SA-3 finalization certified.");
}

#[tokio::test]
async fn certify_best_effort_deduction_reports_drift() {
    let client = ignite("expiry_drift_test").await;
    let allocations = AllocationEngine::new(client.clone());
    let ledger = LedgerEngine::new(client);

    let tenant = Uuid::new_v4();
    let context = TenantContext::for_tenant(tenant);
    let entity = Uuid::new_v4();

    // Cubeta de 50 sin consumir, pero el balance general fue drenado a
    // 10 por un débito ajeno: la deducción solo puede tomar 10.
    match allocations
        .create_allocation(
            &context,
            AllocationDraft {
                entity_identifier: entity,
                amount: 50.0,
                credit_kind: SeasonalCreditKind::Bonus,
                target_application: None,
                campaign_identifier: None,
                campaign_name: None,
                expires_at: Utc::now() + ChronoDuration::milliseconds(300),
                initiated_by: None,
            },
        )
        .await
        .expect("create bucket")
    {
        AllocationOutcome::Created { .. } => {}
        other => panic!("{:?}", other),
    }

    let drained = ledger
        .debit(
            &context,
            DebitInstruction {
                entity_identifier: entity,
                amount: 40.0,
                operation_code: "crm.leads.create".to_string(),
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("foreign debit");
    assert!(matches!(drained, LedgerOutcome::Applied(_)));

    tokio::time::sleep(Duration::from_millis(500)).await;

    let sweep_context = TenantContext::system_sweep();
    let due = allocations
        .sweep_due_allocations(&sweep_context, Utc::now(), 10)
        .await
        .expect("sweep");
    assert_eq!(due.len(), 1);

    let finalization = allocations
        .finalize_expiry(&sweep_context.narrowed_to_tenant(tenant), &due[0])
        .await
        .expect("finalize");

    assert_eq!(finalization.unused_credits, 50.0);
    assert_eq!(finalization.deducted_credits, 10.0);
    assert!(finalization.drifted, "DRIFT_FAULT: reconciliation drift must be flagged");

    let final_balance =
        ledger.get_balance(&context, entity).await.expect("balance").available_credits;
    assert_eq!(final_balance, 0.0, "CB1_VIOLATION: clamp at zero mandated");

    // La segunda finalización es un no-op detectable.
    let replay = allocations
        .finalize_expiry(&sweep_context.narrowed_to_tenant(tenant), &due[0])
        .await
        .expect("replay finalize");
    assert!(replay.already_finalized);
}
