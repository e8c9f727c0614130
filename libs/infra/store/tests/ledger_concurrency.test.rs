// [libs/infra/store/tests/ledger_concurrency.test.rs]
/**
 * =================================================================
 * APARATO: LEDGER CONCURRENCY TEST (V3.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-STORE)
 * RESPONSABILIDAD: SERIALIZACIÓN DE DÉBITOS CONCURRENTES
 *
 * # Mathematical Proof (Serialized Mutation):
 * Con balance B y débitos concurrentes a y b: si B ≥ a + b ambos
 * aplican y el final es B − a − b; si no, exactamente uno aplica y el
 * balance decrece solo por la magnitud exitosa. El candado IMMEDIATE
 * de la unidad garantiza la disciplina.
 * =================================================================
 */

use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::TransactionKind;
use meridian_infra_store::repositories::{
    CreditInstruction, DebitInstruction, LedgerEngine, LedgerOutcome,
};
use meridian_infra_store::{CreditStoreClient, StoreError};
use std::sync::Arc;
use uuid::Uuid;

/// Débito con tolerancia a congestión transitoria del candado.
async fn debit_with_patience(
    ledger: &LedgerEngine,
    context: &TenantContext,
    entity: Uuid,
    amount: f64,
) -> Result<LedgerOutcome, StoreError> {
    let mut remaining_attempts = 5;
    loop {
        match ledger
            .debit(
                context,
                DebitInstruction {
                    entity_identifier: entity,
                    amount,
                    operation_code: "crm.leads.create".to_string(),
                    initiated_by: None,
                    idempotency_key: None,
                },
            )
            .await
        {
            Ok(outcome) => return Ok(outcome),
            Err(congestion_fault) if remaining_attempts > 0 => {
                remaining_attempts -= 1;
                tracing::debug!("lock congestion, retrying: {}", congestion_fault);
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            }
            Err(terminal_fault) => return Err(terminal_fault),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn certify_concurrent_debits_serialize_on_the_balance_lock() {
    println!("\n⚔️  [PROVING_GROUNDS]: Stressing concurrent debit strata...");

    let client =
        CreditStoreClient::connect("file:ledger_concurrency_test?mode=memory&cache=shared", None)
            .await
            .expect("store ignition");
    let ledger = Arc::new(LedgerEngine::new(client));

    let tenant = Uuid::new_v4();
    let entity = Uuid::new_v4();
    let context = TenantContext::for_tenant(tenant);

    // Balance inicial B = 10; débitos a = 6, b = 7 (a + b > B).
    ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 10.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: None,
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("seed credit");

    let ledger_alpha = ledger.clone();
    let context_alpha = context.clone();
    let alpha_handle = tokio::spawn(async move {
        debit_with_patience(&ledger_alpha, &context_alpha, entity, 6.0).await
    });

    let ledger_beta = ledger.clone();
    let context_beta = context.clone();
    let beta_handle = tokio::spawn(async move {
        debit_with_patience(&ledger_beta, &context_beta, entity, 7.0).await
    });

    let alpha_outcome = alpha_handle.await.expect("join").expect("debit alpha");
    let beta_outcome = beta_handle.await.expect("join").expect("debit beta");

    let mut applied_magnitudes = Vec::new();
    for (magnitude, outcome) in [(6.0, &alpha_outcome), (7.0, &beta_outcome)] {
        if matches!(outcome, LedgerOutcome::Applied(_)) {
            applied_magnitudes.push(magnitude);
        }
    }

    assert_eq!(
        applied_magnitudes.len(),
        1,
        "SERIALIZATION_FAULT: exactly one debit must win when a + b > B"
    );

    let final_balance =
        ledger.get_balance(&context, entity).await.expect("balance").available_credits;
    assert_eq!(
        final_balance,
        10.0 - applied_magnitudes[0],
        "SERIALIZATION_FAULT: balance must decrease only by the winning magnitude"
    );

    // El Ledger registra exactamente el asiento ganador más la siembra.
    let history = ledger.transaction_history(&context, entity, 10, 0).await.expect("history");
    assert_eq!(history.len(), 2, "LEDGER_FAULT: refused debit must write no row");

    println!("   ✅ [SUCCESS]: Concurrent debits serialized. Winner: {}", applied_magnitudes[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn certify_concurrent_debits_both_apply_when_funded() {
    let client = CreditStoreClient::connect(
        "file:ledger_concurrency_funded_test?mode=memory&cache=shared",
        None,
    )
    .await
    .expect("store ignition");
    let ledger = Arc::new(LedgerEngine::new(client));

    let context = TenantContext::for_tenant(Uuid::new_v4());
    let entity = Uuid::new_v4();

    ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 20.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: None,
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("seed credit");

    let ledger_alpha = ledger.clone();
    let context_alpha = context.clone();
    let alpha_handle = tokio::spawn(async move {
        debit_with_patience(&ledger_alpha, &context_alpha, entity, 6.0).await
    });

    let ledger_beta = ledger.clone();
    let context_beta = context.clone();
    let beta_handle = tokio::spawn(async move {
        debit_with_patience(&ledger_beta, &context_beta, entity, 7.0).await
    });

    let alpha_outcome = alpha_handle.await.expect("join").expect("debit alpha");
    let beta_outcome = beta_handle.await.expect("join").expect("debit beta");

    assert!(matches!(alpha_outcome, LedgerOutcome::Applied(_)));
    assert!(matches!(beta_outcome, LedgerOutcome::Applied(_)));

    let final_balance =
        ledger.get_balance(&context, entity).await.expect("balance").available_credits;
    assert_eq!(final_balance, 7.0, "SERIALIZATION_FAULT: B - a - b expected");
}
