// [libs/infra/store/tests/ledger_engine_integrity.test.rs]
/**
 * =================================================================
 * APARATO: LEDGER ENGINE INTEGRITY TEST (V5.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-STORE)
 * RESPONSABILIDAD: CERTIFICACIÓN DE LA TRIPLETA, LA CADENA Y CB-1
 *
 * # Mathematical Proof (Chain Audit):
 * Recorre el historial en orden cronológico y verifica que cada
 * asiento cumpla new = previous + amount y que encadene con el
 * asiento anterior de la misma entidad; el balance final coincide
 * con el 'new_balance' del último asiento.
 * =================================================================
 */

use meridian_domain_models::context::TenantContext;
use meridian_domain_models::credits::{LedgerRefusal, TransactionKind};
use meridian_infra_store::repositories::{
    CreditInstruction, DebitInstruction, LedgerEngine, LedgerOutcome, TransferOutcome,
};
use meridian_infra_store::CreditStoreClient;
use uuid::Uuid;

async fn ignite_store(memory_label: &str) -> CreditStoreClient {
    let memory_url = format!("file:{}?mode=memory&cache=shared", memory_label);
    CreditStoreClient::connect(&memory_url, None)
        .await
        .expect("CRITICAL_FAULT: In-memory store ignition failed.")
}

#[tokio::test]
async fn certify_mutation_triple_and_chain() {
    println!("\n💳 [PROVING_GROUNDS]: Auditing ledger triple coupling...");

    let client = ignite_store("ledger_integrity_chain").await;
    let ledger = LedgerEngine::new(client);

    let tenant = Uuid::new_v4();
    let entity = Uuid::new_v4();
    let context = TenantContext::for_tenant(tenant);

    // 1. ACREDITACIÓN GÉNESIS: 0 -> 1000.
    let outcome = ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 1000.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: Some("purchase:cs_genesis".to_string()),
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("credit must not fail");

    let receipt = match outcome {
        LedgerOutcome::Applied(receipt) => receipt,
        other => panic!("INTEGRITY_COLLAPSE: credit refused: {:?}", other),
    };
    assert_eq!(receipt.previous_balance, 0.0);
    assert_eq!(receipt.new_balance, 1000.0);

    // 2. DÉBITO DE CONSUMO: 1000 -> 998.
    let outcome = ledger
        .debit(
            &context,
            DebitInstruction {
                entity_identifier: entity,
                amount: 2.0,
                operation_code: "crm.leads.create".to_string(),
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("debit must not fail");
    assert!(matches!(outcome, LedgerOutcome::Applied(ref r) if r.new_balance == 998.0));

    // 3. AUDITORÍA DE LA CADENA (LT-1 / LT-2).
    let mut history = ledger
        .transaction_history(&context, entity, 50, 0)
        .await
        .expect("history read");
    history.reverse(); // Orden cronológico ascendente.

    assert_eq!(history.len(), 2);
    let mut prior_new_balance: Option<f64> = None;
    for ledger_row in &history {
        assert_eq!(
            ledger_row.new_balance,
            ledger_row.previous_balance + ledger_row.amount,
            "LT1_VIOLATION at {}",
            ledger_row.transaction_identifier
        );
        if let Some(expected_previous) = prior_new_balance {
            assert_eq!(
                ledger_row.previous_balance, expected_previous,
                "LT2_VIOLATION: chain break at {}",
                ledger_row.transaction_identifier
            );
        }
        prior_new_balance = Some(ledger_row.new_balance);
    }

    let balance = ledger.get_balance(&context, entity).await.expect("balance read");
    assert_eq!(balance.available_credits, 998.0);
    assert_eq!(Some(balance.available_credits), prior_new_balance);

    println!("   ✅ [SUCCESS]: Triple coupling and chain certified.");
}

#[tokio::test]
async fn certify_insufficient_credits_writes_nothing() {
    let client = ignite_store("ledger_integrity_insufficient").await;
    let ledger = LedgerEngine::new(client);

    let context = TenantContext::for_tenant(Uuid::new_v4());
    let entity = Uuid::new_v4();

    ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 0.3,
                transaction_kind: TransactionKind::Purchase,
                operation_code: Some("purchase:cs_tiny".to_string()),
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("credit");

    let outcome = ledger
        .debit(
            &context,
            DebitInstruction {
                entity_identifier: entity,
                amount: 2.0,
                operation_code: "crm.leads.create".to_string(),
                initiated_by: None,
                idempotency_key: None,
            },
        )
        .await
        .expect("debit must not error");

    match outcome {
        LedgerOutcome::Refused(LedgerRefusal::InsufficientCredits { available, required }) => {
            assert_eq!(available, 0.3);
            assert_eq!(required, 2.0);
        }
        other => panic!("CB1_FAULT: expected refusal, got {:?}", other),
    }

    // Ni asiento nuevo ni mutación de balance.
    let history = ledger.transaction_history(&context, entity, 10, 0).await.expect("history");
    assert_eq!(history.len(), 1);
    let balance = ledger.get_balance(&context, entity).await.expect("balance");
    assert_eq!(balance.available_credits, 0.3);
}

#[tokio::test]
async fn certify_non_positive_amounts_are_refused() {
    let client = ignite_store("ledger_integrity_invalid").await;
    let ledger = LedgerEngine::new(client);
    let context = TenantContext::for_tenant(Uuid::new_v4());
    let entity = Uuid::new_v4();

    for invalid_amount in [0.0, -5.0] {
        let outcome = ledger
            .credit(
                &context,
                CreditInstruction {
                    entity_identifier: entity,
                    amount: invalid_amount,
                    transaction_kind: TransactionKind::Purchase,
                    operation_code: None,
                    initiated_by: None,
                    idempotency_key: None,
                },
            )
            .await
            .expect("credit must not error");
        assert!(
            matches!(outcome, LedgerOutcome::Refused(LedgerRefusal::InvalidAmount { .. })),
            "INVALID_AMOUNT_FAULT for {}",
            invalid_amount
        );
    }
}

#[tokio::test]
async fn certify_transfer_writes_paired_rows() {
    println!("\n💳 [PROVING_GROUNDS]: Auditing inter-entity transfer strata...");

    let client = ignite_store("ledger_integrity_transfer").await;
    let ledger = LedgerEngine::new(client);

    let context = TenantContext::for_tenant(Uuid::new_v4());
    let source_entity = Uuid::new_v4();
    let destination_entity = Uuid::new_v4();

    for (entity, amount) in [(source_entity, 100.0), (destination_entity, 20.0)] {
        ledger
            .credit(
                &context,
                CreditInstruction {
                    entity_identifier: entity,
                    amount,
                    transaction_kind: TransactionKind::Purchase,
                    operation_code: None,
                    initiated_by: None,
                    idempotency_key: None,
                },
            )
            .await
            .expect("seed credit");
    }

    let outcome = ledger
        .transfer(&context, source_entity, destination_entity, 30.0, None)
        .await
        .expect("transfer must not error");

    match outcome {
        TransferOutcome::Applied { outgoing, incoming } => {
            assert_eq!(outgoing.new_balance, 70.0);
            assert_eq!(incoming.new_balance, 50.0);
        }
        other => panic!("TRANSFER_FAULT: {:?}", other),
    }

    let source_history =
        ledger.transaction_history(&context, source_entity, 10, 0).await.expect("history");
    assert_eq!(source_history[0].transaction_kind, TransactionKind::TransferOut);
    assert_eq!(source_history[0].amount, -30.0);

    let destination_history = ledger
        .transaction_history(&context, destination_entity, 10, 0)
        .await
        .expect("history");
    assert_eq!(destination_history[0].transaction_kind, TransactionKind::TransferIn);
    assert_eq!(destination_history[0].amount, 30.0);

    // Débito corto: rehusado sin tocar ninguno de los dos balances.
    let refused = ledger
        .transfer(&context, source_entity, destination_entity, 500.0, None)
        .await
        .expect("transfer must not error");
    assert!(matches!(refused, TransferOutcome::Refused(LedgerRefusal::InsufficientCredits { .. })));

    let source_balance =
        ledger.get_balance(&context, source_entity).await.expect("balance").available_credits;
    assert_eq!(source_balance, 70.0);

    println!("   ✅ [SUCCESS]: Paired transfer rows certified.");
}

#[tokio::test]
async fn certify_idempotency_key_replays_receipt() {
    let client = ignite_store("ledger_integrity_idempotency").await;
    let ledger = LedgerEngine::new(client);
    let context = TenantContext::for_tenant(Uuid::new_v4());
    let entity = Uuid::new_v4();

    let first = ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 1000.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: Some("purchase:cs_replay_1".to_string()),
                initiated_by: None,
                idempotency_key: Some("cs_replay_1".to_string()),
            },
        )
        .await
        .expect("credit");

    let first_receipt = match first {
        LedgerOutcome::Applied(receipt) => receipt,
        other => panic!("unexpected {:?}", other),
    };
    assert!(!first_receipt.replayed);

    let second = ledger
        .credit(
            &context,
            CreditInstruction {
                entity_identifier: entity,
                amount: 1000.0,
                transaction_kind: TransactionKind::Purchase,
                operation_code: Some("purchase:cs_replay_1".to_string()),
                initiated_by: None,
                idempotency_key: Some("cs_replay_1".to_string()),
            },
        )
        .await
        .expect("credit replay");

    match second {
        LedgerOutcome::Applied(replayed_receipt) => {
            assert!(replayed_receipt.replayed, "IDEMPOTENCY_FAULT: duplicate write detected");
            assert_eq!(
                replayed_receipt.transaction_identifier,
                first_receipt.transaction_identifier
            );
        }
        other => panic!("unexpected {:?}", other),
    }

    let balance = ledger.get_balance(&context, entity).await.expect("balance");
    assert_eq!(balance.available_credits, 1000.0, "IDEMPOTENCY_FAULT: double crediting");
}
