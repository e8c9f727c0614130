// [libs/domain/models/src/tests_contract.rs]
/**
 * =================================================================
 * APARATO: DOMAIN CONTRACT TEST (V3.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DEL SOBRE Y DE LA
 * DECODIFICACIÓN EXHAUSTIVA DE PAYLOADS
 *
 * # Mathematical Proof (Wire Parity):
 * Los silos TypeScript consumen el sobre en camelCase. Este aparato
 * certifica que la serialización Serde preserva el contrato campo a
 * campo y que todo discriminador desconocido colapsa en deriva de
 * contrato clasificada, jamás en un camino silencioso.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use meridian_domain_models::events::{
        AcknowledgmentRecord, AcknowledgmentStatus, ContractDrift, CreditConsumedData,
        DomainEvent, InterAppEnvelope,
    };
    use meridian_domain_models::reliability::{FailureClass, RELIABILITY_PROFILE};
    use serde_json::json;

    fn forge_envelope(event_type: &str, event_data: serde_json::Value) -> InterAppEnvelope {
        InterAppEnvelope {
            event_id: "inter_1767225600000_a1b2c3d4".to_string(),
            event_type: event_type.to_string(),
            source_application: "credit-core".to_string(),
            target_application: "crm".to_string(),
            tenant_id: "0b7e4a44-93b1-4d42-9f5a-2f6f3a1c9d10".to_string(),
            entity_id: "5e8d1c22-4f6a-4b1e-8b3a-9c0d2e4f6a8b".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            event_data,
            published_by: "system".to_string(),
        }
    }

    /**
     * CERTIFICACIÓN: El sobre viaja en camelCase bit-perfecto.
     */
    #[test]
    fn certify_envelope_camel_case_wire_parity() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating envelope camelCase parity...");

        let envelope = forge_envelope(
            "credit.consumed",
            json!({ "operationCode": "crm.leads.create", "amount": -0.5, "newBalance": 9.5 }),
        );

        let serialized_json = serde_json::to_string(&envelope)
            .expect("CRITICAL_FAULT: Envelope serialization collapsed.");

        for expected_field in [
            "\"eventId\"",
            "\"eventType\"",
            "\"sourceApplication\"",
            "\"targetApplication\"",
            "\"tenantId\"",
            "\"entityId\"",
            "\"timestamp\"",
            "\"eventData\"",
            "\"publishedBy\"",
        ] {
            assert!(
                serialized_json.contains(expected_field),
                "L2_WIRE_FAULT: Missing field {} in {}",
                expected_field,
                serialized_json
            );
        }

        let recovered: InterAppEnvelope = serde_json::from_str(&serialized_json)
            .expect("CRITICAL_FAULT: Envelope deserialization failed. Schema drift detected.");
        assert_eq!(recovered, envelope);

        println!("   ✅ [SUCCESS]: Envelope wire parity certified.");
    }

    /**
     * CERTIFICACIÓN: Decodificación tipada del payload de consumo.
     */
    #[test]
    fn certify_typed_payload_decoding() {
        let envelope = forge_envelope(
            "credit.consumed",
            json!({ "operationCode": "crm.leads.create", "amount": -0.5, "newBalance": 9.5 }),
        );

        match envelope.decode_payload().expect("decode must succeed") {
            DomainEvent::CreditConsumed(CreditConsumedData {
                operation_code,
                amount,
                new_balance,
                ..
            }) => {
                assert_eq!(operation_code, "crm.leads.create");
                assert_eq!(amount, -0.5);
                assert_eq!(new_balance, 9.5);
            }
            other => panic!("INTEGRITY_COLLAPSE: Wrong variant decoded: {:?}", other),
        }
    }

    /**
     * CERTIFICACIÓN: Las familias de directorio rutean por prefijo.
     */
    #[test]
    fn certify_directory_family_routing() {
        let payload = json!({ "subjectId": "user-77", "action": "created" });

        assert!(matches!(
            DomainEvent::decode("role.assigned", payload.clone()),
            Ok(DomainEvent::Role(_))
        ));
        assert!(matches!(
            DomainEvent::decode("user.created", payload.clone()),
            Ok(DomainEvent::User(_))
        ));
        assert!(matches!(
            DomainEvent::decode("org.renamed", payload.clone()),
            Ok(DomainEvent::Org(_))
        ));
        assert!(matches!(
            DomainEvent::decode("org_assignment.revoked", payload),
            Ok(DomainEvent::OrgAssignment(_))
        ));
    }

    /**
     * CERTIFICACIÓN: Tipo desconocido y payload mutilado son deriva de
     * contrato, nunca un camino silencioso.
     */
    #[test]
    fn certify_contract_drift_on_unknown_or_malformed() {
        let unknown = DomainEvent::decode("ledger.minted", json!({}));
        assert!(matches!(unknown, Err(ContractDrift::UnknownEventType(ref t)) if t == "ledger.minted"));

        let mutilated = DomainEvent::decode("credit.consumed", json!({ "amount": 1.0 }));
        assert!(matches!(mutilated, Err(ContractDrift::MalformedPayload { .. })));
    }

    /**
     * CERTIFICACIÓN: La taxonomía de nueve clases es cerrada y estable.
     */
    #[test]
    fn certify_failure_taxonomy_closure() {
        let all_classes = [
            FailureClass::BrokerUnavailable,
            FailureClass::UnroutableMessage,
            FailureClass::PublishConfirmTimeout,
            FailureClass::ConsumerProcessingFailure,
            FailureClass::RetryExhausted,
            FailureClass::AuthConfigurationError,
            FailureClass::ContractDrift,
            FailureClass::ReconciliationDrift,
            FailureClass::Unknown,
        ];

        assert_eq!(all_classes.len(), 9, "TAXONOMY_FAULT: Exactly nine classes are mandated.");
        for class in all_classes {
            assert_eq!(FailureClass::from_code(class.as_code()), class);
        }
        assert_eq!(FailureClass::from_code("cosmic_rays"), FailureClass::Unknown);
    }

    /**
     * CERTIFICACIÓN: Acuse espejo serializa estado y sello temporal.
     */
    #[test]
    fn certify_acknowledgment_record_contract() {
        let record = AcknowledgmentRecord {
            original_event_id: "inter_1767225600000_a1b2c3d4".to_string(),
            status: AcknowledgmentStatus::Failed,
            processed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 5).unwrap(),
            result: json!({ "error": "consumer_processing_failure" }),
        };

        let serialized = serde_json::to_string(&record).expect("serialization");
        assert!(serialized.contains("\"originalEventId\""));
        assert!(serialized.contains("\"failed\""));

        assert_eq!(RELIABILITY_PROFILE.publish_latency_p95_seconds, 5);
        assert_eq!(RELIABILITY_PROFILE.recovery_time_objective_minutes, 15);
    }
}
