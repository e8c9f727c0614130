// [libs/infra/fabric/tests/routing_grammar.test.rs]
/**
 * =================================================================
 * APARATO: ROUTING GRAMMAR TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-FABRIC)
 * RESPONSABILIDAD: CERTIFICACIÓN DE CLAVES, PATRONES Y EVENT IDS
 * =================================================================
 */

use meridian_infra_fabric::{
    acknowledgment_routing_key, derive_routing_key, forge_event_identifier, BindingPattern,
};
use proptest::prelude::*;

#[test]
fn certify_routing_key_derivation_contract() {
    println!("\n🧭 [PROVING_GROUNDS]: Validating routing key grammar...");

    // Propiedad 6: "{target}.{eventType con '_' -> '.'}".
    assert_eq!(derive_routing_key("crm", "credit.allocated"), "crm.credit.allocated");
    assert_eq!(derive_routing_key("operations", "credit.allocated"), "operations.credit.allocated");
    assert_eq!(
        derive_routing_key("crm", "credit_config_updated"),
        "crm.credit.config.updated"
    );
    assert_eq!(derive_routing_key("hr", "org_assignment.created"), "hr.org.assignment.created");

    assert_eq!(acknowledgment_routing_key("credit-core"), "acks.credit-core");

    println!("   ✅ [SUCCESS]: Derivation contract certified.");
}

#[test]
fn certify_event_identifier_grammar() {
    let event_identifier = forge_event_identifier();
    let segments: Vec<&str> = event_identifier.splitn(3, '_').collect();

    assert_eq!(segments.len(), 3, "ID_FAULT: 'inter_{{millis}}_{{random8}}' expected");
    assert_eq!(segments[0], "inter");
    assert!(segments[1].chars().all(|symbol| symbol.is_ascii_digit()));
    assert_eq!(segments[2].len(), 8);
    assert!(segments[2]
        .chars()
        .all(|symbol| symbol.is_ascii_lowercase() || symbol.is_ascii_digit()));

    // La entropía debe separar identificadores consecutivos.
    assert_ne!(forge_event_identifier(), forge_event_identifier());
}

#[test]
fn certify_consumer_binding_patterns() {
    let application_wide = BindingPattern::parse("crm.*").unwrap();
    let credit_scoped = BindingPattern::parse("crm.credit.*").unwrap();
    let greedy = BindingPattern::parse("crm.#").unwrap();

    let allocated_key = derive_routing_key("crm", "credit.allocated");
    assert!(credit_scoped.matches(&allocated_key));
    assert!(greedy.matches(&allocated_key));
    assert!(!application_wide.matches(&allocated_key), "'*' must consume exactly one segment");

    let foreign_key = derive_routing_key("hr", "credit.allocated");
    assert!(!credit_scoped.matches(&foreign_key));
    assert!(!greedy.matches(&foreign_key));
}

proptest! {
    /// Toda clave derivada de un tipo punteado es capturada por el
    /// patrón codicioso del silo objetivo y por ningún otro silo.
    #[test]
    fn certify_target_siloing(
        target in "[a-z][a-z0-9]{1,8}",
        foreign in "[a-z][a-z0-9]{1,8}",
        family in "[a-z]{2,8}",
        action in "[a-z]{2,8}",
    ) {
        prop_assume!(target != foreign);

        let event_type = format!("{}.{}", family, action);
        let routing_key = derive_routing_key(&target, &event_type);

        let own_pattern = BindingPattern::parse(&format!("{}.#", target)).unwrap();
        let foreign_pattern = BindingPattern::parse(&format!("{}.#", foreign)).unwrap();

        prop_assert!(own_pattern.matches(&routing_key));
        prop_assert!(!foreign_pattern.matches(&routing_key));
    }

    /// La conversión '_' -> '.' jamás produce segmentos vacíos para
    /// tipos bien formados.
    #[test]
    fn certify_underscore_projection(
        target in "[a-z][a-z0-9]{1,8}",
        left in "[a-z]{2,8}",
        right in "[a-z]{2,8}",
    ) {
        let event_type = format!("{}_{}", left, right);
        let routing_key = derive_routing_key(&target, &event_type);
        prop_assert!(routing_key.split('.').all(|segment| !segment.is_empty()));
        prop_assert!(routing_key.starts_with(&format!("{}.", target)), "routing key missing target prefix");
    }
}
