// [apps/orchestrator/tests/config_inheritance_roundtrip.test.rs]
/**
 * =================================================================
 * APARATO: CONFIG INHERITANCE ROUNDTRIP TEST (V4.0 - VERB DRIVEN)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L1-APP)
 * RESPONSABILIDAD: CICLO COMPLETO DE HERENCIA VÍA VERBOS DE MANDO
 *
 * Conduce las escrituras por el servicio administrativo de tarifas:
 * con los tres ámbitos poblados gana la entidad; retirando fila a
 * fila la resolución degrada hasta el defecto de 1.0. Cada escritura
 * exitosa difunde su pulso 'credit_config_updated' por el fanout.
 * =================================================================
 */

use meridian_domain_models::config::ConfigSource;
use meridian_domain_models::context::TenantContext;
use meridian_domain_models::events::DomainEvent;
use meridian_domain_pricing::{resolve_effective_config, ConfigTemplate};
use meridian_infra_fabric::{
    InterAppPublisher, MessageFabric, INTER_APP_BROADCAST_EXCHANGE,
};
use meridian_infra_store::repositories::ConfigScope;
use meridian_infra_store::CreditStoreClient;
use meridian_orchestrator::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const OPERATION: &str = "crm.leads.create";

struct TariffRig {
    state: AppState,
    service: TariffAdministrationService,
    context: TenantContext,
    tenant: Uuid,
}

async fn ignite_rig(memory_label: &str) -> TariffRig {
    let store_client = CreditStoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("store ignition");

    let fabric = MessageFabric::ignite();
    let control_conduit = fabric.dial().expect("dial");
    // Cola observadora de los pulsos de invalidación de tarifas.
    control_conduit
        .bind_queue("tariff-broadcast", INTER_APP_BROADCAST_EXCHANGE, "#")
        .await
        .expect("bind broadcast");

    let publisher = InterAppPublisher::ignite("credit-core", fabric.clone()).expect("publisher");
    let checkout_gateway =
        Arc::new(CheckoutGateway::new(None, "http://localhost:3000".to_string()));

    let state = AppState::new(
        store_client,
        fabric,
        publisher,
        checkout_gateway,
        "credit-core".to_string(),
        vec!["crm".to_string()],
    );

    let tenant = Uuid::new_v4();
    let mut context = TenantContext::for_tenant(tenant);
    context.is_administrative = true;

    TariffRig { service: TariffAdministrationService::new(state.clone()), state, context, tenant }
}

async fn resolve_cost(rig: &TariffRig, entity: Uuid) -> (f64, ConfigSource) {
    let candidates = rig
        .state
        .config_repository
        .fetch_scope_candidates(&rig.context, OPERATION, Some(entity))
        .await
        .expect("candidates");
    let resolved = resolve_effective_config(OPERATION, candidates);
    (resolved.credit_cost, resolved.source)
}

/// Drena los pulsos fanout y decodifica sus payloads tipados.
async fn drain_config_pulses(rig: &TariffRig, group: &str) -> Vec<(Vec<String>, String)> {
    rig.state.fabric.ensure_group("tariff-broadcast", group);
    rig.state
        .fabric
        .read_new("tariff-broadcast", group, "auditor", 64, Duration::from_millis(300))
        .await
        .iter()
        .filter(|delivery| delivery.message.envelope.event_type == "credit_config_updated")
        .map(|delivery| {
            match delivery.message.envelope.decode_payload().expect("typed decode") {
                DomainEvent::CreditConfigUpdated(announcement) => {
                    (announcement.operation_codes, announcement.scope)
                }
                other => panic!("CONTRACT_FAULT: wrong variant decoded: {:?}", other),
            }
        })
        .collect()
}

#[tokio::test]
async fn certify_verb_driven_inheritance_degradation() {
    println!("\n🧬 [PROVING_GROUNDS]: Auditing verb-driven inheritance roundtrip...");

    let rig = ignite_rig("config_roundtrip_verbs").await;
    let entity = Uuid::new_v4();

    let mut template = ConfigTemplate::default();

    // 1. ESCRITURAS DE MANDO: global 2.0, inquilino 1.5, entidad 0.5.
    template.credit_cost = 2.0;
    let global_outcome = rig
        .service
        .set_operation_tariff(&rig.context, OPERATION, ConfigScope::Global, &template)
        .await
        .expect("global tariff");
    assert!(global_outcome.success);
    assert!(global_outcome.event_identifier.is_some(), "ANNOUNCE_FAULT: pulse mandated");

    template.credit_cost = 1.5;
    let tenant_outcome = rig
        .service
        .set_operation_tariff(
            &rig.context,
            OPERATION,
            ConfigScope::Tenant { tenant_identifier: rig.tenant },
            &template,
        )
        .await
        .expect("tenant tariff");
    assert!(tenant_outcome.success);

    template.credit_cost = 0.5;
    let entity_outcome = rig
        .service
        .set_operation_tariff(
            &rig.context,
            OPERATION,
            ConfigScope::Entity { tenant_identifier: rig.tenant, entity_identifier: entity },
            &template,
        )
        .await
        .expect("entity tariff");
    assert!(entity_outcome.success);

    // Cada escritura difundió su pulso con el código y el ámbito.
    // El grupo auditor es uno solo: el cursor avanza entre drenajes.
    let pulses = drain_config_pulses(&rig, "pulse-audit").await;
    assert_eq!(pulses.len(), 3, "ANNOUNCE_FAULT: one pulse per config write");
    for (operation_codes, _) in &pulses {
        assert_eq!(operation_codes, &vec![OPERATION.to_string()]);
    }
    assert!(pulses.iter().any(|(_, scope)| scope == "global"));
    assert!(pulses.iter().any(|(_, scope)| scope == "tenant"));
    assert!(pulses.iter().any(|(_, scope)| scope == "entity"));

    // 2. Los tres ámbitos vivos: gana la entidad.
    assert_eq!(resolve_cost(&rig, entity).await, (0.5, ConfigSource::Entity));

    // 3. Retiros escalonados: la resolución degrada ámbito a ámbito.
    let retired = rig
        .service
        .retire_operation_tariff(
            &rig.context,
            OPERATION,
            ConfigScope::Entity { tenant_identifier: rig.tenant, entity_identifier: entity },
        )
        .await
        .expect("retire entity");
    assert!(retired.success);
    assert_eq!(resolve_cost(&rig, entity).await, (1.5, ConfigSource::Tenant));

    rig.service
        .retire_operation_tariff(
            &rig.context,
            OPERATION,
            ConfigScope::Tenant { tenant_identifier: rig.tenant },
        )
        .await
        .expect("retire tenant");
    assert_eq!(resolve_cost(&rig, entity).await, (2.0, ConfigSource::Global));

    rig.service
        .retire_operation_tariff(&rig.context, OPERATION, ConfigScope::Global)
        .await
        .expect("retire global");
    assert_eq!(resolve_cost(&rig, entity).await, (1.0, ConfigSource::Default));

    // Los retiros también pulsaron la invalidación (mismo grupo: solo
    // los tres pulsos nuevos quedan por delante del cursor).
    let retirement_pulses = drain_config_pulses(&rig, "pulse-audit").await;
    assert_eq!(retirement_pulses.len(), 3, "ANNOUNCE_FAULT: one pulse per retirement");

    println!("   ✅ [SUCCESS]: Verb-driven inheritance roundtrip certified.");
}

#[tokio::test]
async fn certify_module_expansion_bulk_tariff_verb() {
    let rig = ignite_rig("config_module_verbs").await;

    // Registro del silo y su módulo con tres permisos, por mando.
    let registered = rig
        .service
        .register_application(&rig.context, "crm", "active")
        .await
        .expect("register app");
    assert!(registered.success);

    let permission_codes =
        vec!["create".to_string(), "update".to_string(), "archive".to_string()];
    let module_registered = rig
        .service
        .register_module(&rig.context, "crm", "leads", &permission_codes)
        .await
        .expect("register module");
    assert!(module_registered.success);

    // Tarificación masiva del módulo completo en un verbo.
    let mut template = ConfigTemplate::default();
    template.credit_cost = 0.25;
    let bulk_outcome = rig
        .service
        .apply_module_tariff(
            &rig.context,
            "crm",
            "leads",
            ConfigScope::Tenant { tenant_identifier: rig.tenant },
            &template,
        )
        .await
        .expect("bulk tariff");

    assert!(bulk_outcome.success);
    assert_eq!(bulk_outcome.operation_codes.len(), 3);
    assert!(bulk_outcome.operation_codes.contains(&"crm.leads.create".to_string()));
    assert!(bulk_outcome.operation_codes.contains(&"crm.leads.archive".to_string()));
    assert!(bulk_outcome.event_identifier.is_some());

    // El pulso transporta el conjunto completo expandido.
    let pulses = drain_config_pulses(&rig, "bulk-pulses").await;
    assert_eq!(pulses.len(), 1);
    assert_eq!(pulses[0].0.len(), 3, "EXPANSION_FAULT: full code set in the pulse");
    assert_eq!(pulses[0].1, "tenant");

    // Cada código expandido resuelve la tarifa del inquilino.
    for operation_code in &bulk_outcome.operation_codes {
        let candidates = rig
            .state
            .config_repository
            .fetch_scope_candidates(&rig.context, operation_code, None)
            .await
            .expect("candidates");
        let resolved = resolve_effective_config(operation_code, candidates);
        assert_eq!(resolved.credit_cost, 0.25);
        assert_eq!(resolved.source, ConfigSource::Tenant);
    }
}

#[tokio::test]
async fn certify_tariff_verbs_demand_administrative_context() {
    let rig = ignite_rig("config_guard_verbs").await;
    let plain_context = TenantContext::for_tenant(rig.tenant);

    let template = ConfigTemplate::default();
    let refused = rig
        .service
        .set_operation_tariff(&plain_context, OPERATION, ConfigScope::Global, &template)
        .await
        .expect("verb resolves");
    assert!(!refused.success);
    assert_eq!(refused.reason.as_deref(), Some("AdministrativeContextRequired"));

    let refused_registration = rig
        .service
        .register_application(&plain_context, "crm", "active")
        .await
        .expect("verb resolves");
    assert!(!refused_registration.success);

    // Gramática de silo y módulo: el mando rechaza códigos fuera del
    // alfabeto antes de tocar el catálogo.
    let malformed = rig
        .service
        .register_application(&rig.context, "CRM", "active")
        .await
        .expect("verb resolves");
    assert_eq!(malformed.reason.as_deref(), Some("InvalidApplicationCode"));

    let malformed_tariff = rig
        .service
        .set_operation_tariff(&rig.context, "crm.leads", ConfigScope::Global, &template)
        .await
        .expect("verb resolves");
    assert_eq!(malformed_tariff.reason.as_deref(), Some("InvalidOperationCode"));

    // Sin pulso alguno: ninguna escritura cristalizó.
    let pulses = drain_config_pulses(&rig, "guard-pulses").await;
    assert!(pulses.is_empty(), "ANNOUNCE_FAULT: refused verbs must not pulse");
}
