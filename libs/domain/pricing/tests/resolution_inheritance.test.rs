// [libs/domain/pricing/tests/resolution_inheritance.test.rs]
/**
 * =================================================================
 * APARATO: RESOLUTION INHERITANCE TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-PRICING)
 * RESPONSABILIDAD: CERTIFICACIÓN DE LA CADENA DE HERENCIA DE ÁMBITOS
 *
 * Reproduce el ciclo completo: con los tres ámbitos poblados gana la
 * entidad; retirando filas una a una, la resolución degrada a
 * inquilino, global y finalmente al defecto incorporado de 1.0.
 * =================================================================
 */

use meridian_domain_models::config::{
    AllowancePeriod, ConfigSource, OperationConfigRecord,
};
use meridian_domain_pricing::{resolve_effective_config, ScopeCandidates};
use uuid::Uuid;

const OPERATION: &str = "crm.leads.create";

fn forge_record(
    credit_cost: f64,
    tenant: Option<Uuid>,
    entity: Option<Uuid>,
    is_global: bool,
    is_active: bool,
) -> OperationConfigRecord {
    OperationConfigRecord {
        config_identifier: Uuid::new_v4(),
        operation_code: OPERATION.to_string(),
        tenant_identifier: tenant,
        entity_identifier: entity,
        is_global,
        credit_cost,
        unit: "operation".to_string(),
        unit_multiplier: 1.0,
        free_allowance: 0,
        free_allowance_period: AllowancePeriod::Month,
        volume_tiers: Vec::new(),
        allow_overage: true,
        overage_limit: None,
        overage_cost: None,
        is_active,
        priority: 0,
    }
}

#[test]
fn certify_inheritance_degrades_scope_by_scope() {
    println!("\n🧪 [PROVING_GROUNDS]: Auditing scope inheritance chain...");

    let tenant = Uuid::new_v4();
    let entity = Uuid::new_v4();

    let entity_row = forge_record(0.5, Some(tenant), Some(entity), false, true);
    let tenant_row = forge_record(1.5, Some(tenant), None, false, true);
    let global_row = forge_record(2.0, None, None, true, true);

    // 1. Los tres ámbitos poblados: gana la entidad.
    let resolved = resolve_effective_config(
        OPERATION,
        ScopeCandidates {
            entity_scoped: Some(entity_row.clone()),
            tenant_scoped: Some(tenant_row.clone()),
            global: Some(global_row.clone()),
        },
    );
    assert_eq!(resolved.credit_cost, 0.5);
    assert_eq!(resolved.source, ConfigSource::Entity);

    // 2. Sin fila de entidad: gana el inquilino.
    let resolved = resolve_effective_config(
        OPERATION,
        ScopeCandidates {
            entity_scoped: None,
            tenant_scoped: Some(tenant_row.clone()),
            global: Some(global_row.clone()),
        },
    );
    assert_eq!(resolved.credit_cost, 1.5);
    assert_eq!(resolved.source, ConfigSource::Tenant);

    // 3. Sin inquilino: gana la fila global.
    let resolved = resolve_effective_config(
        OPERATION,
        ScopeCandidates {
            entity_scoped: None,
            tenant_scoped: None,
            global: Some(global_row),
        },
    );
    assert_eq!(resolved.credit_cost, 2.0);
    assert_eq!(resolved.source, ConfigSource::Global);

    // 4. Vacío total: defecto incorporado de 1.0.
    let resolved = resolve_effective_config(OPERATION, ScopeCandidates::default());
    assert_eq!(resolved.credit_cost, 1.0);
    assert_eq!(resolved.source, ConfigSource::Default);
    assert!(resolved.allow_overage);
    assert_eq!(resolved.unit, "operation");

    println!("   ✅ [SUCCESS]: Inheritance chain certified scope by scope.");
}

#[test]
fn certify_inactive_rows_are_invisible_to_resolution() {
    let tenant = Uuid::new_v4();
    let entity = Uuid::new_v4();

    let dormant_entity_row = forge_record(0.5, Some(tenant), Some(entity), false, false);
    let tenant_row = forge_record(1.5, Some(tenant), None, false, true);

    let resolved = resolve_effective_config(
        OPERATION,
        ScopeCandidates {
            entity_scoped: Some(dormant_entity_row),
            tenant_scoped: Some(tenant_row),
            global: None,
        },
    );

    assert_eq!(resolved.source, ConfigSource::Tenant, "L2_RESOLUTION_FAULT: inactive row leaked");
    assert_eq!(resolved.credit_cost, 1.5);
}
