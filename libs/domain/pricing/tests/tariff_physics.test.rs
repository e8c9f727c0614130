// [libs/domain/pricing/tests/tariff_physics.test.rs]
/**
 * =================================================================
 * APARATO: TARIFF PHYSICS TEST (V2.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-PRICING)
 * RESPONSABILIDAD: CERTIFICACIÓN DE ESCALONES, FRANQUICIAS Y EXCEDENTES
 * =================================================================
 */

use chrono::{TimeZone, Utc};
use meridian_domain_models::config::{AllowancePeriod, ResolvedConfig, VolumeTier};
use meridian_domain_models::credits::LedgerRefusal;
use meridian_domain_pricing::tariff::{allowance_period_start, quote};

fn base_config() -> ResolvedConfig {
    ResolvedConfig::built_in_default("crm.leads.create")
}

#[test]
fn certify_flat_tariff_multiplies_cost_and_quantity() {
    let mut config = base_config();
    config.credit_cost = 2.0;
    config.unit_multiplier = 1.0;

    let quotation = quote(&config, 3.0, 0.0, 0.0).expect("flat quote");
    assert_eq!(quotation.total_cost, 6.0);
    assert_eq!(quotation.billable_units, 3.0);
    assert_eq!(quotation.free_units, 0.0);
    assert_eq!(quotation.applied_tier_threshold, None);
}

#[test]
fn certify_volume_tier_with_largest_qualifying_threshold_wins() {
    let mut config = base_config();
    config.credit_cost = 2.0;
    config.volume_tiers = vec![
        VolumeTier { threshold: 100.0, cost: 1.5 },
        VolumeTier { threshold: 1000.0, cost: 1.0 },
        VolumeTier { threshold: 10_000.0, cost: 0.5 },
    ];

    // Uso del mes por debajo del primer umbral: costo base.
    let quotation = quote(&config, 1.0, 0.0, 40.0).expect("quote");
    assert_eq!(quotation.effective_unit_cost, 2.0);

    // Uso entre el segundo y el tercer umbral: gana 1000 -> 1.0.
    let quotation = quote(&config, 1.0, 0.0, 2_500.0).expect("quote");
    assert_eq!(quotation.effective_unit_cost, 1.0);
    assert_eq!(quotation.applied_tier_threshold, Some(1000.0));

    // Uso estratosférico: gana el mayor umbral calificado.
    let quotation = quote(&config, 4.0, 0.0, 50_000.0).expect("quote");
    assert_eq!(quotation.effective_unit_cost, 0.5);
    assert_eq!(quotation.total_cost, 2.0);
}

#[test]
fn certify_free_allowance_zeroes_units_inside_the_period() {
    let mut config = base_config();
    config.credit_cost = 2.0;
    config.free_allowance = 10;

    // Franquicia intacta: consumo íntegramente gratuito.
    let quotation = quote(&config, 4.0, 0.0, 0.0).expect("quote");
    assert_eq!(quotation.total_cost, 0.0);
    assert_eq!(quotation.free_units, 4.0);
    assert_eq!(quotation.billable_units, 0.0);

    // Franquicia parcialmente agotada: solo el excedente se tarifica.
    let quotation = quote(&config, 4.0, 8.0, 8.0).expect("quote");
    assert_eq!(quotation.free_units, 2.0);
    assert_eq!(quotation.billable_units, 2.0);
    assert_eq!(quotation.total_cost, 4.0);
}

#[test]
fn certify_overage_uses_single_configurable_cost() {
    let mut config = base_config();
    config.credit_cost = 2.0;
    config.free_allowance = 10;
    config.overage_cost = Some(3.0);

    let quotation = quote(&config, 4.0, 10.0, 10.0).expect("quote");
    assert_eq!(quotation.billable_units, 4.0);
    assert_eq!(quotation.total_cost, 12.0, "OVERAGE_FAULT: single configurable cost mandated");
}

#[test]
fn certify_overage_refusals() {
    let mut config = base_config();
    config.credit_cost = 2.0;
    config.free_allowance = 5;
    config.allow_overage = false;

    let refused = quote(&config, 6.0, 5.0, 5.0).expect_err("overage must be refused");
    assert!(matches!(refused, LedgerRefusal::OverageNotPermitted { .. }));

    // Con excedente autorizado pero acotado, superar el límite rechaza.
    config.allow_overage = true;
    config.overage_limit = Some(3.0);
    let refused = quote(&config, 9.0, 5.0, 5.0).expect_err("limit must bound the excess");
    assert!(matches!(refused, LedgerRefusal::OverageNotPermitted { .. }));

    // Dentro del límite, el excedente procede.
    let quotation = quote(&config, 3.0, 5.0, 5.0).expect("bounded excess proceeds");
    assert_eq!(quotation.billable_units, 3.0);
}

#[test]
fn certify_non_positive_quantities_are_invalid() {
    let config = base_config();
    for invalid_quantity in [0.0, -1.0, f64::NAN] {
        let refused = quote(&config, invalid_quantity, 0.0, 0.0)
            .expect_err("non-positive quantity must be refused");
        assert!(matches!(refused, LedgerRefusal::InvalidAmount { .. }));
    }
}

#[test]
fn certify_allowance_period_boundaries() {
    let reference = Utc.with_ymd_and_hms(2026, 7, 16, 13, 45, 12).unwrap();

    assert_eq!(
        allowance_period_start(AllowancePeriod::Day, reference),
        Utc.with_ymd_and_hms(2026, 7, 16, 0, 0, 0).unwrap()
    );
    // 2026-07-16 es jueves; la semana ISO abre el lunes 13.
    assert_eq!(
        allowance_period_start(AllowancePeriod::Week, reference),
        Utc.with_ymd_and_hms(2026, 7, 13, 0, 0, 0).unwrap()
    );
    assert_eq!(
        allowance_period_start(AllowancePeriod::Month, reference),
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        allowance_period_start(AllowancePeriod::Year, reference),
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    );
}
