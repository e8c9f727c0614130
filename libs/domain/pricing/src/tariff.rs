// [libs/domain/pricing/src/tariff.rs]
/*!
 * =================================================================
 * APARATO: TARIFF PHYSICS ENGINE (V2.4 - VOLUME AWARE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PRECIO EFECTIVO, FRANQUICIAS Y EXCEDENTES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VOLUME TIERS: El escalón con el mayor umbral que no exceda el
 *    uso del mes corriente sobreescribe el costo base.
 * 2. FREE ALLOWANCE: Las unidades dentro de la franquicia del periodo
 *    cuestan cero; solo el excedente se tarifica.
 * 3. SINGLE OVERAGE COST: El excedente usa un único costo configurable
 *    por fila, acotado por 'overage_limit'.
 *
 * # Mathematical Proof (Quote Determinism):
 * quote() es una función pura de (config, cantidad, uso del periodo,
 * uso del mes). Dos evaluaciones con los mismos argumentos producen
 * la misma cotización redondeada a la escala canónica del Ledger.
 * =================================================================
 */

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use meridian_domain_models::config::{AllowancePeriod, ResolvedConfig};
use meridian_domain_models::credits::{round_credits, LedgerRefusal};

/// Cotización determinista de un consumo.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffQuote {
    /// Costo unitario efectivo tras escalones y multiplicador.
    pub effective_unit_cost: f64,
    /// Umbral del escalón de volumen aplicado, si alguno calificó.
    pub applied_tier_threshold: Option<f64>,
    /// Unidades cubiertas por la franquicia del periodo.
    pub free_units: f64,
    /// Unidades efectivamente tarificadas.
    pub billable_units: f64,
    /// Costo total redondeado a la escala canónica.
    pub total_cost: f64,
}

/// Frontera inicial (UTC) del periodo de franquicia que contiene a
/// 'reference_instant'.
pub fn allowance_period_start(
    period: AllowancePeriod,
    reference_instant: DateTime<Utc>,
) -> DateTime<Utc> {
    let reference_date = reference_instant.date_naive();

    let period_start_date = match period {
        AllowancePeriod::Day => reference_date,
        AllowancePeriod::Week => {
            reference_date - Duration::days(reference_date.weekday().num_days_from_monday() as i64)
        }
        AllowancePeriod::Month => reference_date.with_day(1).unwrap_or(reference_date),
        AllowancePeriod::Year => Utc
            .with_ymd_and_hms(reference_date.year(), 1, 1, 0, 0, 0)
            .single()
            .map(|boundary| boundary.date_naive())
            .unwrap_or(reference_date),
    };

    Utc.from_utc_datetime(
        &period_start_date
            .and_hms_opt(0, 0, 0)
            .unwrap_or_else(|| reference_instant.naive_utc()),
    )
}

/// Selecciona el costo unitario según los escalones de volumen:
/// gana el escalón con el mayor umbral que no supere el uso del mes.
fn tiered_unit_cost(config: &ResolvedConfig, month_to_date_usage: f64) -> (f64, Option<f64>) {
    let qualifying_tier = config
        .volume_tiers
        .iter()
        .filter(|tier| tier.threshold <= month_to_date_usage)
        .max_by(|left, right| {
            left.threshold
                .partial_cmp(&right.threshold)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    match qualifying_tier {
        Some(tier) => (tier.cost, Some(tier.threshold)),
        None => (config.credit_cost, None),
    }
}

/// Cotiza un consumo de 'quantity' unidades de la operación.
///
/// 'period_usage_units' es el uso acumulado del periodo de franquicia
/// vigente; 'month_to_date_usage' el del mes corriente (escalones).
///
/// Los rechazos son resultados de negocio, nunca errores tipados.
pub fn quote(
    config: &ResolvedConfig,
    quantity: f64,
    period_usage_units: f64,
    month_to_date_usage: f64,
) -> Result<TariffQuote, LedgerRefusal> {
    if quantity <= 0.0 || !quantity.is_finite() {
        return Err(LedgerRefusal::InvalidAmount { amount: quantity });
    }

    let (tiered_cost, applied_tier_threshold) = tiered_unit_cost(config, month_to_date_usage);
    let effective_unit_cost = round_credits(tiered_cost * config.unit_multiplier);

    // Sin franquicia: tarifa plana sobre la cantidad completa.
    if config.free_allowance <= 0 {
        return Ok(TariffQuote {
            effective_unit_cost,
            applied_tier_threshold,
            free_units: 0.0,
            billable_units: quantity,
            total_cost: round_credits(effective_unit_cost * quantity),
        });
    }

    let allowance_total = config.free_allowance as f64;
    let allowance_remaining = (allowance_total - period_usage_units).max(0.0);
    let free_units = quantity.min(allowance_remaining);
    let excess_units = round_credits(quantity - free_units);

    if excess_units <= 0.0 {
        return Ok(TariffQuote {
            effective_unit_cost,
            applied_tier_threshold,
            free_units: quantity,
            billable_units: 0.0,
            total_cost: 0.0,
        });
    }

    if !config.allow_overage {
        return Err(LedgerRefusal::OverageNotPermitted {
            allowance_remaining,
            requested: quantity,
        });
    }

    if let Some(overage_limit) = config.overage_limit {
        let prior_excess = (period_usage_units - allowance_total).max(0.0);
        if prior_excess + excess_units > overage_limit {
            return Err(LedgerRefusal::OverageNotPermitted {
                allowance_remaining,
                requested: quantity,
            });
        }
    }

    let overage_unit_cost = config
        .overage_cost
        .map(round_credits)
        .unwrap_or(effective_unit_cost);

    Ok(TariffQuote {
        effective_unit_cost,
        applied_tier_threshold,
        free_units,
        billable_units: excess_units,
        total_cost: round_credits(overage_unit_cost * excess_units),
    })
}
