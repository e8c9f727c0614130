// [libs/shared/watchtower/src/lib.rs]
/*!
 * =================================================================
 * APARATO: WATCHTOWER NEURAL OBSERVER (V3.0 - GOLD MASTER)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTIÓN DE TELEMETRÍA, TRAZADO Y CAPTURA DE PÁNICOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DIRECTIVE COMPOSER: El filtro por defecto se compone de
 *    directivas nominales (dominio en debug/info, infraestructura
 *    silenciada) y cede ante RUST_LOG del operador.
 * 2. DUAL MODE: Tramas JSON planas para la ingesta del Panóptico en
 *    producción; salida compacta de alta legibilidad en desarrollo.
 * 3. PHOENIX SHIELD: Hook de pánico separado e instalable por sí
 *    solo, con rastro de hilo, coordenadas y payload del colapso.
 *
 * # Mathematical Proof (Observability Integrity):
 * La instalación es una secuencia de dos pasos independientes
 * (suscriptor, escudo); un daemon del Ledger que colapse en un hilo
 * secundario deja su rastro forense antes de la defunción del
 * proceso, con o sin suscriptor JSON.
 * =================================================================
 */

use std::any::Any;
use std::panic;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Pares (objetivo, nivel) silenciados por defecto: ruido de
/// infraestructura que ahoga el rastro del dominio de créditos.
const INFRASTRUCTURE_NOISE_FLOOR: &[(&str, &str)] =
    &[("hyper", "warn"), ("reqwest", "warn"), ("libsql", "error"), ("tower", "warn")];

/// Compone las directivas nominales del filtro para un servicio.
fn default_filter_directives(service_nominal_identifier: &str) -> String {
    let domain_level = if cfg!(debug_assertions) { "debug" } else { "info" };

    let mut directives = vec![format!("{}={}", service_nominal_identifier, domain_level)];
    directives.extend(
        INFRASTRUCTURE_NOISE_FLOOR
            .iter()
            .map(|(noise_target, ceiling)| format!("{}={}", noise_target, ceiling)),
    );
    directives.join(",")
}

/// Extrae una descripción legible del payload de un pánico.
fn describe_panic_payload(panic_payload: &(dyn Any + Send)) -> String {
    if let Some(static_text) = panic_payload.downcast_ref::<&str>() {
        return (*static_text).to_string();
    }
    if let Some(owned_text) = panic_payload.downcast_ref::<String>() {
        return owned_text.clone();
    }
    "UNDESCRIBED_PANIC_PAYLOAD".to_string()
}

/// Instala el suscriptor global (paso 1 de la secuencia).
fn install_subscriber(service_nominal_identifier: &str) {
    // RUST_LOG del operador manda; las directivas nominales son el
    // contingente.
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_filter_directives(service_nominal_identifier))
    });

    if cfg!(debug_assertions) {
        // MODO DESARROLLO: legibilidad para el operador humano.
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        // MODO PRODUCCIÓN: tramas JSON planas para el Panóptico.
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }
}

/// Instala el Escudo Phoenix (paso 2): todo colapso de hilo deja su
/// rastro forense con hilo, coordenadas y payload.
///
/// Instalable por sí solo en binarios que ya traen suscriptor propio.
pub fn install_phoenix_shield(service_nominal_identifier: &str) {
    let service_id_snapshot = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |panic_metadata| {
        let collapsed_thread = thread::current();
        let thread_label = collapsed_thread.name().unwrap_or("unnamed_thread").to_string();

        let collapse_coordinates = match panic_metadata.location() {
            Some(location) => {
                format!("{}:{}:{}", location.file(), location.line(), location.column())
            }
            None => "UNKNOWN_STRATA_COORDINATES".to_string(),
        };

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            thread = %thread_label,
            estrato = %collapse_coordinates,
            "🔥 [CRITICAL_PANIC]: Thread terminated abruptly. Analysis: {}",
            describe_panic_payload(panic_metadata.payload())
        );
    }));
}

/// Secuencia completa de ignición del Watchtower.
///
/// # Comportamiento:
/// - Desarrollo: logs compactos interactivos.
/// - Producción: JSON estructurado para la ingesta del Panóptico.
///
/// # Errors:
/// Provoca pánico si otro suscriptor global ya fue inicializado en el
/// runtime.
pub fn init_tracing(service_nominal_identifier: &str) {
    install_subscriber(service_nominal_identifier);
    install_phoenix_shield(service_nominal_identifier);

    info!(
        "👁️  [WATCHTOWER_ONLINE]: Observability strata levelized for [{}]. Phoenix Shield ACTIVE.",
        service_nominal_identifier
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_lead_with_the_domain_and_silence_the_noise_floor() {
        let directives = default_filter_directives("meridian_credit_core");

        assert!(directives.starts_with("meridian_credit_core="));
        for (noise_target, ceiling) in INFRASTRUCTURE_NOISE_FLOOR {
            assert!(
                directives.contains(&format!("{}={}", noise_target, ceiling)),
                "NOISE_FLOOR_FAULT: '{}' missing from directives",
                noise_target
            );
        }
        assert_eq!(directives.matches(',').count(), INFRASTRUCTURE_NOISE_FLOOR.len());
    }
}
