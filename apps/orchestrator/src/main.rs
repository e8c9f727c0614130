// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V5.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el esquema del Ledger cristalice antes de
 * encender los daemons autónomos, previniendo estados de carrera
 * donde el barrido de expiración consulte tablas aún no creadas.
 * =================================================================
 */

use dotenvy::dotenv;
use meridian_orchestrator::prelude::*;
use meridian_shared_watchtower::init_tracing;
use std::time::Duration;
use tracing::info;

fn environment_or(variable_name: &str, default_value: &str) -> String {
    std::env::var(variable_name).unwrap_or_else(|_| default_value.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (WATCHTOWER)
    init_tracing("meridian_credit_core");

    // 3. CONFIGURACIÓN DEL RUNTIME
    let runtime_orchestrator =
        tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [CREDIT_CORE]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS DEL ENTORNO
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");
        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        let expiry_tick_seconds: u64 =
            environment_or("EXPIRY_TICK_SECONDS", "60").parse().unwrap_or(60);
        let retry_scan_seconds: u64 =
            environment_or("RETRY_SCAN_SECONDS", "60").parse().unwrap_or(60);
        let retry_grace_minutes: i64 =
            environment_or("RETRY_PENDING_GRACE_MINUTES", "5").parse().unwrap_or(5);

        let purchase_event_targets: Vec<String> =
            environment_or("PURCHASE_EVENT_TARGETS", "crm,operations")
                .split(',')
                .map(|target| target.trim().to_string())
                .filter(|target| !target.is_empty())
                .collect();

        let kernel_settings = KernelSettings {
            database_connection_url,
            database_access_token,
            service_name: environment_or("SERVICE_NAME", "credit-core"),
            frontend_base_url: environment_or("FRONTEND_URL", "http://localhost:3000"),
            checkout_gateway_endpoint: std::env::var("CHECKOUT_GATEWAY_URL").ok(),
            expiry_tick: Duration::from_secs(expiry_tick_seconds),
            retry_scan_tick: Duration::from_secs(retry_scan_seconds),
            retry_pending_grace_minutes: retry_grace_minutes,
            purchase_event_targets,
        };

        // 5. CONSTRUCCIÓN DEL KERNEL (ESTRATO L1-APP)
        let kernel_instance = CreditCoreKernel::ignite(kernel_settings)
            .await
            .expect("FATAL: Credit store link collapse. Ignition aborted.");

        // 6. IGNICIÓN DE LOS DAEMONS AUTÓNOMOS
        kernel_instance
            .launch_autonomous_services()
            .await
            .expect("FATAL: Autonomous service ignition collapsed.");

        info!("🚀 [CREDIT_CORE_ONLINE]: System fully operational.");

        // 7. ESPERA COOPERATIVA DE LA SEÑAL DE CIERRE
        tokio::signal::ctrl_c().await.expect("FATAL: Signal listener collapsed.");
        kernel_instance.initiate_shutdown();

        // Gracia acotada para que los daemons honren el cierre entre
        // ticks antes de la terminación del proceso.
        tokio::time::sleep(Duration::from_secs(3)).await;
        info!("👋 [CREDIT_CORE]: Shutdown complete.");

        Ok(())
    })
}
