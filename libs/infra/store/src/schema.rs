// [libs/infra/store/src/schema.rs]
/**
 * =================================================================
 * APARATO: CREDIT LEDGER SCHEMA (V4.0 - MULTI-TENANT STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. TENANT PARTITIONING: Toda tabla transporta 'tenant_id'; los
 *    predicados de los repositorios lo exigen en cada sentencia.
 * 2. OC-1 ENFORCED: Índices únicos parciales sellan la unicidad de
 *    configuración por ámbito (entidad, inquilino, global).
 * 3. IDEMPOTENCIA: Gestión tolerante para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para el barrido de expiración
 *    y el escáner de reintentos.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del núcleo de créditos Meridian.
 */
const CREDIT_TABLES: &[(&str, &str)] = &[
    ("TABLE_TENANTS", r#"
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id TEXT PRIMARY KEY,
            tenant_name TEXT NOT NULL,
            status TEXT DEFAULT 'active',
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_ENTITIES", r#"
        CREATE TABLE IF NOT EXISTS entities (
            entity_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            parent_entity_id TEXT,
            entity_name TEXT NOT NULL,
            is_active INTEGER DEFAULT 1,
            is_default INTEGER DEFAULT 0,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CREDIT_BALANCES", r#"
        CREATE TABLE IF NOT EXISTS credit_balances (
            credit_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            available_credits REAL NOT NULL DEFAULT 0,
            reserved_credits REAL NOT NULL DEFAULT 0,
            is_active INTEGER DEFAULT 1,
            last_updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(tenant_id, entity_id)
        );
    "#),
    ("TABLE_CREDIT_TRANSACTIONS", r#"
        CREATE TABLE IF NOT EXISTS credit_transactions (
            transaction_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            amount REAL NOT NULL,
            previous_balance REAL NOT NULL,
            new_balance REAL NOT NULL,
            operation_code TEXT,
            initiated_by TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CREDIT_PURCHASES", r#"
        CREATE TABLE IF NOT EXISTS credit_purchases (
            purchase_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            credit_amount REAL NOT NULL,
            unit_price REAL NOT NULL,
            total_amount REAL NOT NULL,
            payment_method TEXT NOT NULL,
            status TEXT DEFAULT 'pending',
            external_session_id TEXT,
            requested_by TEXT,
            paid_at TEXT,
            credited_at TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CREDIT_CONFIGURATIONS", r#"
        CREATE TABLE IF NOT EXISTS credit_configurations (
            config_id TEXT PRIMARY KEY,
            operation_code TEXT NOT NULL,
            tenant_id TEXT,
            entity_id TEXT,
            is_global INTEGER DEFAULT 0,
            credit_cost REAL NOT NULL,
            unit TEXT DEFAULT 'operation',
            unit_multiplier REAL DEFAULT 1,
            free_allowance INTEGER DEFAULT 0,
            free_allowance_period TEXT DEFAULT 'month',
            volume_tiers TEXT DEFAULT '[]',
            allow_overage INTEGER DEFAULT 1,
            overage_limit REAL,
            overage_cost REAL,
            is_active INTEGER DEFAULT 1,
            priority INTEGER DEFAULT 0,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SEASONAL_CREDIT_ALLOCATIONS", r#"
        CREATE TABLE IF NOT EXISTS seasonal_credit_allocations (
            allocation_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            target_application TEXT,
            allocated_credits REAL NOT NULL,
            used_credits REAL NOT NULL DEFAULT 0,
            expires_at TEXT NOT NULL,
            is_active INTEGER DEFAULT 1,
            is_expired INTEGER DEFAULT 0,
            credit_type TEXT NOT NULL,
            campaign_id TEXT,
            campaign_name TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_APPLICATIONS", r#"
        CREATE TABLE IF NOT EXISTS applications (
            app_id TEXT PRIMARY KEY,
            app_code TEXT NOT NULL UNIQUE,
            status TEXT DEFAULT 'active'
        );
    "#),
    ("TABLE_APPLICATION_MODULES", r#"
        CREATE TABLE IF NOT EXISTS application_modules (
            module_id TEXT PRIMARY KEY,
            app_id TEXT NOT NULL,
            module_code TEXT NOT NULL,
            permissions TEXT DEFAULT '[]',
            UNIQUE(app_id, module_code)
        );
    "#),
    ("TABLE_SUBSCRIPTIONS", r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            subscription_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            plan_code TEXT NOT NULL,
            status TEXT DEFAULT 'active',
            renews_at TEXT
        );
    "#),
    ("TABLE_EVENT_AUDIT", r#"
        CREATE TABLE IF NOT EXISTS event_audit (
            event_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            target_application TEXT NOT NULL,
            event_type TEXT NOT NULL,
            routing_key TEXT NOT NULL,
            envelope_json TEXT NOT NULL,
            published_at TEXT NOT NULL,
            ack_status TEXT DEFAULT 'pending',
            ack_at TEXT,
            retry_count INTEGER DEFAULT 0,
            failure_class TEXT
        );
    "#),
];

/**
 * ESTRATO 2: ACELERACIÓN (Índices Tácticos)
 * Sellan OC-1 y aceleran el barrido de expiración, la cadena del
 * Ledger y el escáner de reintentos.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("INDEX_LEDGER_CHAIN", r#"
        CREATE INDEX IF NOT EXISTS idx_credit_transactions_chain
        ON credit_transactions(tenant_id, entity_id, created_at);
    "#),
    ("INDEX_LEDGER_OPERATION", r#"
        CREATE INDEX IF NOT EXISTS idx_credit_transactions_operation
        ON credit_transactions(tenant_id, entity_id, operation_code);
    "#),
    ("INDEX_PURCHASE_SESSION", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_credit_purchases_session
        ON credit_purchases(external_session_id)
        WHERE external_session_id IS NOT NULL;
    "#),
    ("INDEX_CONFIG_ENTITY_SCOPE", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_credit_configurations_entity
        ON credit_configurations(operation_code, tenant_id, entity_id)
        WHERE entity_id IS NOT NULL;
    "#),
    ("INDEX_CONFIG_TENANT_SCOPE", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_credit_configurations_tenant
        ON credit_configurations(operation_code, tenant_id)
        WHERE is_global = 0 AND entity_id IS NULL;
    "#),
    ("INDEX_CONFIG_GLOBAL_SCOPE", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_credit_configurations_global
        ON credit_configurations(operation_code)
        WHERE is_global = 1;
    "#),
    ("INDEX_ALLOCATION_SWEEP", r#"
        CREATE INDEX IF NOT EXISTS idx_seasonal_allocations_sweep
        ON seasonal_credit_allocations(is_active, is_expired, expires_at);
    "#),
    ("INDEX_ALLOCATION_FIFO", r#"
        CREATE INDEX IF NOT EXISTS idx_seasonal_allocations_fifo
        ON seasonal_credit_allocations(tenant_id, entity_id, expires_at, created_at);
    "#),
    ("INDEX_EVENT_AUDIT_SCAN", r#"
        CREATE INDEX IF NOT EXISTS idx_event_audit_scan
        ON event_audit(ack_status, published_at);
    "#),
];

/**
 * Aplica el esquema completo del Ledger de forma idempotente.
 *
 * # Errors:
 * Propaga el primer fallo estructural con el nombre del aparato
 * afectado para el rastro forense.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_credit_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️  [SCHEMA]: Solidifying credit ledger strata...");

    for (table_label, table_statement) in CREDIT_TABLES {
        database_connection
            .execute(table_statement, ())
            .await
            .with_context(|| format!("SCHEMA_GENESIS_FAULT at {}", table_label))?;
        debug!("🧱 [SCHEMA]: {} solidified.", table_label);
    }

    for (index_label, index_statement) in ACCELERATION_INDEXES {
        database_connection
            .execute(index_statement, ())
            .await
            .with_context(|| format!("SCHEMA_ACCELERATION_FAULT at {}", index_label))?;
        debug!("⚡ [SCHEMA]: {} energized.", index_label);
    }

    info!("✅ [SCHEMA]: Credit ledger strata levelized.");
    Ok(())
}
