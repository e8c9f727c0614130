// [libs/infra/store/src/client.rs]
/*!
 * =================================================================
 * APARATO: CREDIT STORE CLIENT (V4.2 - MEMORY ANCHORED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES DE PERSISTENCIA Y ESQUEMA
 *
 * # Mathematical Proof (In-Memory Consistency):
 * Para garantizar que el esquema sea visible entre hilos en modo RAM,
 * el cliente detecta URLs de memoria y aplica el ancla de persistencia
 * ANTES del bootstrap del esquema, asegurando que las tablas del
 * Ledger residan en un segmento de memoria compartido.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::schema::apply_full_credit_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct CreditStoreClient {
    internal_database_driver: Arc<Database>,
    /// Mantiene viva la base en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl CreditStoreClient {
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
    ) -> Result<Self, StoreError> {
        if database_connection_url.is_empty() {
            return Err(StoreError::AuthConfiguration(
                "CRITICAL_FAULT: DATABASE_URL_UNDEFINED".into(),
            ));
        }

        info!(
            "🔌 [CREDIT_STORE]: Initiating ledger link synchronization to [{}]",
            database_connection_url
        );

        let is_remote = database_connection_url.starts_with("libsql://")
            || database_connection_url.starts_with("https://");

        let is_memory = database_connection_url.contains(":memory:")
            || database_connection_url.contains("mode=memory");

        let database_driver = if is_remote {
            let token = database_access_token.ok_or_else(|| {
                StoreError::AuthConfiguration(
                    "SECURITY_FAULT: Remote access denied (Token missing)".into(),
                )
            })?;
            Builder::new_remote(database_connection_url.to_string(), token)
                .build()
                .await
        } else {
            Builder::new_local(database_connection_url).build().await
        }
        .map_err(|ignition_fault| {
            StoreError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {}", ignition_fault))
        })?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        if is_memory {
            // En modo memoria el ancla se abre antes que cualquier otra
            // operación para que el esquema resida en el segmento
            // compartido.
            let anchor_connection = shared_driver.connect().map_err(|anchor_fault| {
                StoreError::ConnectionError(format!("ANCHOR_FAULT: {}", anchor_fault))
            })?;

            apply_full_credit_schema(&anchor_connection).await.map_err(|schema_fault| {
                StoreError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", schema_fault))
            })?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [CREDIT_STORE]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_connection = shared_driver.connect().map_err(|bootstrap_fault| {
                StoreError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {}", bootstrap_fault))
            })?;
            apply_full_credit_schema(&bootstrap_connection).await.map_err(|schema_fault| {
                StoreError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", schema_fault))
            })?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
        })
    }

    /// Camino de lectura no transaccional del Storage Gateway.
    pub fn get_connection(&self) -> Result<Connection, StoreError> {
        self.internal_database_driver.connect().map_err(|allocation_fault| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", allocation_fault);
            StoreError::ConnectionError(allocation_fault.to_string())
        })
    }
}
