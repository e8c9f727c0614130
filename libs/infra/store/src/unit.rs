// [libs/infra/store/src/unit.rs]
/*!
 * =================================================================
 * APARATO: TENANT-BOUND UNIT OF WORK (V3.5 - POST-COMMIT READY)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: UNIDAD TRANSACCIONAL CON CONTEXTO DE INQUILINO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TENANT GUARD: Toda unidad nace anclada a un inquilino; un
 *    contexto sin 'tenant_identifier' es un error de programación
 *    detectable ('auth_configuration_error').
 * 2. IMMEDIATE LOCKING: La transacción abre con BEGIN IMMEDIATE; el
 *    candado de escritura serializa a los mutadores concurrentes del
 *    mismo balance, cumpliendo la disciplina de fila bloqueada.
 * 3. POST-COMMIT HOOKS: Los efectos diferidos (auditoría, señales)
 *    corren en orden de registro estrictamente después del COMMIT y
 *    jamás dentro de la transacción.
 * 4. BOUNDED LIFETIME: Presupuesto de vida de 30 s nominales; una
 *    unidad vencida aborta y revierte.
 *
 * # Mathematical Proof (Atomic Coupling):
 * Balance y asiento comparten la misma unidad: o ambos cristalizan en
 * el COMMIT o ninguno sobrevive al ROLLBACK. La escritura parcial es
 * inalcanzable por construcción.
 * =================================================================
 */

use crate::client::CreditStoreClient;
use crate::errors::StoreError;
use libsql::params::IntoParams;
use libsql::{Connection, Rows};
use meridian_domain_models::context::TenantContext;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Presupuesto de vida nominal de una unidad.
const UNIT_LIFETIME_BUDGET: Duration = Duration::from_secs(30);

/// Efecto diferido ejecutado tras el COMMIT.
pub type PostCommitHook = Box<dyn FnOnce() + Send + Sync + 'static>;

pub struct UnitOfWork {
    connection: Connection,
    context: TenantContext,
    tenant_identifier: Uuid,
    opened_at: Instant,
    lifetime_budget: Duration,
    post_commit_hooks: Vec<PostCommitHook>,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("context", &self.context)
            .field("tenant_identifier", &self.tenant_identifier)
            .field("opened_at", &self.opened_at)
            .field("lifetime_budget", &self.lifetime_budget)
            .field("post_commit_hooks", &self.post_commit_hooks.len())
            .finish()
    }
}

impl UnitOfWork {
    /// Abre una unidad anclada al contexto del inquilino.
    ///
    /// # Errors:
    /// - 'TenantContextMissing' si el contexto carece de inquilino.
    /// - Fallos de enlace o de apertura transaccional del motor.
    pub async fn begin(
        client: &CreditStoreClient,
        context: &TenantContext,
    ) -> Result<Self, StoreError> {
        let tenant_identifier =
            context.tenant_identifier.ok_or(StoreError::TenantContextMissing)?;

        let connection = client.get_connection()?;

        // Los escritores concurrentes del mismo balance esperan el
        // candado en lugar de colapsar con BUSY.
        let _ = connection.query("PRAGMA busy_timeout = 5000", ()).await?;

        connection.execute("BEGIN IMMEDIATE", ()).await.map_err(|lock_fault| {
            StoreError::TransactionCollapse(format!("BEGIN_IMMEDIATE_REJECTED: {}", lock_fault))
        })?;

        debug!(
            tenant = %tenant_identifier,
            correlation = %context.correlation_identifier,
            "🔐 [UNIT_OF_WORK]: Immediate write lock acquired."
        );

        Ok(Self {
            connection,
            context: context.clone(),
            tenant_identifier,
            opened_at: Instant::now(),
            lifetime_budget: UNIT_LIFETIME_BUDGET,
            post_commit_hooks: Vec::new(),
        })
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Inquilino al que la unidad quedó anclada.
    pub fn tenant_identifier(&self) -> Uuid {
        self.tenant_identifier
    }

    fn guard_lifetime(&self) -> Result<(), StoreError> {
        if self.opened_at.elapsed() > self.lifetime_budget {
            return Err(StoreError::UnitLifetimeExceeded);
        }
        Ok(())
    }

    /// Ejecuta una sentencia de mutación dentro de la unidad.
    pub async fn execute(
        &self,
        sql_statement: &str,
        statement_params: impl IntoParams,
    ) -> Result<u64, StoreError> {
        self.guard_lifetime()?;
        Ok(self.connection.execute(sql_statement, statement_params).await?)
    }

    /// Ejecuta una consulta dentro de la unidad (lecturas bajo candado).
    pub async fn query(
        &self,
        sql_statement: &str,
        statement_params: impl IntoParams,
    ) -> Result<Rows, StoreError> {
        self.guard_lifetime()?;
        Ok(self.connection.query(sql_statement, statement_params).await?)
    }

    /// Registra un efecto diferido; corre tras el COMMIT, en orden.
    pub fn defer_post_commit(&mut self, deferred_effect: PostCommitHook) {
        self.post_commit_hooks.push(deferred_effect);
    }

    /// Compromete la unidad y dispara los ganchos diferidos.
    ///
    /// # Errors:
    /// - 'UnitLifetimeExceeded' si el presupuesto venció: la unidad
    ///   revierte y ningún gancho se ejecuta.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        if self.opened_at.elapsed() > self.lifetime_budget {
            warn!(
                tenant = %self.tenant_identifier,
                "⏱️ [UNIT_OF_WORK]: Lifetime budget exceeded. Aborting and rolling back."
            );
            let _ = self.connection.execute("ROLLBACK", ()).await;
            return Err(StoreError::UnitLifetimeExceeded);
        }

        self.connection.execute("COMMIT", ()).await.map_err(|commit_fault| {
            StoreError::TransactionCollapse(format!("COMMIT_REJECTED: {}", commit_fault))
        })?;

        for deferred_effect in self.post_commit_hooks.drain(..) {
            deferred_effect();
        }

        Ok(())
    }

    /// Revierte la unidad; los ganchos diferidos se descartan.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.connection.execute("ROLLBACK", ()).await.map_err(|rollback_fault| {
            StoreError::TransactionCollapse(format!("ROLLBACK_REJECTED: {}", rollback_fault))
        })?;
        Ok(())
    }
}
