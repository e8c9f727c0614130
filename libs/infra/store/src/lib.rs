// [libs/infra/store/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CREDIT STORE HUB (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DEL ADAPTADOR DE PERSISTENCIA
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;
pub mod unit;

pub(crate) mod rows;

pub use client::CreditStoreClient;
pub use errors::StoreError;
pub use unit::{PostCommitHook, UnitOfWork};
