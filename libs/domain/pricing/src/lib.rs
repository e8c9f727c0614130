// [libs/domain/pricing/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PRICING DOMAIN HUB (V2.0 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DEL MOTOR DE TARIFICACIÓN
 *
 * El parseo de códigos punteados vive únicamente aquí: ningún otro
 * estrato divide cadenas de operación por su cuenta.
 * =================================================================
 */

pub mod errors;
pub mod module_expansion;
pub mod operation_code;
pub mod resolution;
pub mod tariff;

pub use errors::PricingError;
pub use module_expansion::{expand_module_operations, ConfigTemplate};
pub use operation_code::{is_valid_code_segment, OperationCode};
pub use resolution::{resolve_effective_config, ScopeCandidates};
pub use tariff::{allowance_period_start, TariffQuote};
