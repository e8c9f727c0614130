// [libs/domain/pricing/src/operation_code.rs]
/*!
 * =================================================================
 * APARATO: OPERATION CODE GRAMMAR (V2.1 - CENTRALIZED)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PARSEO Y VALIDACIÓN DEL CÓDIGO PUNTEADO
 *
 * # Mathematical Proof (Grammar Closure):
 * Un código válido es exactamente "{app}.{module}.{permission}" con
 * tres segmentos no vacíos sobre el alfabeto [a-z0-9_]. El parseo es
 * la única puerta de entrada: todo código aceptado re-serializa
 * idéntico (parse ∘ display = id).
 * =================================================================
 */

use crate::errors::PricingError;
use std::fmt;

/// Código punteado validado de una operación tarificable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationCode {
    application_code: String,
    module_code: String,
    permission_code: String,
}

/// Alfabeto permitido por segmento. Público: los códigos de silo y de
/// módulo del registro honran la misma gramática que los segmentos del
/// código punteado.
pub fn is_valid_code_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|symbol| symbol.is_ascii_lowercase() || symbol.is_ascii_digit() || symbol == '_')
}

impl OperationCode {
    /// Valida y descompone un código punteado.
    ///
    /// # Errors:
    /// 'InvalidOperationCode' ante aridad distinta de tres segmentos o
    /// símbolos fuera del alfabeto.
    pub fn parse(raw_code: &str) -> Result<Self, PricingError> {
        let segments: Vec<&str> = raw_code.split('.').collect();

        if segments.len() != 3 {
            return Err(PricingError::InvalidOperationCode {
                code: raw_code.to_string(),
                detail: format!("expected 3 segments, found {}", segments.len()),
            });
        }

        for segment in &segments {
            if !is_valid_code_segment(segment) {
                return Err(PricingError::InvalidOperationCode {
                    code: raw_code.to_string(),
                    detail: format!("segment '{}' violates [a-z0-9_]+ alphabet", segment),
                });
            }
        }

        Ok(Self {
            application_code: segments[0].to_string(),
            module_code: segments[1].to_string(),
            permission_code: segments[2].to_string(),
        })
    }

    /// Construye un código desde sus tres segmentos ya conocidos.
    pub fn from_segments(
        application_code: &str,
        module_code: &str,
        permission_code: &str,
    ) -> Result<Self, PricingError> {
        Self::parse(&format!("{}.{}.{}", application_code, module_code, permission_code))
    }

    /// Silo de aplicación dueño de la operación.
    pub fn application_code(&self) -> &str {
        &self.application_code
    }

    pub fn module_code(&self) -> &str {
        &self.module_code
    }

    pub fn permission_code(&self) -> &str {
        &self.permission_code
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}.{}.{}",
            self.application_code, self.module_code, self.permission_code
        )
    }
}
