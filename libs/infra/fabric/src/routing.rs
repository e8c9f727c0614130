// [libs/infra/fabric/src/routing.rs]
/*!
 * =================================================================
 * APARATO: ROUTING KEY GRAMMAR (V3.1 - WILDCARD SEALED)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: DERIVACIÓN DE CLAVES Y PATRONES DE ENLACE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. KEY DERIVATION: "{target}.{eventType}" con subrayados del tipo
 *    convertidos a puntos ("credit_config_updated" ->
 *    "credit.config.updated").
 * 2. WILDCARDS: '*' consume exactamente un segmento; '#' consume cero
 *    o más. Paridad con la semántica de exchanges topic.
 *
 * # Mathematical Proof (Match Totality):
 * El matching recursivo sobre segmentos es total y termina: cada paso
 * consume al menos un elemento del patrón, y '#' explora un prefijo
 * finito de la clave.
 * =================================================================
 */

use crate::errors::FabricError;

/// Deriva la clave de ruteo canónica de un evento dirigido.
///
/// Los subrayados del tipo se proyectan a puntos: la clave resultante
/// es navegable por patrones "app.*" y "app.credit.*".
pub fn derive_routing_key(target_application: &str, event_type: &str) -> String {
    format!("{}.{}", target_application, event_type.replace('_', "."))
}

/// Clave del canal de acuses de un publicador.
pub fn acknowledgment_routing_key(source_application: &str) -> String {
    format!("acks.{}", source_application)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    /// '*': exactamente un segmento.
    SingleWildcard,
    /// '#': cero o más segmentos.
    MultiWildcard,
}

/// Patrón de enlace de una cola a un exchange topic.
#[derive(Debug, Clone)]
pub struct BindingPattern {
    source: String,
    segments: Vec<PatternSegment>,
}

impl BindingPattern {
    /// Valida y compila un patrón "crm.credit.*".
    ///
    /// # Errors:
    /// 'InvalidBindingPattern' ante segmentos vacíos.
    pub fn parse(raw_pattern: &str) -> Result<Self, FabricError> {
        if raw_pattern.is_empty() {
            return Err(FabricError::InvalidBindingPattern(raw_pattern.to_string()));
        }

        let segments = raw_pattern
            .split('.')
            .map(|segment| match segment {
                "" => Err(FabricError::InvalidBindingPattern(raw_pattern.to_string())),
                "*" => Ok(PatternSegment::SingleWildcard),
                "#" => Ok(PatternSegment::MultiWildcard),
                literal => Ok(PatternSegment::Literal(literal.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { source: raw_pattern.to_string(), segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evalúa la clave contra el patrón con semántica topic.
    pub fn matches(&self, routing_key: &str) -> bool {
        let key_segments: Vec<&str> = routing_key.split('.').collect();
        matches_recursive(&self.segments, &key_segments)
    }
}

fn matches_recursive(pattern: &[PatternSegment], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((PatternSegment::Literal(literal), pattern_rest)) => key
            .split_first()
            .map(|(key_head, key_rest)| {
                key_head == literal && matches_recursive(pattern_rest, key_rest)
            })
            .unwrap_or(false),
        Some((PatternSegment::SingleWildcard, pattern_rest)) => key
            .split_first()
            .map(|(_, key_rest)| matches_recursive(pattern_rest, key_rest))
            .unwrap_or(false),
        Some((PatternSegment::MultiWildcard, pattern_rest)) => (0..=key.len())
            .any(|consumed_count| matches_recursive(pattern_rest, &key[consumed_count..])),
    }
}
