// [libs/infra/fabric/src/exchange.rs]
/*!
 * =================================================================
 * APARATO: EXCHANGE DECLARATIONS (V2.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: DECLARACIONES IDEMPOTENTES DE LOS EXCHANGES
 * =================================================================
 */

/// Exchange topic durable de eventos dirigidos inter-aplicación.
pub const INTER_APP_EVENTS_EXCHANGE: &str = "inter-app-events";

/// Exchange fanout durable de difusión; la clave de ruteo se ignora.
pub const INTER_APP_BROADCAST_EXCHANGE: &str = "inter-app-broadcast";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Topic,
    Fanout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDeclaration {
    pub exchange_name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Declaraciones canónicas re-asertadas en cada (re)conexión.
/// Ambas son idempotentes por contrato.
pub fn standard_declarations() -> Vec<ExchangeDeclaration> {
    vec![
        ExchangeDeclaration {
            exchange_name: INTER_APP_EVENTS_EXCHANGE.to_string(),
            kind: ExchangeKind::Topic,
            durable: true,
        },
        ExchangeDeclaration {
            exchange_name: INTER_APP_BROADCAST_EXCHANGE.to_string(),
            kind: ExchangeKind::Fanout,
            durable: true,
        },
    ]
}
