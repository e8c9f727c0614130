// [apps/orchestrator/src/services/checkout.rs]
/*!
 * =================================================================
 * APARATO: CHECKOUT GATEWAY ADAPTER (V2.1 - OPAQUE UPLINK)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SESIONES DE PAGO CONTRA LA PASARELA EXTERNA
 *
 * La pasarela es un colaborador opaco: este aparato solo negocia la
 * sesión de checkout y construye las URLs de redirección. La señal
 * autoritativa de pago llega después por el webhook externo.
 * =================================================================
 */

use anyhow::{anyhow, Context, Result};
use meridian_domain_models::purchase::CreditPurchase;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Sesión negociada con la pasarela.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub external_session_identifier: String,
    pub checkout_url: String,
}

pub struct CheckoutGateway {
    network_uplink_client: Client,
    /// Endpoint de la pasarela; ausente en despliegues manuales.
    gateway_endpoint: Option<String>,
    /// Base del frontend para las redirecciones de éxito/cancelación.
    frontend_base_url: String,
}

impl CheckoutGateway {
    pub fn new(gateway_endpoint: Option<String>, frontend_base_url: String) -> Self {
        let network_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Meridian-Checkout-Gateway/V2.1")
            .build()
            .expect("FATAL: Failed to initialize checkout uplink client.");

        Self {
            network_uplink_client: network_client,
            gateway_endpoint: gateway_endpoint.filter(|endpoint| !endpoint.is_empty()),
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Negocia una sesión de checkout para la compra pendiente.
    ///
    /// Sin pasarela configurada, forja una sesión local manual: el
    /// operador completa el pago por el canal administrativo y el
    /// webhook simulado finaliza la compra.
    #[instrument(skip(self, purchase), fields(purchase = %purchase.purchase_identifier))]
    pub async fn create_session(&self, purchase: &CreditPurchase) -> Result<CheckoutSession> {
        let success_redirect_url = format!(
            "{}/billing/success?purchase={}",
            self.frontend_base_url, purchase.purchase_identifier
        );
        let cancel_redirect_url = format!("{}/billing/cancelled", self.frontend_base_url);

        let Some(gateway_endpoint) = &self.gateway_endpoint else {
            let local_session_identifier =
                format!("cs_local_{}", Uuid::new_v4().simple());
            warn!(
                "🧾 [CHECKOUT]: Gateway endpoint absent. Forging manual session [{}].",
                local_session_identifier
            );
            return Ok(CheckoutSession {
                checkout_url: format!(
                    "{}/billing/checkout/{}?session={}",
                    self.frontend_base_url, purchase.purchase_identifier, local_session_identifier
                ),
                external_session_identifier: local_session_identifier,
            });
        };

        let session_request_payload = json!({
            "purchaseId": purchase.purchase_identifier,
            "creditAmount": purchase.credit_amount,
            "unitPrice": purchase.unit_price,
            "totalAmount": purchase.total_amount,
            "successUrl": success_redirect_url,
            "cancelUrl": cancel_redirect_url,
        });

        let network_response = self
            .network_uplink_client
            .post(format!("{}/v1/checkout/sessions", gateway_endpoint.trim_end_matches('/')))
            .json(&session_request_payload)
            .send()
            .await
            .context("CHECKOUT_UPLINK_COLLAPSE")?;

        if !network_response.status().is_success() {
            return Err(anyhow!(
                "CHECKOUT_REJECTION: gateway answered {}",
                network_response.status()
            ));
        }

        let session_document: serde_json::Value =
            network_response.json().await.context("CHECKOUT_PAYLOAD_MALFORMED")?;

        let external_session_identifier = session_document["sessionId"]
            .as_str()
            .ok_or_else(|| anyhow!("CHECKOUT_CONTRACT_DRIFT: 'sessionId' missing"))?
            .to_string();
        let checkout_url = session_document["url"]
            .as_str()
            .ok_or_else(|| anyhow!("CHECKOUT_CONTRACT_DRIFT: 'url' missing"))?
            .to_string();

        info!("🧾 [CHECKOUT]: Session [{}] negotiated.", external_session_identifier);
        Ok(CheckoutSession { external_session_identifier, checkout_url })
    }
}
