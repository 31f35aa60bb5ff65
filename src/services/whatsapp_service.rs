//! services/whatsapp_service.rs
//! Proveedores de WhatsApp detrás de un trait común, elegidos por la
//! política de la compañía. Un fallo de entrega no es un error duro:
//! se reporta con `sent = false` y un motivo legible para el fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::models::policy_model::{OtpPolicy, WhatsappProviderKind};
use crate::services::channel_dispatcher::SendOutcome;

#[async_trait]
pub trait WhatsappProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Intenta entregar el mensaje al teléfono indicado.
    async fn send_code(&self, phone: &str, message: &str) -> SendOutcome;
}

/// Fábrica: instancia el proveedor que la compañía tiene configurado.
pub fn whatsapp_provider_for(policy: &OtpPolicy, client: &Client) -> Box<dyn WhatsappProvider> {
    match policy.whatsapp_provider {
        WhatsappProviderKind::MetaGraph => Box::new(MetaGraphProvider {
            client: client.clone(),
            access_token: policy.meta_access_token.clone(),
            phone_number_id: policy.meta_phone_number_id.clone(),
        }),
        WhatsappProviderKind::Twilio => Box::new(TwilioProvider {
            client: client.clone(),
            account_sid: policy.twilio_account_sid.clone(),
            auth_token: policy.twilio_auth_token.clone(),
            from: policy.twilio_from.clone(),
        }),
        WhatsappProviderKind::Gateway => Box::new(GatewayProvider {
            client: client.clone(),
            base_url: policy.gateway_url.clone(),
            session_id: policy.gateway_session_id.clone(),
        }),
        WhatsappProviderKind::Manual => Box::new(ManualProvider),
    }
}

fn digits_only(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================
// API Graph (cloud API oficial)
// ============================================================

pub struct MetaGraphProvider {
    client: Client,
    access_token: Option<String>,
    phone_number_id: Option<String>,
}

#[async_trait]
impl WhatsappProvider for MetaGraphProvider {
    fn name(&self) -> &'static str {
        "meta_graph"
    }

    async fn send_code(&self, phone: &str, message: &str) -> SendOutcome {
        let (token, phone_number_id) = match (&self.access_token, &self.phone_number_id) {
            (Some(t), Some(p)) if !t.is_empty() && !p.is_empty() => (t, p),
            _ => return SendOutcome::failed("proveedor meta_graph sin credenciales configuradas"),
        };

        let url = format!("https://graph.facebook.com/v19.0/{}/messages", phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": digits_only(phone),
            "type": "text",
            "text": { "body": message }
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => SendOutcome::ok(),
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                log::error!("(meta_graph) respuesta {}: {}", status, body);
                SendOutcome::failed(format!("meta_graph respondió {}: {}", status, body))
            }
            Err(e) => SendOutcome::failed(format!("fallo al contactar meta_graph: {}", e)),
        }
    }
}

// ============================================================
// API de telefonía (Twilio)
// ============================================================

pub struct TwilioProvider {
    client: Client,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from: Option<String>,
}

#[async_trait]
impl WhatsappProvider for TwilioProvider {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send_code(&self, phone: &str, message: &str) -> SendOutcome {
        let (sid, token, from) = match (&self.account_sid, &self.auth_token, &self.from) {
            (Some(s), Some(t), Some(f)) if !s.is_empty() && !t.is_empty() && !f.is_empty() => {
                (s, t, f)
            }
            _ => return SendOutcome::failed("proveedor twilio sin credenciales configuradas"),
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            sid
        );
        let params = [
            ("To", format!("whatsapp:+{}", digits_only(phone))),
            ("From", format!("whatsapp:{}", from)),
            ("Body", message.to_string()),
        ];

        let resp = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&params)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => SendOutcome::ok(),
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                log::error!("(twilio) respuesta {}: {}", status, body);
                SendOutcome::failed(format!("twilio respondió {}: {}", status, body))
            }
            Err(e) => SendOutcome::failed(format!("fallo al contactar twilio: {}", e)),
        }
    }
}

// ============================================================
// Gateway self-hosted (sesión whatsapp-web)
// ============================================================

pub struct GatewayProvider {
    client: Client,
    base_url: Option<String>,
    session_id: Option<String>,
}

#[async_trait]
impl WhatsappProvider for GatewayProvider {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn send_code(&self, phone: &str, message: &str) -> SendOutcome {
        let (base_url, session_id) = match (&self.base_url, &self.session_id) {
            (Some(b), Some(s)) if !b.is_empty() && !s.is_empty() => (b, s),
            _ => return SendOutcome::failed("gateway de WhatsApp sin configurar"),
        };

        // 1) La sesión debe estar conectada antes de enviar
        let status_url = format!("{}/session/status/{}", base_url, session_id);
        let resp = match self.client.get(&status_url).send().await {
            Ok(r) => r,
            Err(e) => return SendOutcome::failed(format!("fallo al consultar la sesión: {}", e)),
        };
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return SendOutcome::failed(format!("error consultando sesión: {}", body));
        }
        let json_val = match resp.json::<serde_json::Value>().await {
            Ok(v) => v,
            Err(e) => return SendOutcome::failed(format!("respuesta de sesión ilegible: {}", e)),
        };
        let connected = json_val
            .get("state")
            .and_then(|v| v.as_str())
            .map(|s| s == "CONNECTED")
            .unwrap_or(false);
        if !connected {
            return SendOutcome::failed("sesión WhatsApp no está CONNECTED");
        }

        // 2) Enviar el texto al chat
        let send_url = format!("{}/client/sendMessage/{}", base_url, session_id);
        let payload = json!({
            "chatId": format!("{}@c.us", digits_only(phone)),
            "contentType": "string",
            "content": message
        });

        match self.client.post(&send_url).json(&payload).send().await {
            Ok(r) if r.status().is_success() => SendOutcome::ok(),
            Ok(r) => {
                let body = r.text().await.unwrap_or_default();
                SendOutcome::failed(format!("fallo al enviar por gateway: {}", body))
            }
            Err(e) => SendOutcome::failed(format!("fallo al contactar el gateway: {}", e)),
        }
    }
}

// ============================================================
// Modo manual: no hay envío programático
// ============================================================

pub struct ManualProvider;

#[async_trait]
impl WhatsappProvider for ManualProvider {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn send_code(&self, phone: &str, _message: &str) -> SendOutcome {
        // Requiere que un operador abra el chat y comparta el código.
        SendOutcome::failed(format!(
            "modo manual: abrir https://wa.me/{} y compartir el código",
            digits_only(phone)
        ))
    }
}
