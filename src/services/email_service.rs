//! services/email_service.rs
//! Entrega del código por correo: relay SMTP (HTTP POST del HTML
//! renderizado) o SMTP directo con las credenciales de la política.

use anyhow::{Context, Result};
use lettre::{
    message::{header::ContentType, Mailbox, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde_json::json;

use crate::models::policy_model::{OtpPolicy, SmtpConfig};
use crate::services::channel_dispatcher::SendOutcome;

#[derive(Clone)]
pub struct EmailService {
    http_client: Client,
}

impl EmailService {
    pub fn new() -> Self {
        EmailService {
            http_client: Client::new(),
        }
    }

    /// Template fijo de marca con el código embebido. El diseño no es
    /// configurable por compañía.
    pub fn render_otp_email(code: &str, minutes: i64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; background: #f4f6f8; padding: 24px;">
    <div style="max-width: 480px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px;">
      <h2 style="color: #1a3e6e; margin-top: 0;">Verificación de identidad</h2>
      <p>Usá el siguiente código para continuar con la firma electrónica:</p>
      <p style="font-size: 32px; letter-spacing: 8px; font-weight: bold; text-align: center; color: #1a3e6e;">{code}</p>
      <p style="color: #6b7280; font-size: 13px;">El código vence en {minutes} minutos. Si no solicitaste esta verificación, ignorá este correo.</p>
    </div>
  </body>
</html>"#
        )
    }

    /// Envío vía relay SMTP. Sin relay configurado no se intenta ningún
    /// proveedor por defecto: la entrega falla con motivo claro.
    pub async fn send_via_relay(
        &self,
        policy: &OtpPolicy,
        to: &str,
        subject: &str,
        html: &str,
    ) -> SendOutcome {
        let relay_url = match &policy.smtp_relay_url {
            Some(url) if !url.is_empty() => url,
            _ => return SendOutcome::failed("SMTP relay no configurado"),
        };

        let payload = json!({
            "to": to,
            "subject": subject,
            "html": html,
            "smtp": policy.smtp,
        });

        log::info!("(send_via_relay) POST al relay para destinatario {}", to);
        match self.http_client.post(relay_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => SendOutcome::ok(),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                log::error!("(send_via_relay) relay respondió {}: {}", status, body);
                SendOutcome::failed(format!("relay respondió {}: {}", status, body))
            }
            Err(e) => SendOutcome::failed(format!("fallo al contactar el relay: {}", e)),
        }
    }

    /// Envío SMTP directo con lettre (canal `smtp`).
    pub async fn send_via_smtp(
        &self,
        smtp: Option<&SmtpConfig>,
        to: &str,
        subject: &str,
        html: &str,
    ) -> SendOutcome {
        let Some(smtp) = smtp else {
            return SendOutcome::failed("SMTP no configurado para esta compañía");
        };
        if smtp.host.is_empty() {
            return SendOutcome::failed("SMTP no configurado para esta compañía");
        }

        match smtp_send_inner(smtp, to, subject, html).await {
            Ok(()) => SendOutcome::ok(),
            Err(e) => {
                log::error!("(send_via_smtp) fallo SMTP directo: {:?}", e);
                SendOutcome::failed(format!("fallo SMTP directo: {:#}", e))
            }
        }
    }
}

async fn smtp_send_inner(smtp: &SmtpConfig, to: &str, subject: &str, html: &str) -> Result<()> {
    let from: Mailbox = format!("{} <{}>", smtp.from_name, smtp.from_address)
        .parse()
        .context("Dirección from inválida")?;
    let to: Mailbox = to.parse().context("Dirección de destinatario inválida")?;

    let tls = if smtp.use_tls {
        Tls::Required(TlsParameters::new(smtp.host.clone())?)
    } else {
        Tls::None
    };

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        .port(smtp.port)
        .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
        .tls(tls)
        .build();

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .singlepart(
            SinglePart::builder()
                .header(ContentType::parse("text/html; charset=utf-8")?)
                .body(html.to_string()),
        )?;

    tokio::time::timeout(std::time::Duration::from_secs(30), mailer.send(message))
        .await
        .context("Timeout enviando por SMTP")??;

    Ok(())
}
