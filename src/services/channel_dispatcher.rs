//! services/channel_dispatcher.rs
//! Resuelve un pedido de envío abstracto en una llamada concreta a un
//! proveedor, con fallback de un solo nivel que siempre cae en email.

use reqwest::Client;

use crate::models::policy_model::{OtpChannel, OtpPolicy};
use crate::services::email_service::EmailService;
use crate::services::whatsapp_service::whatsapp_provider_for;

/// Resultado crudo de un proveedor. `sent = false` lleva siempre un
/// motivo legible para el usuario.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub sent: bool,
    pub reason: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        SendOutcome {
            sent: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SendOutcome {
            sent: false,
            reason: Some(reason.into()),
        }
    }
}

/// Qué pasó con el despacho: canal intentado, canal efectivo, proveedor
/// y motivo de fallback o de fallo.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub attempted_channel: OtpChannel,
    pub channel_used: OtpChannel,
    pub sent: bool,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub provider_used: String,
}

#[derive(Clone)]
pub struct ChannelDispatcher {
    email_service: EmailService,
    http_client: Client,
}

impl ChannelDispatcher {
    pub fn new(email_service: EmailService) -> Self {
        ChannelDispatcher {
            email_service,
            http_client: Client::new(),
        }
    }

    pub async fn dispatch(
        &self,
        policy: &OtpPolicy,
        channel: OtpChannel,
        recipient_email: Option<&str>,
        recipient_phone: Option<&str>,
        code: &str,
    ) -> DispatchOutcome {
        match channel {
            OtpChannel::Whatsapp => {
                self.dispatch_whatsapp(policy, recipient_email, recipient_phone, code)
                    .await
            }
            OtpChannel::Email | OtpChannel::Smtp => {
                self.email_path(policy, channel, channel, recipient_email, code, None, false)
                    .await
            }
        }
    }

    async fn dispatch_whatsapp(
        &self,
        policy: &OtpPolicy,
        recipient_email: Option<&str>,
        recipient_phone: Option<&str>,
        code: &str,
    ) -> DispatchOutcome {
        let phone = match recipient_phone {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                // Sin teléfono no hay nada que intentar: directo a email.
                return self
                    .email_path(
                        policy,
                        OtpChannel::Whatsapp,
                        OtpChannel::Email,
                        recipient_email,
                        code,
                        Some("no se proporcionó teléfono".to_string()),
                        true,
                    )
                    .await;
            }
        };

        let provider = whatsapp_provider_for(policy, &self.http_client);
        let minutes = (policy.expiration_seconds / 60).max(1);
        let message = format!(
            "Tu código de verificación para firmar es {}. Vence en {} minutos.",
            code, minutes
        );

        log::info!(
            "(dispatch_whatsapp) Enviando por proveedor '{}'...",
            provider.name()
        );
        let outcome = provider.send_code(phone, &message).await;

        if outcome.sent {
            return DispatchOutcome {
                attempted_channel: OtpChannel::Whatsapp,
                channel_used: OtpChannel::Whatsapp,
                sent: true,
                fallback_used: false,
                fallback_reason: None,
                provider_used: provider.name().to_string(),
            };
        }

        let reason = outcome
            .reason
            .unwrap_or_else(|| "fallo desconocido del proveedor".to_string());
        log::warn!(
            "(dispatch_whatsapp) Proveedor '{}' no envió: {}",
            provider.name(),
            reason
        );

        if recipient_email.is_some() {
            // Fallback de un solo nivel: siempre a email
            self.email_path(
                policy,
                OtpChannel::Whatsapp,
                OtpChannel::Email,
                recipient_email,
                code,
                Some(reason),
                true,
            )
            .await
        } else {
            DispatchOutcome {
                attempted_channel: OtpChannel::Whatsapp,
                channel_used: OtpChannel::Whatsapp,
                sent: false,
                fallback_used: false,
                fallback_reason: Some(reason),
                provider_used: provider.name().to_string(),
            }
        }
    }

    /// Camino de email compartido por envío directo y fallback. El canal
    /// `email` exige relay configurado; `smtp` usa lettre con las
    /// credenciales de la política.
    #[allow(clippy::too_many_arguments)]
    async fn email_path(
        &self,
        policy: &OtpPolicy,
        attempted_channel: OtpChannel,
        mechanism: OtpChannel,
        recipient_email: Option<&str>,
        code: &str,
        carried_reason: Option<String>,
        fallback_used: bool,
    ) -> DispatchOutcome {
        let provider_used = match mechanism {
            OtpChannel::Smtp => "smtp_directo",
            _ => "smtp_relay",
        };

        let to = match recipient_email {
            Some(e) if !e.trim().is_empty() => e,
            _ => {
                return DispatchOutcome {
                    attempted_channel,
                    channel_used: mechanism,
                    sent: false,
                    fallback_used,
                    fallback_reason: Some(join_reasons(
                        carried_reason,
                        "sin correo del destinatario",
                    )),
                    provider_used: provider_used.to_string(),
                };
            }
        };

        let minutes = (policy.expiration_seconds / 60).max(1);
        let html = EmailService::render_otp_email(code, minutes);
        let subject = "Tu código de verificación";

        let outcome = match mechanism {
            OtpChannel::Smtp => {
                self.email_service
                    .send_via_smtp(policy.smtp.as_ref(), to, subject, &html)
                    .await
            }
            _ => {
                self.email_service
                    .send_via_relay(policy, to, subject, &html)
                    .await
            }
        };

        if outcome.sent {
            DispatchOutcome {
                attempted_channel,
                channel_used: mechanism,
                sent: true,
                fallback_used,
                fallback_reason: carried_reason,
                provider_used: provider_used.to_string(),
            }
        } else {
            let failure = outcome
                .reason
                .unwrap_or_else(|| "fallo desconocido de correo".to_string());
            DispatchOutcome {
                attempted_channel,
                channel_used: mechanism,
                sent: false,
                fallback_used,
                fallback_reason: Some(join_reasons(carried_reason, &failure)),
                provider_used: provider_used.to_string(),
            }
        }
    }
}

fn join_reasons(carried: Option<String>, current: &str) -> String {
    match carried {
        Some(c) => format!("{}; {}", c, current),
        None => current.to_string(),
    }
}
