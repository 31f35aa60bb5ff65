//! models/policy_model.rs
//! Política OTP por compañía: canales permitidos, longitud del código,
//! ventana de expiración, credenciales de proveedores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canal de entrega del código OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    /// Correo vía relay SMTP (HTTP POST al relay configurado)
    Email,
    Whatsapp,
    /// Correo directo vía SMTP con las credenciales de la política
    Smtp,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Email => "email",
            OtpChannel::Whatsapp => "whatsapp",
            OtpChannel::Smtp => "smtp",
        }
    }
}

impl fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proveedor configurado para WhatsApp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhatsappProviderKind {
    /// API Graph oficial (cloud API)
    MetaGraph,
    /// API de telefonía (Twilio)
    Twilio,
    /// Gateway self-hosted (sesión whatsapp-web)
    Gateway,
    /// Sin envío programático: el operador abre el chat a mano
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

/// Política OTP de una compañía. Se persiste como blob JSON y se valida
/// al cargar y al guardar; nunca se versiona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpPolicy {
    pub require_otp: bool,
    pub otp_length: u32,
    pub expiration_seconds: i64,
    pub max_attempts: i64,
    pub default_channel: OtpChannel,
    pub allowed_channels: Vec<OtpChannel>,
    pub whatsapp_enabled: bool,
    #[serde(default = "default_whatsapp_provider")]
    pub whatsapp_provider: WhatsappProviderKind,

    // Credenciales por proveedor (solo las del proveedor activo se usan)
    #[serde(default)]
    pub meta_access_token: Option<String>,
    #[serde(default)]
    pub meta_phone_number_id: Option<String>,
    #[serde(default)]
    pub twilio_account_sid: Option<String>,
    #[serde(default)]
    pub twilio_auth_token: Option<String>,
    #[serde(default)]
    pub twilio_from: Option<String>,
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub gateway_session_id: Option<String>,

    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub smtp_relay_url: Option<String>,
}

fn default_whatsapp_provider() -> WhatsappProviderKind {
    WhatsappProviderKind::Manual
}

impl Default for OtpPolicy {
    /// Política por defecto cuando la compañía no configuró nada:
    /// OTP requerido, solo email, 6 dígitos, 5 minutos, 3 intentos.
    fn default() -> Self {
        OtpPolicy {
            require_otp: true,
            otp_length: 6,
            expiration_seconds: 300,
            max_attempts: 3,
            default_channel: OtpChannel::Email,
            allowed_channels: vec![OtpChannel::Email],
            whatsapp_enabled: false,
            whatsapp_provider: WhatsappProviderKind::Manual,
            meta_access_token: None,
            meta_phone_number_id: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from: None,
            gateway_url: None,
            gateway_session_id: None,
            smtp: None,
            smtp_relay_url: None,
        }
    }
}

impl OtpPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if ![4, 6, 8].contains(&self.otp_length) {
            return Err(format!(
                "otp_length debe ser 4, 6 u 8 (recibido: {})",
                self.otp_length
            ));
        }
        if self.expiration_seconds <= 0 {
            return Err("expiration_seconds debe ser positivo".to_string());
        }
        if self.max_attempts <= 0 {
            return Err("max_attempts debe ser positivo".to_string());
        }
        if self.allowed_channels.is_empty() {
            return Err("allowed_channels no puede estar vacío".to_string());
        }
        if !self.allowed_channels.contains(&self.default_channel) {
            return Err(format!(
                "default_channel '{}' no está en allowed_channels",
                self.default_channel
            ));
        }
        Ok(())
    }
}

/// Resumen de política que consume el frontend de firma.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub require_otp: bool,
    pub allowed_channels: Vec<OtpChannel>,
    pub default_channel: OtpChannel,
    pub whatsapp_enabled: bool,
}

impl From<&OtpPolicy> for PolicySummary {
    fn from(p: &OtpPolicy) -> Self {
        PolicySummary {
            require_otp: p.require_otp,
            allowed_channels: p.allowed_channels.clone(),
            default_channel: p.default_channel,
            whatsapp_enabled: p.whatsapp_enabled,
        }
    }
}
