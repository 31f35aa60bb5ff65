//! models/otp_model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::policy_model::OtpChannel;

/// Estado final o en curso de un registro de verificación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpResult {
    Pending,
    Verified,
    Expired,
    MaxAttemptsExceeded,
    SendFailed,
    /// Invalidado porque hubo un reenvío posterior para el mismo link
    Superseded,
}

impl OtpResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpResult::Pending => "pending",
            OtpResult::Verified => "verified",
            OtpResult::Expired => "expired",
            OtpResult::MaxAttemptsExceeded => "max_attempts_exceeded",
            OtpResult::SendFailed => "send_failed",
            OtpResult::Superseded => "superseded",
        }
    }

}

impl fmt::Display for OtpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registro de verificación OTP (sin el hash: ese no sale del servicio).
#[derive(Debug, Clone, Serialize)]
pub struct OtpVerificationRecord {
    pub id: String,
    pub signature_link_id: String,
    pub sale_id: String,
    pub company_id: String,
    pub auth_method: String,
    pub attempted_channel: String,
    pub channel_used: String,
    pub provider_used: Option<String>,
    pub destination_masked: String,
    pub expires_at: DateTime<Utc>,
    pub max_attempts: i64,
    pub attempts: i64,
    pub result: String,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Cuerpo de POST /api/otp, discriminado por `action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OtpActionRequest {
    Send(SendOtpRequest),
    Verify(VerifyOtpRequest),
    GetPolicy(GetPolicyRequest),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpRequest {
    pub signature_link_id: String,
    pub sale_id: String,
    pub company_id: String,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    /// Canal solicitado; por defecto el de la política
    pub channel: Option<OtpChannel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub signature_link_id: String,
    pub otp_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPolicyRequest {
    pub sale_id: String,
    pub company_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub verification_id: String,
    pub destination_masked: String,
    pub expires_at: DateTime<Utc>,
    pub attempted_channel: OtpChannel,
    pub channel_used: OtpChannel,
    pub sent: bool,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub provider_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub verified: bool,
    pub verification_id: String,
}
