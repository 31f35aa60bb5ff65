//! errors.rs
//! Taxonomía de errores del servicio y su mapeo a códigos HTTP.
//! 400 validación / expirado, 404 sin verificación pendiente,
//! 429 intentos agotados, 500 todo lo demás.

use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("el código OTP expiró")]
    OtpExpired,

    #[error("se excedió el máximo de intentos")]
    MaxAttemptsExceeded,

    #[error("código OTP incorrecto")]
    OtpMismatch { attempts_remaining: i64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn to_response(&self) -> HttpResponse {
        match self {
            ServiceError::Validation(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            ServiceError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": msg
            })),
            ServiceError::OtpExpired => HttpResponse::BadRequest().json(json!({
                "error": self.to_string(),
                "expired": true
            })),
            ServiceError::MaxAttemptsExceeded => HttpResponse::TooManyRequests().json(json!({
                "error": self.to_string()
            })),
            ServiceError::OtpMismatch { attempts_remaining } => {
                HttpResponse::BadRequest().json(json!({
                    "error": self.to_string(),
                    "attempts_remaining": attempts_remaining
                }))
            }
            ServiceError::Internal(e) => HttpResponse::InternalServerError().json(json!({
                "error": format!("{:?}", e)
            })),
        }
    }
}
