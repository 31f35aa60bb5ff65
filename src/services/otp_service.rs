//! services/otp_service.rs
//! Emisión y verificación de códigos OTP para firma electrónica. El
//! código en claro nunca se persiste: solo su digest SHA-256. Cada
//! envío y cada intento quedan en `otp_verifications` como auditoría.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::otp_model::{
    OtpResult, OtpVerificationRecord, SendOtpRequest, SendOtpResponse, VerifyOtpRequest,
    VerifyOtpResponse,
};
use crate::models::policy_model::OtpChannel;
use crate::services::channel_dispatcher::ChannelDispatcher;
use crate::services::policy_service::PolicyService;

/// Código decimal aleatorio de exactamente `len` dígitos, con ceros a
/// la izquierda. Fuente segura (OsRng), no un PRNG general.
pub fn generate_otp(len: u32) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub fn hash_otp(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    format!("{:x}", digest)
}

/// Igualdad de digests sin cortar en el primer byte distinto: el tiempo
/// de comparación no depende de cuántos bytes coinciden.
pub fn digest_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// `jose@dominio.com` -> `jo**@dominio.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{}**@{}", visible, domain)
        }
        None => "***".to_string(),
    }
}

/// Deja visibles solo los últimos 4 dígitos.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[derive(Clone)]
pub struct OtpService {
    db_pool: Pool<Sqlite>,
    policy_service: PolicyService,
    dispatcher: ChannelDispatcher,
}

impl OtpService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        policy_service: PolicyService,
        dispatcher: ChannelDispatcher,
    ) -> Self {
        OtpService {
            db_pool,
            policy_service,
            dispatcher,
        }
    }

    // ========================================================
    // Envío
    // ========================================================

    pub async fn send_otp(&self, req: SendOtpRequest) -> Result<SendOtpResponse, ServiceError> {
        let policy = self.policy_service.get_policy(&req.company_id).await?;

        let channel = req.channel.unwrap_or(policy.default_channel);
        if !policy.allowed_channels.contains(&channel) {
            return Err(ServiceError::Validation(format!(
                "el canal '{}' no está permitido por la política de la compañía",
                channel
            )));
        }
        if channel == OtpChannel::Whatsapp && !policy.whatsapp_enabled {
            return Err(ServiceError::Validation(
                "el canal 'whatsapp' no está habilitado para esta compañía".to_string(),
            ));
        }

        let email = req.recipient_email.as_deref().filter(|e| !e.trim().is_empty());
        let phone = req.recipient_phone.as_deref().filter(|p| !p.trim().is_empty());

        match channel {
            OtpChannel::Email | OtpChannel::Smtp if email.is_none() => {
                return Err(ServiceError::Validation(
                    "falta recipient_email para el canal de correo".to_string(),
                ));
            }
            OtpChannel::Whatsapp if email.is_none() && phone.is_none() => {
                return Err(ServiceError::Validation(
                    "se necesita recipient_phone o recipient_email".to_string(),
                ));
            }
            _ => {}
        }

        let code = generate_otp(policy.otp_length);
        let otp_hash = hash_otp(&code);
        let expires_at = Utc::now() + Duration::seconds(policy.expiration_seconds);

        log::info!(
            "(send_otp) link={} canal solicitado={}",
            req.signature_link_id,
            channel
        );

        let outcome = self
            .dispatcher
            .dispatch(&policy, channel, email, phone, &code)
            .await;

        let destination_masked = match outcome.channel_used {
            OtpChannel::Whatsapp => mask_phone(phone.unwrap_or("")),
            _ => email.map(mask_email).unwrap_or_else(|| "***".to_string()),
        };
        let auth_method = match channel {
            OtpChannel::Whatsapp => "OTP_WHATSAPP",
            _ => "OTP_EMAIL",
        };
        let result = if outcome.sent {
            OtpResult::Pending
        } else {
            OtpResult::SendFailed
        };

        // Solo un envío que entregó invalida los pendientes anteriores:
        // si la entrega falló, el código viejo sigue siendo el vigente.
        if outcome.sent {
            self.supersede_pending(&req.signature_link_id).await?;
        }

        let verification_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO otp_verifications (
                id, signature_link_id, sale_id, company_id, auth_method,
                attempted_channel, channel_used, provider_used,
                destination_masked, otp_hash, expires_at, max_attempts,
                attempts, result, fallback_used, fallback_reason,
                created_at, verified_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13, ?14, ?15, ?16, NULL)
            "#,
        )
        .bind(&verification_id)
        .bind(&req.signature_link_id)
        .bind(&req.sale_id)
        .bind(&req.company_id)
        .bind(auth_method)
        .bind(outcome.attempted_channel.as_str())
        .bind(outcome.channel_used.as_str())
        .bind(&outcome.provider_used)
        .bind(&destination_masked)
        .bind(&otp_hash)
        .bind(expires_at.to_rfc3339())
        .bind(policy.max_attempts)
        .bind(result.as_str())
        .bind(outcome.fallback_used as i32)
        .bind(&outcome.fallback_reason)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar otp_verification")
        .map_err(ServiceError::Internal)?;

        if !outcome.sent {
            log::warn!(
                "(send_otp) Entrega fallida para link={}: {:?}",
                req.signature_link_id,
                outcome.fallback_reason
            );
        }

        Ok(SendOtpResponse {
            success: true,
            verification_id,
            destination_masked,
            expires_at,
            attempted_channel: outcome.attempted_channel,
            channel_used: outcome.channel_used,
            sent: outcome.sent,
            fallback_used: outcome.fallback_used,
            fallback_reason: outcome.fallback_reason,
            provider_used: outcome.provider_used,
        })
    }

    /// Marca como `superseded` todo pendiente del link: tras un envío
    /// entregado solo el código nuevo puede verificar.
    pub async fn supersede_pending(&self, signature_link_id: &str) -> Result<(), ServiceError> {
        sqlx::query(
            r#"UPDATE otp_verifications SET result = 'superseded'
               WHERE signature_link_id = ?1 AND result = 'pending'"#,
        )
        .bind(signature_link_id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al invalidar verificaciones previas")
        .map_err(ServiceError::Internal)?;
        Ok(())
    }

    // ========================================================
    // Verificación
    // ========================================================

    pub async fn verify_otp(
        &self,
        req: &VerifyOtpRequest,
        request_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<VerifyOtpResponse, ServiceError> {
        // El pendiente más reciente manda; los anteriores quedaron
        // superseded en el reenvío.
        let row: Option<(String, String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, otp_hash, expires_at, max_attempts, attempts
            FROM otp_verifications
            WHERE signature_link_id = ?1 AND result = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(&req.signature_link_id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Fallo al buscar verificación pendiente")
        .map_err(ServiceError::Internal)?;

        let Some((id, otp_hash, expires_at, max_attempts, attempts)) = row else {
            return Err(ServiceError::NotFound(
                "no hay verificación pendiente para este link".to_string(),
            ));
        };

        let expires_at: DateTime<Utc> = expires_at
            .parse()
            .context("expires_at ilegible")
            .map_err(ServiceError::Internal)?;

        // Expirado: no se cobra intento, pero el intento queda auditado.
        if Utc::now() > expires_at {
            self.mark_result(&id, OtpResult::Expired, request_ip, user_agent)
                .await?;
            return Err(ServiceError::OtpExpired);
        }

        if attempts >= max_attempts {
            self.mark_result(&id, OtpResult::MaxAttemptsExceeded, request_ip, user_agent)
                .await?;
            return Err(ServiceError::MaxAttemptsExceeded);
        }

        // Incremento atómico con guarda: dos verificaciones concurrentes
        // no pueden subcontar intentos. IP y user-agent se sobreescriben
        // en cada intento (auditoría del último caller).
        let updated = sqlx::query(
            r#"
            UPDATE otp_verifications
            SET attempts = attempts + 1,
                request_ip = ?1,
                user_agent = ?2
            WHERE id = ?3 AND result = 'pending' AND attempts < ?4
            "#,
        )
        .bind(request_ip)
        .bind(user_agent)
        .bind(&id)
        .bind(max_attempts)
        .execute(&self.db_pool)
        .await
        .context("Fallo al incrementar intentos")
        .map_err(ServiceError::Internal)?;

        if updated.rows_affected() == 0 {
            // Otra verificación concurrente agotó los intentos primero.
            self.mark_result(&id, OtpResult::MaxAttemptsExceeded, request_ip, user_agent)
                .await?;
            return Err(ServiceError::MaxAttemptsExceeded);
        }

        let (new_attempts,): (i64,) =
            sqlx::query_as("SELECT attempts FROM otp_verifications WHERE id = ?1")
                .bind(&id)
                .fetch_one(&self.db_pool)
                .await
                .context("Fallo al releer intentos")
                .map_err(ServiceError::Internal)?;

        // Este intento agotó el máximo: 429 sin comparar hashes.
        if new_attempts >= max_attempts {
            self.mark_result(&id, OtpResult::MaxAttemptsExceeded, request_ip, user_agent)
                .await?;
            return Err(ServiceError::MaxAttemptsExceeded);
        }

        if digest_eq(&hash_otp(&req.otp_code), &otp_hash) {
            sqlx::query(
                r#"
                UPDATE otp_verifications
                SET result = 'verified', verified_at = ?1
                WHERE id = ?2 AND result = 'pending'
                "#,
            )
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al marcar verified")
            .map_err(ServiceError::Internal)?;

            log::info!("(verify_otp) link={} verificado", req.signature_link_id);
            Ok(VerifyOtpResponse {
                success: true,
                verified: true,
                verification_id: id,
            })
        } else {
            Err(ServiceError::OtpMismatch {
                attempts_remaining: max_attempts - new_attempts - 1,
            })
        }
    }

    /// Cada llamada a verify sobreescribe IP y user-agent del registro,
    /// también en las salidas tempranas (expirado / intentos agotados).
    async fn mark_result(
        &self,
        id: &str,
        result: OtpResult,
        request_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE otp_verifications
            SET result = ?1, request_ip = ?2, user_agent = ?3
            WHERE id = ?4 AND result = 'pending'
            "#,
        )
        .bind(result.as_str())
        .bind(request_ip)
        .bind(user_agent)
        .bind(id)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar resultado")
        .map_err(ServiceError::Internal)?;
        Ok(())
    }

    // ========================================================
    // Auditoría
    // ========================================================

    pub async fn list_verifications(
        &self,
        signature_link_id: &str,
    ) -> Result<Vec<OtpVerificationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, signature_link_id, sale_id, company_id, auth_method,
                   attempted_channel, channel_used, provider_used,
                   destination_masked, expires_at, max_attempts, attempts,
                   result, fallback_used, fallback_reason, request_ip,
                   user_agent, created_at, verified_at
            FROM otp_verifications
            WHERE signature_link_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(signature_link_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar otp_verifications")?;

        let mut result = Vec::new();
        for r in rows {
            let expires_at: String = r.try_get("expires_at")?;
            let created_at: String = r.try_get("created_at")?;
            let verified_at: Option<String> = r.try_get("verified_at")?;
            let fallback_used: i64 = r.try_get("fallback_used")?;

            result.push(OtpVerificationRecord {
                id: r.try_get("id")?,
                signature_link_id: r.try_get("signature_link_id")?,
                sale_id: r.try_get("sale_id")?,
                company_id: r.try_get("company_id")?,
                auth_method: r.try_get("auth_method")?,
                attempted_channel: r.try_get("attempted_channel")?,
                channel_used: r.try_get("channel_used")?,
                provider_used: r.try_get("provider_used")?,
                destination_masked: r.try_get("destination_masked")?,
                expires_at: expires_at.parse()?,
                max_attempts: r.try_get("max_attempts")?,
                attempts: r.try_get("attempts")?,
                result: r.try_get("result")?,
                fallback_used: fallback_used != 0,
                fallback_reason: r.try_get("fallback_reason")?,
                request_ip: r.try_get("request_ip")?,
                user_agent: r.try_get("user_agent")?,
                created_at: created_at.parse()?,
                verified_at: match verified_at {
                    Some(v) => Some(v.parse()?),
                    None => None,
                },
            });
        }
        Ok(result)
    }
}
