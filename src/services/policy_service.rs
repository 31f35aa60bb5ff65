//! services/policy_service.rs
//! Carga y guarda la política OTP por compañía. El blob JSON se
//! deserializa a `OtpPolicy` y se valida en el borde, nunca se pasea
//! como JSON opaco por el resto del servicio.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::errors::ServiceError;
use crate::models::policy_model::{OtpPolicy, PolicySummary};

#[derive(Clone)]
pub struct PolicyService {
    db_pool: Pool<Sqlite>,
}

impl PolicyService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        PolicyService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones")?;
        Ok(())
    }

    /// Política de la compañía; sin fila configurada rige la política
    /// por defecto (OTP requerido, solo email).
    pub async fn get_policy(&self, company_id: &str) -> Result<OtpPolicy> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT config FROM otp_policies WHERE company_id = ?1")
                .bind(company_id)
                .fetch_optional(&self.db_pool)
                .await
                .context("Fallo al leer otp_policies")?;

        match row {
            Some((config,)) => {
                let policy: OtpPolicy =
                    serde_json::from_str(&config).context("Política OTP corrupta en la base")?;
                policy
                    .validate()
                    .map_err(|e| anyhow!("Política OTP inválida para '{}': {}", company_id, e))?;
                Ok(policy)
            }
            None => Ok(OtpPolicy::default()),
        }
    }

    pub async fn get_policy_summary(&self, company_id: &str) -> Result<PolicySummary> {
        let policy = self.get_policy(company_id).await?;
        Ok(PolicySummary::from(&policy))
    }

    pub async fn upsert_policy(
        &self,
        company_id: &str,
        policy: &OtpPolicy,
    ) -> Result<(), ServiceError> {
        policy.validate().map_err(ServiceError::Validation)?;

        let config = serde_json::to_string(policy)
            .context("Fallo al serializar la política")
            .map_err(ServiceError::Internal)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO otp_policies (company_id, config, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(company_id) DO UPDATE SET
                config = excluded.config,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id)
        .bind(config)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar otp_policy")
        .map_err(ServiceError::Internal)?;

        Ok(())
    }
}
