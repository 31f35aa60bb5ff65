//! services/workflow_service.rs
//! Evaluador de reglas de transición y matriz de acceso por estado. El
//! evaluador no decide la verdad de las condiciones declaradas: solo
//! reporta cuáles son y si la transición exige nota.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::errors::ServiceError;
use crate::models::workflow_model::{
    AccessQuery, AccessResponse, EvaluateTransitionRequest, Role, TransitionDecision,
    WorkflowConfig,
};

// ============================================================
// Núcleo puro (sin persistencia)
// ============================================================

/// Con la config inactiva toda transición está permitida (modo legado).
pub fn is_transition_allowed(config: &WorkflowConfig, from: &str, to: &str, role: Role) -> bool {
    if !config.is_active {
        return true;
    }
    config
        .transitions
        .iter()
        .find(|r| r.from == from && r.to == to)
        .map_or(false, |r| r.allowed_roles.contains(&role))
}

pub fn evaluate_transition(
    config: &WorkflowConfig,
    from: &str,
    to: &str,
    role: Role,
    note: Option<&str>,
) -> TransitionDecision {
    if !config.is_active {
        return TransitionDecision {
            allowed: true,
            reason: None,
            conditions: vec![],
            note_required: false,
        };
    }

    let Some(rule) = config
        .transitions
        .iter()
        .find(|r| r.from == from && r.to == to)
    else {
        return TransitionDecision {
            allowed: false,
            reason: Some(format!("transición no definida de '{}' a '{}'", from, to)),
            conditions: vec![],
            note_required: false,
        };
    };

    let conditions: Vec<String> = rule.conditions.iter().map(|c| c.display()).collect();

    if !rule.allowed_roles.contains(&role) {
        return TransitionDecision {
            allowed: false,
            reason: Some(format!(
                "el rol '{}' no puede realizar esta transición",
                role
            )),
            conditions,
            note_required: rule.require_note,
        };
    }

    if rule.require_note && note.map(str::trim).unwrap_or("").is_empty() {
        return TransitionDecision {
            allowed: false,
            reason: Some("se requiere una nota para esta transición".to_string()),
            conditions,
            note_required: true,
        };
    }

    TransitionDecision {
        allowed: true,
        reason: None,
        conditions,
        note_required: rule.require_note,
    }
}

/// Sin regla para el estado: visible para todos.
pub fn is_visible(config: &WorkflowConfig, state: &str, role: Role) -> bool {
    config
        .state_access
        .iter()
        .find(|r| r.state == state)
        .map_or(true, |r| r.visible_to.contains(&role))
}

/// Sin regla para el estado: editable por nadie (default conservador).
pub fn is_editable(config: &WorkflowConfig, state: &str, role: Role) -> bool {
    config
        .state_access
        .iter()
        .find(|r| r.state == state)
        .map_or(false, |r| r.editable_by.contains(&role))
}

// ============================================================
// Servicio con persistencia
// ============================================================

#[derive(Clone)]
pub struct WorkflowService {
    db_pool: Pool<Sqlite>,
}

impl WorkflowService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        WorkflowService { db_pool }
    }

    pub async fn get_config(&self, company_id: &str) -> Result<Option<WorkflowConfig>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT config FROM workflow_configs WHERE company_id = ?1")
                .bind(company_id)
                .fetch_optional(&self.db_pool)
                .await
                .context("Fallo al leer workflow_configs")?;

        match row {
            Some((config,)) => {
                let parsed: WorkflowConfig =
                    serde_json::from_str(&config).context("Config de workflow corrupta")?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn save_config(
        &self,
        company_id: &str,
        config: &WorkflowConfig,
    ) -> Result<(), ServiceError> {
        config.validate().map_err(ServiceError::Validation)?;

        let blob = serde_json::to_string(config)
            .context("Fallo al serializar la config")
            .map_err(ServiceError::Internal)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO workflow_configs (company_id, config, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(company_id) DO UPDATE SET
                config = excluded.config,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id)
        .bind(blob)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al guardar workflow_config")
        .map_err(ServiceError::Internal)?;

        Ok(())
    }

    /// Sin config guardada se asume el modo legado permisivo, igual que
    /// una config con `is_active = false`.
    pub async fn evaluate(&self, req: &EvaluateTransitionRequest) -> Result<TransitionDecision> {
        let config = self
            .get_config(&req.company_id)
            .await?
            .unwrap_or(WorkflowConfig {
                transitions: vec![],
                state_access: vec![],
                is_active: false,
            });

        Ok(evaluate_transition(
            &config,
            &req.from,
            &req.to,
            req.role,
            req.note.as_deref(),
        ))
    }

    pub async fn access(&self, query: &AccessQuery) -> Result<AccessResponse> {
        let config = self
            .get_config(&query.company_id)
            .await?
            .unwrap_or(WorkflowConfig {
                transitions: vec![],
                state_access: vec![],
                is_active: false,
            });

        Ok(AccessResponse {
            state: query.state.clone(),
            role: query.role,
            visible: is_visible(&config, &query.state, query.role),
            editable: is_editable(&config, &query.state, query.role),
        })
    }
}
