//! handlers/workflow_handler.rs
//! Evaluación de transiciones, matriz de acceso y panel de configuración
//! (workflow + política OTP) por compañía.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::policy_model::OtpPolicy;
use crate::models::workflow_model::{
    AccessQuery, BuiltInCondition, EvaluateTransitionRequest, WorkflowConfig,
};
use crate::services::{policy_service::PolicyService, workflow_service::WorkflowService};

/// POST /api/workflow/evaluate
pub async fn evaluate_transition_endpoint(
    workflow_service: web::Data<WorkflowService>,
    body: web::Json<EvaluateTransitionRequest>,
) -> HttpResponse {
    let req = body.into_inner();

    match workflow_service.evaluate(&req).await {
        Ok(decision) => HttpResponse::Ok().json(decision),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/workflow/access
pub async fn state_access_endpoint(
    workflow_service: web::Data<WorkflowService>,
    query: web::Query<AccessQuery>,
) -> HttpResponse {
    match workflow_service.access(&query.into_inner()).await {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": format!("{:?}", e)
        })),
    }
}

/// GET /api/workflow/conditions — catálogo fijo de condiciones del
/// sistema, para que el panel arme reglas con claves estables.
pub async fn list_conditions_endpoint() -> HttpResponse {
    let conditions: Vec<_> = BuiltInCondition::ALL
        .iter()
        .map(|c| json!({ "key": c.key(), "label": c.label() }))
        .collect();

    HttpResponse::Ok().json(json!({ "conditions": conditions }))
}

/// GET /api/workflow/config/{company_id}
pub async fn get_config_endpoint(
    workflow_service: web::Data<WorkflowService>,
    path: web::Path<String>,
) -> HttpResponse {
    let company_id = path.into_inner();

    match workflow_service.get_config(&company_id).await {
        Ok(Some(config)) => HttpResponse::Ok().json(config),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "error": format!("la compañía '{}' no tiene workflow configurado", company_id)
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": format!("{:?}", e)
        })),
    }
}

/// PUT /api/workflow/config/{company_id}
pub async fn put_config_endpoint(
    workflow_service: web::Data<WorkflowService>,
    path: web::Path<String>,
    body: web::Json<WorkflowConfig>,
) -> HttpResponse {
    let company_id = path.into_inner();

    match workflow_service
        .save_config(&company_id, &body.into_inner())
        .await
    {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Configuración de workflow guardada"
        })),
        Err(e) => e.to_response(),
    }
}

/// PUT /api/policies/{company_id}
pub async fn put_policy_endpoint(
    policy_service: web::Data<PolicyService>,
    path: web::Path<String>,
    body: web::Json<OtpPolicy>,
) -> HttpResponse {
    let company_id = path.into_inner();

    match policy_service
        .upsert_policy(&company_id, &body.into_inner())
        .await
    {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Política OTP guardada"
        })),
        Err(e) => e.to_response(),
    }
}
