//! handlers/otp_handler.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::models::otp_model::OtpActionRequest;
use crate::services::{otp_service::OtpService, policy_service::PolicyService};

/// POST /api/otp — despacha según `action`: send / verify / get_policy.
pub async fn otp_action_endpoint(
    http_req: HttpRequest,
    body: web::Json<OtpActionRequest>,
    otp_service: web::Data<OtpService>,
    policy_service: web::Data<PolicyService>,
) -> HttpResponse {
    match body.into_inner() {
        OtpActionRequest::Send(req) => match otp_service.send_otp(req).await {
            Ok(resp) => HttpResponse::Ok().json(resp),
            Err(e) => e.to_response(),
        },
        OtpActionRequest::Verify(req) => {
            let request_ip = http_req
                .connection_info()
                .realip_remote_addr()
                .map(|s| s.to_string());
            let user_agent = http_req
                .headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            match otp_service
                .verify_otp(&req, request_ip.as_deref(), user_agent.as_deref())
                .await
            {
                Ok(resp) => HttpResponse::Ok().json(resp),
                Err(e) => e.to_response(),
            }
        }
        OtpActionRequest::GetPolicy(req) => {
            match policy_service.get_policy_summary(&req.company_id).await {
                Ok(summary) => HttpResponse::Ok().json(summary),
                Err(e) => {
                    log::error!("(get_policy) sale={} error: {:?}", req.sale_id, e);
                    HttpResponse::InternalServerError().json(json!({
                        "error": format!("{:?}", e)
                    }))
                }
            }
        }
    }
}

/// GET /api/otp/verifications/{signature_link_id} — auditoría del link.
pub async fn list_verifications_endpoint(
    otp_service: web::Data<OtpService>,
    path: web::Path<String>,
) -> HttpResponse {
    let signature_link_id = path.into_inner();

    match otp_service.list_verifications(&signature_link_id).await {
        Ok(records) => HttpResponse::Ok().json(json!({
            "success": true,
            "verifications": records
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": format!("{:?}", e)
        })),
    }
}
