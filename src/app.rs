//! app.rs
use crate::handlers::{otp_handler, workflow_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/otp")
                    .route("", web::post().to(otp_handler::otp_action_endpoint))
                    .route(
                        "/verifications/{signature_link_id}",
                        web::get().to(otp_handler::list_verifications_endpoint),
                    ),
            )
            .service(
                web::scope("/workflow")
                    .route(
                        "/evaluate",
                        web::post().to(workflow_handler::evaluate_transition_endpoint),
                    )
                    .route(
                        "/access",
                        web::get().to(workflow_handler::state_access_endpoint),
                    )
                    .route(
                        "/conditions",
                        web::get().to(workflow_handler::list_conditions_endpoint),
                    )
                    .route(
                        "/config/{company_id}",
                        web::get().to(workflow_handler::get_config_endpoint),
                    )
                    .route(
                        "/config/{company_id}",
                        web::put().to(workflow_handler::put_config_endpoint),
                    ),
            )
            .service(web::scope("/policies").route(
                "/{company_id}",
                web::put().to(workflow_handler::put_policy_endpoint),
            )),
    );
}
