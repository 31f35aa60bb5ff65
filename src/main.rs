use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::service_config::ServiceConfig;
use crate::logger::init_logger;
use crate::services::channel_dispatcher::ChannelDispatcher;
use crate::services::email_service::EmailService;
use crate::services::otp_service::OtpService;
use crate::services::policy_service::PolicyService;
use crate::services::workflow_service::WorkflowService;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(config: &ServiceConfig) -> Pool<Sqlite> {
    std::fs::create_dir_all(&config.database_dir).expect("No se pudo crear el directorio de datos");

    let db_path = std::env::current_dir()
        .expect("No se pudo obtener el current_dir")
        .join(&config.database_dir)
        .join(&config.database_file);
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

    log::info!("Conectando a SQLite en {}", db_url);

    SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let service_config = ServiceConfig::from_env();
    let db_pool = setup_database(&service_config).await;

    // Verificar la conexión
    let conn = db_pool.acquire().await.expect("Falló la conexión");
    drop(conn);

    // PolicyService corre las migraciones al arrancar
    let policy_service = PolicyService::new(db_pool.clone());
    if let Err(e) = policy_service.run_migrations().await {
        panic!("Fallo en migraciones: {:?}", e);
    }

    // WorkflowService
    let workflow_service = WorkflowService::new(db_pool.clone());

    // Dispatcher de canales + OtpService
    let email_service = EmailService::new();
    let dispatcher = ChannelDispatcher::new(email_service);
    let otp_service = OtpService::new(db_pool.clone(), policy_service.clone(), dispatcher);

    log::info!(
        "Levantando servidor en {}:{}",
        service_config.bind_addr,
        service_config.port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(otp_service.clone()))
            .app_data(web::Data::new(policy_service.clone()))
            .app_data(web::Data::new(workflow_service.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((service_config.bind_addr.as_str(), service_config.port))?
    .run()
    .await
}
