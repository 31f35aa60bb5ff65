//! config/service_config.rs
//! Configuración del proceso (bind, puerto, ruta de la base), leída del
//! entorno con defaults. La configuración por compañía vive en la base.

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_dir: String,
    pub database_file: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 5022,
            database_dir: "data".to_string(),
            database_file: "firma.db".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            bind_addr: std::env::var("FIRMA_BIND").unwrap_or(defaults.bind_addr),
            port: std::env::var("FIRMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_dir: std::env::var("FIRMA_DATA_DIR").unwrap_or(defaults.database_dir),
            database_file: defaults.database_file,
        }
    }
}
