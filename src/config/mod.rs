//! config/mod.rs

pub mod service_config;
