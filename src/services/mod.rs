//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod channel_dispatcher;
pub mod email_service;
pub mod otp_service;
pub mod policy_service;
pub mod whatsapp_service;
pub mod workflow_service;
