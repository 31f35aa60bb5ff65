//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod otp_model;
pub mod policy_model;
pub mod workflow_model;
