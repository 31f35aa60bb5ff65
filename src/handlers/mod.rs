//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (OTP, workflow, políticas).

pub mod otp_handler;
pub mod workflow_handler;
