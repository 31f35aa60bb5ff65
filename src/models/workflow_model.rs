//! models/workflow_model.rs
//! Reglas de transición y matriz de acceso por estado. Los estados de la
//! venta son datos (strings abiertos); los roles son un enum cerrado.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Vendedor,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::Vendedor => "vendedor",
            Role::Auditor => "auditor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catálogo fijo de condiciones del sistema. El evaluador las trata como
/// etiquetas opacas: la verdad de cada una la decide el subsistema dueño
/// del dato (firmas, documentos, pagos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInCondition {
    SignatureCompleted,
    DocumentsVerified,
    PaymentConfirmed,
    AuditApproved,
}

impl BuiltInCondition {
    pub const ALL: [BuiltInCondition; 4] = [
        BuiltInCondition::SignatureCompleted,
        BuiltInCondition::DocumentsVerified,
        BuiltInCondition::PaymentConfirmed,
        BuiltInCondition::AuditApproved,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            BuiltInCondition::SignatureCompleted => "signature_completed",
            BuiltInCondition::DocumentsVerified => "documents_verified",
            BuiltInCondition::PaymentConfirmed => "payment_confirmed",
            BuiltInCondition::AuditApproved => "audit_approved",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuiltInCondition::SignatureCompleted => "Firma completada",
            BuiltInCondition::DocumentsVerified => "Documentos verificados",
            BuiltInCondition::PaymentConfirmed => "Pago confirmado",
            BuiltInCondition::AuditApproved => "Auditoría aprobada",
        }
    }
}

/// Condición declarada en una regla: del catálogo o etiqueta libre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionCondition {
    BuiltIn { key: BuiltInCondition },
    Custom { label: String },
}

impl TransitionCondition {
    pub fn display(&self) -> String {
        match self {
            TransitionCondition::BuiltIn { key } => key.label().to_string(),
            TransitionCondition::Custom { label } => label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRule {
    pub id: String,
    pub from: String,
    pub to: String,
    pub allowed_roles: Vec<Role>,
    #[serde(default)]
    pub conditions: Vec<TransitionCondition>,
    #[serde(default)]
    pub require_note: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateAccessRule {
    pub state: String,
    pub visible_to: Vec<Role>,
    pub editable_by: Vec<Role>,
}

/// Configuración completa de workflow de una compañía. Con `is_active`
/// en false no se valida ninguna transición (modo legado permisivo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
    #[serde(default)]
    pub state_access: Vec<StateAccessRule>,
    pub is_active: bool,
}

impl WorkflowConfig {
    /// Validación dura al guardar: reglas sin roles o con from == to no
    /// tienen sentido, y editable_by debe ser subconjunto de visible_to.
    pub fn validate(&self) -> Result<(), String> {
        for rule in &self.transitions {
            if rule.from == rule.to {
                return Err(format!(
                    "regla '{}': origen y destino no pueden ser iguales ('{}')",
                    rule.id, rule.from
                ));
            }
            if rule.allowed_roles.is_empty() {
                return Err(format!(
                    "regla '{}': allowed_roles no puede estar vacío",
                    rule.id
                ));
            }
        }
        for access in &self.state_access {
            for role in &access.editable_by {
                if !access.visible_to.contains(role) {
                    return Err(format!(
                        "estado '{}': el rol '{}' puede editar pero no ver",
                        access.state, role
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Resultado de evaluar una transición propuesta.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Condiciones declaradas que el caller debe confirmar por su cuenta
    pub conditions: Vec<String>,
    pub note_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateTransitionRequest {
    pub company_id: String,
    pub from: String,
    pub to: String,
    pub role: Role,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessQuery {
    pub company_id: String,
    pub state: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    pub state: String,
    pub role: Role,
    pub visible: bool,
    pub editable: bool,
}
