//! tests/workflow_tests.rs
//! Pruebas del evaluador de transiciones, la matriz de acceso y la
//! validación de políticas/configs.

#[cfg(test)]
mod tests {
    use actix_rt::test;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::errors::ServiceError;
    use crate::models::policy_model::{OtpChannel, OtpPolicy};
    use crate::models::workflow_model::{
        AccessQuery, BuiltInCondition, EvaluateTransitionRequest, Role, StateAccessRule,
        TransitionCondition, TransitionRule, WorkflowConfig,
    };
    use crate::services::policy_service::PolicyService;
    use crate::services::workflow_service::{
        evaluate_transition, is_editable, is_transition_allowed, is_visible, WorkflowService,
    };

    fn sample_config() -> WorkflowConfig {
        WorkflowConfig {
            transitions: vec![
                TransitionRule {
                    id: "r1".to_string(),
                    from: "borrador".to_string(),
                    to: "enviado".to_string(),
                    allowed_roles: vec![Role::Vendedor],
                    conditions: vec![],
                    require_note: false,
                },
                TransitionRule {
                    id: "r2".to_string(),
                    from: "enviado".to_string(),
                    to: "en_auditoria".to_string(),
                    allowed_roles: vec![Role::Auditor, Role::Admin],
                    conditions: vec![
                        TransitionCondition::BuiltIn {
                            key: BuiltInCondition::SignatureCompleted,
                        },
                        TransitionCondition::Custom {
                            label: "Póliza revisada por legales".to_string(),
                        },
                    ],
                    require_note: true,
                },
            ],
            state_access: vec![StateAccessRule {
                state: "en_auditoria".to_string(),
                visible_to: vec![Role::Auditor, Role::Admin, Role::Supervisor],
                editable_by: vec![Role::Auditor],
            }],
            is_active: true,
        }
    }

    // ========================================================
    // Evaluador (puro)
    // ========================================================

    #[test]
    async fn test_inactive_config_allows_everything() {
        let mut config = sample_config();
        config.is_active = false;

        assert!(is_transition_allowed(
            &config,
            "cualquiera",
            "otro",
            Role::Vendedor
        ));
        let decision = evaluate_transition(&config, "x", "y", Role::Auditor, None);
        assert!(decision.allowed);
        assert!(decision.conditions.is_empty());
        assert!(!decision.note_required);
    }

    #[test]
    async fn test_missing_rule_is_not_allowed() {
        let config = sample_config();
        assert!(!is_transition_allowed(
            &config,
            "borrador",
            "cancelado",
            Role::Admin
        ));

        let decision = evaluate_transition(&config, "borrador", "cancelado", Role::Admin, None);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("no definida"));
    }

    #[test]
    async fn test_role_gating() {
        let config = sample_config();

        assert!(is_transition_allowed(
            &config,
            "borrador",
            "enviado",
            Role::Vendedor
        ));
        assert!(!is_transition_allowed(
            &config,
            "borrador",
            "enviado",
            Role::Auditor
        ));

        let decision = evaluate_transition(&config, "borrador", "enviado", Role::Auditor, None);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("auditor"));
    }

    #[test]
    async fn test_note_required_rejects_empty_note() {
        let config = sample_config();

        for note in [None, Some(""), Some("   ")] {
            let decision =
                evaluate_transition(&config, "enviado", "en_auditoria", Role::Auditor, note);
            assert!(!decision.allowed, "nota vacía debió rechazar");
            assert!(decision.note_required);
            assert!(decision.reason.unwrap().contains("nota"));
        }

        let decision = evaluate_transition(
            &config,
            "enviado",
            "en_auditoria",
            Role::Auditor,
            Some("cliente confirmó por teléfono"),
        );
        assert!(decision.allowed);
        assert!(decision.note_required);
    }

    #[test]
    async fn test_conditions_reported_as_labels() {
        let config = sample_config();
        let decision = evaluate_transition(
            &config,
            "enviado",
            "en_auditoria",
            Role::Admin,
            Some("ok"),
        );

        assert!(decision.allowed);
        assert_eq!(
            decision.conditions,
            vec![
                "Firma completada".to_string(),
                "Póliza revisada por legales".to_string()
            ]
        );
    }

    // ========================================================
    // Matriz de acceso
    // ========================================================

    #[test]
    async fn test_state_access_defaults() {
        let config = sample_config();

        // Estado sin regla: visible para todos, editable por nadie.
        assert!(is_visible(&config, "borrador", Role::Vendedor));
        assert!(!is_editable(&config, "borrador", Role::Admin));
    }

    #[test]
    async fn test_state_access_membership() {
        let config = sample_config();

        assert!(is_visible(&config, "en_auditoria", Role::Supervisor));
        assert!(!is_visible(&config, "en_auditoria", Role::Vendedor));
        assert!(is_editable(&config, "en_auditoria", Role::Auditor));
        assert!(!is_editable(&config, "en_auditoria", Role::Supervisor));
    }

    // ========================================================
    // Validación de configs y políticas
    // ========================================================

    #[test]
    async fn test_config_validation_rejects_same_from_to() {
        let mut config = sample_config();
        config.transitions[0].to = "borrador".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    async fn test_config_validation_rejects_empty_roles() {
        let mut config = sample_config();
        config.transitions[0].allowed_roles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    async fn test_config_validation_rejects_editor_who_cannot_see() {
        let mut config = sample_config();
        config.state_access[0].editable_by.push(Role::Vendedor);
        let err = config.validate().unwrap_err();
        assert!(err.contains("vendedor"));
    }

    #[test]
    async fn test_config_json_blob_round_trip() {
        // La forma que guarda el panel de administración.
        let raw = r#"{
            "transitions": [{
                "id": "r1",
                "from": "borrador",
                "to": "enviado",
                "allowed_roles": ["vendedor"],
                "conditions": [{"type": "built_in", "key": "documents_verified"}],
                "require_note": false
            }],
            "state_access": [],
            "is_active": true
        }"#;

        let config: WorkflowConfig = serde_json::from_str(raw).expect("JSON inválido");
        assert!(is_transition_allowed(
            &config,
            "borrador",
            "enviado",
            Role::Vendedor
        ));
        let decision = evaluate_transition(&config, "borrador", "enviado", Role::Vendedor, None);
        assert_eq!(decision.conditions, vec!["Documentos verificados"]);
    }

    #[test]
    async fn test_policy_validation() {
        let mut policy = OtpPolicy::default();
        assert!(policy.validate().is_ok());

        policy.otp_length = 5;
        assert!(policy.validate().is_err());
        policy.otp_length = 6;

        policy.allowed_channels.clear();
        assert!(policy.validate().is_err());

        policy.allowed_channels = vec![OtpChannel::Whatsapp];
        // default_channel (email) fuera del set permitido
        assert!(policy.validate().is_err());
    }

    // ========================================================
    // Servicios con persistencia
    // ========================================================

    async fn test_pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("No se pudo abrir SQLite en memoria");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Fallo en migraciones de test");
        pool
    }

    #[test]
    async fn test_workflow_service_round_trip() {
        let pool = test_pool().await;
        let service = WorkflowService::new(pool);

        assert!(service.get_config("comp-1").await.unwrap().is_none());

        service
            .save_config("comp-1", &sample_config())
            .await
            .expect("guardar falló");

        let loaded = service.get_config("comp-1").await.unwrap().unwrap();
        assert!(loaded.is_active);
        assert_eq!(loaded.transitions.len(), 2);

        let decision = service
            .evaluate(&EvaluateTransitionRequest {
                company_id: "comp-1".to_string(),
                from: "borrador".to_string(),
                to: "enviado".to_string(),
                role: Role::Vendedor,
                note: None,
            })
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    #[test]
    async fn test_workflow_service_without_config_is_permissive() {
        let pool = test_pool().await;
        let service = WorkflowService::new(pool);

        let decision = service
            .evaluate(&EvaluateTransitionRequest {
                company_id: "comp-sin-config".to_string(),
                from: "a".to_string(),
                to: "b".to_string(),
                role: Role::Vendedor,
                note: None,
            })
            .await
            .unwrap();
        assert!(decision.allowed, "sin config rige el modo legado");
    }

    #[test]
    async fn test_workflow_service_rejects_invalid_config() {
        let pool = test_pool().await;
        let service = WorkflowService::new(pool);

        let mut config = sample_config();
        config.transitions[0].allowed_roles.clear();

        let err = service.save_config("comp-1", &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    async fn test_access_endpoint_defaults_without_config() {
        let pool = test_pool().await;
        let service = WorkflowService::new(pool);

        let resp = service
            .access(&AccessQuery {
                company_id: "comp-x".to_string(),
                state: "enviado".to_string(),
                role: Role::Vendedor,
            })
            .await
            .unwrap();
        assert!(resp.visible);
        assert!(!resp.editable);
    }

    #[test]
    async fn test_policy_service_default_and_round_trip() {
        let pool = test_pool().await;
        let service = PolicyService::new(pool);

        // Sin fila: política por defecto
        let policy = service.get_policy("comp-1").await.unwrap();
        assert!(policy.require_otp);
        assert_eq!(policy.otp_length, 6);
        assert_eq!(policy.allowed_channels, vec![OtpChannel::Email]);

        let mut custom = OtpPolicy::default();
        custom.otp_length = 8;
        custom.smtp_relay_url = Some("http://relay.interno/send".to_string());
        service.upsert_policy("comp-1", &custom).await.unwrap();

        let loaded = service.get_policy("comp-1").await.unwrap();
        assert_eq!(loaded.otp_length, 8);
        assert_eq!(
            loaded.smtp_relay_url.as_deref(),
            Some("http://relay.interno/send")
        );

        let summary = service.get_policy_summary("comp-1").await.unwrap();
        assert!(summary.require_otp);
        assert_eq!(summary.default_channel, OtpChannel::Email);
    }

    #[test]
    async fn test_policy_service_rejects_invalid_policy() {
        let pool = test_pool().await;
        let service = PolicyService::new(pool);

        let mut bad = OtpPolicy::default();
        bad.otp_length = 7;

        let err = service.upsert_policy("comp-1", &bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
