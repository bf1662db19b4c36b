use std::sync::Arc;

use custodia_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditSink};
use custodia_core::registry::default_role_workflow;
use custodia_core::{RoleAssignment, ValidationFailure};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{PortalApi, RoleConfiguration};
use crate::audit::outcome_of;
use crate::dispatcher::ActionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationSource {
    Backend,
    /// The backend has no role-configuration endpoint; the fixed default
    /// signing order is used.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadedConfiguration {
    pub source: ConfigurationSource,
    pub configuration: RoleConfiguration,
}

/// Role-to-signer assignments and the signing order.
pub struct RoleAssignments {
    api: Arc<dyn PortalApi>,
    audit: Arc<dyn AuditSink>,
    context: AuditContext,
}

impl RoleAssignments {
    pub fn new(api: Arc<dyn PortalApi>, audit: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        Self { api, audit, context }
    }

    pub async fn load(&self) -> Result<LoadedConfiguration, ActionError> {
        match self.api.role_configuration().await {
            Ok(configuration) => {
                Ok(LoadedConfiguration { source: ConfigurationSource::Backend, configuration })
            }
            Err(error) if error.is_not_found() => {
                warn!(
                    event_name = "clearance.roles.fallback",
                    correlation_id = %self.context.correlation_id,
                    error = %error,
                    "role configuration endpoint missing; using default signing order"
                );
                Ok(LoadedConfiguration {
                    source: ConfigurationSource::Fallback,
                    configuration: RoleConfiguration {
                        assignments: Vec::new(),
                        workflow: default_role_workflow(),
                    },
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn update(&self, assignment: &RoleAssignment) -> Result<LoadedConfiguration, ActionError> {
        let result: Result<LoadedConfiguration, ActionError> = async {
            let assigned_user_id = assignment.assigned_user_id.trim();
            if assigned_user_id.is_empty() {
                return Err(ValidationFailure::EmptyAssignee.into());
            }
            let assignment = RoleAssignment {
                assigned_user_id: assigned_user_id.to_string(),
                department: assignment.department.trim().to_string(),
                role: assignment.role,
            };
            self.api.update_role_assignment(&assignment).await?;
            self.load().await
        }
        .await;

        let mut event = AuditEvent::new(
            &self.context,
            "assignment.update",
            AuditCategory::Assignment,
            outcome_of(&result),
        )
        .with_metadata("role", assignment.role.backend_id());
        match &result {
            Ok(_) => info!(
                event_name = "assignment.update",
                correlation_id = %self.context.correlation_id,
                role = assignment.role.backend_id(),
                "role assignment updated"
            ),
            Err(error) => {
                event = event.with_metadata("error", error.to_string());
                warn!(
                    event_name = "assignment.update",
                    correlation_id = %self.context.correlation_id,
                    role = assignment.role.backend_id(),
                    error = %error,
                    "role assignment update failed"
                );
            }
        }
        self.audit.emit(event);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use custodia_core::audit::{AuditContext, InMemoryAuditSink};
    use custodia_core::{RoleAssignment, RoleWorkflowEntry, SignatureRole};

    use super::{ConfigurationSource, RoleAssignments};
    use crate::api::{ApiError, RoleConfiguration};
    use crate::dispatcher::ActionError;
    use crate::memory::InMemoryPortalApi;

    fn assignments(api: Arc<InMemoryPortalApi>) -> RoleAssignments {
        RoleAssignments::new(
            api,
            Arc::new(InMemoryAuditSink::default()),
            AuditContext::new(None, "req-3", "tests"),
        )
    }

    #[tokio::test]
    async fn missing_endpoint_falls_back_to_default_order() {
        let loaded = assignments(Arc::new(InMemoryPortalApi::new())).load().await.expect("fallback");

        assert_eq!(loaded.source, ConfigurationSource::Fallback);
        let order: Vec<(SignatureRole, u8)> =
            loaded.configuration.workflow.iter().map(|entry| (entry.role, entry.order)).collect();
        assert_eq!(
            order,
            vec![
                (SignatureRole::DirectSupervisor, 1),
                (SignatureRole::InformationTechnology, 2),
                (SignatureRole::Accounting, 3),
                (SignatureRole::FinanceManagement, 4),
                (SignatureRole::HumanResources, 5),
            ]
        );
        assert!(loaded.configuration.workflow.iter().all(|entry| entry.mandatory));
    }

    #[tokio::test]
    async fn other_failures_are_not_masked_by_the_fallback() {
        let api = Arc::new(InMemoryPortalApi::new());
        api.fail_next(
            "role_configuration",
            ApiError::Transport { route: "/x".to_string(), message: "timeout".to_string() },
        );

        let error = assignments(api).load().await.expect_err("transport failure");
        assert!(matches!(error, ActionError::Api(ApiError::Transport { .. })));
    }

    #[tokio::test]
    async fn update_replaces_assignment_and_reloads() {
        let api = Arc::new(InMemoryPortalApi::new().with_configuration(RoleConfiguration {
            assignments: vec![RoleAssignment {
                department: "Sistemas".to_string(),
                role: SignatureRole::InformationTechnology,
                assigned_user_id: "u-1".to_string(),
            }],
            workflow: vec![RoleWorkflowEntry {
                role: SignatureRole::InformationTechnology,
                order: 1,
                mandatory: true,
            }],
        }));

        let loaded = assignments(api.clone())
            .update(&RoleAssignment {
                department: " Sistemas ".to_string(),
                role: SignatureRole::InformationTechnology,
                assigned_user_id: " u-2 ".to_string(),
            })
            .await
            .expect("update");

        assert_eq!(loaded.source, ConfigurationSource::Backend);
        assert_eq!(loaded.configuration.assignments.len(), 1);
        assert_eq!(loaded.configuration.assignments[0].assigned_user_id, "u-2");
        assert_eq!(api.calls_to("role_configuration"), 1);
    }
}
