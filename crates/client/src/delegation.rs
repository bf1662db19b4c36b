use std::sync::Arc;

use custodia_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditSink};
use custodia_core::{translate_role, CreateDelegationInput, Delegation, DelegationId, ValidationFailure};
use tracing::{info, warn};

use crate::api::{DelegationRequest, PortalApi};
use crate::audit::outcome_of;
use crate::dispatcher::ActionError;

/// Creates and revokes delegations. Every change returns the reloaded list.
pub struct DelegationManager {
    api: Arc<dyn PortalApi>,
    audit: Arc<dyn AuditSink>,
    context: AuditContext,
}

impl DelegationManager {
    pub fn new(api: Arc<dyn PortalApi>, audit: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        Self { api, audit, context }
    }

    pub async fn list(&self) -> Result<Vec<Delegation>, ActionError> {
        Ok(self.api.list_delegations().await?)
    }

    pub async fn create(&self, input: &CreateDelegationInput) -> Result<Vec<Delegation>, ActionError> {
        let result: Result<Vec<Delegation>, ActionError> = async {
            let delegate_user_id = input.delegate_user_id.trim();
            if delegate_user_id.is_empty() {
                return Err(ValidationFailure::EmptyDelegate.into());
            }
            let request = DelegationRequest {
                role: translate_role(&input.delegating_role)?.to_string(),
                delegate_user_id: delegate_user_id.to_string(),
                reason: input.reason.trim().to_string(),
                end_date: input.end_date,
            };
            self.api.create_delegation(&request).await?;
            self.reload().await
        }
        .await;

        self.finish("delegation.create", &input.delegating_role, result)
    }

    pub async fn revoke(&self, delegation_id: &DelegationId) -> Result<Vec<Delegation>, ActionError> {
        let result: Result<Vec<Delegation>, ActionError> = async {
            self.api.revoke_delegation(delegation_id).await?;
            self.reload().await
        }
        .await;

        self.finish("delegation.revoke", &delegation_id.0, result)
    }

    async fn reload(&self) -> Result<Vec<Delegation>, ActionError> {
        self.api.list_delegations().await.map_err(ActionError::ReloadFailed)
    }

    fn finish(
        &self,
        event_type: &'static str,
        subject: &str,
        result: Result<Vec<Delegation>, ActionError>,
    ) -> Result<Vec<Delegation>, ActionError> {
        let mut event =
            AuditEvent::new(&self.context, event_type, AuditCategory::Delegation, outcome_of(&result))
                .with_metadata("subject", subject);

        match &result {
            Ok(delegations) => info!(
                event_name = event_type,
                correlation_id = %self.context.correlation_id,
                subject,
                active = delegations.iter().filter(|delegation| delegation.active).count(),
                "delegation change applied"
            ),
            Err(error) => {
                event = event.with_metadata("error", error.to_string());
                warn!(
                    event_name = event_type,
                    correlation_id = %self.context.correlation_id,
                    subject,
                    error = %error,
                    "delegation change failed"
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

    use chrono::NaiveDate;
    use custodia_core::audit::{AuditContext, InMemoryAuditSink};
    use custodia_core::{CreateDelegationInput, DelegationId, SignatureRole, ValidationFailure};

    use super::DelegationManager;
    use crate::dispatcher::ActionError;
    use crate::memory::InMemoryPortalApi;

    fn manager(api: Arc<InMemoryPortalApi>) -> DelegationManager {
        DelegationManager::new(
            api,
            Arc::new(InMemoryAuditSink::default()),
            AuditContext::new(None, "req-9", "tests"),
        )
    }

    fn input(role: &str, delegate: &str) -> CreateDelegationInput {
        CreateDelegationInput {
            delegating_role: role.to_string(),
            delegate_user_id: delegate.to_string(),
            reason: "Vacaciones".to_string(),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 30),
        }
    }

    #[tokio::test]
    async fn blank_delegate_is_refused_without_a_request() {
        let api = Arc::new(InMemoryPortalApi::new());
        let error = manager(api.clone()).create(&input("TI", "  ")).await.expect_err("blank");

        assert!(matches!(error, ActionError::Validation(ValidationFailure::EmptyDelegate)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn create_translates_role_and_reloads() {
        let api = Arc::new(InMemoryPortalApi::new());
        let delegations =
            manager(api.clone()).create(&input("Gerencia Finanzas", " u-42 ")).await.expect("create");

        assert_eq!(delegations.len(), 1);
        assert_eq!(delegations[0].delegating_role, SignatureRole::FinanceManagement);
        assert_eq!(delegations[0].delegate_user_id, "u-42");
        assert_eq!(api.calls_to("list_delegations"), 1);
    }

    #[tokio::test]
    async fn revoke_removes_and_reloads() {
        let api = Arc::new(InMemoryPortalApi::new());
        let manager = manager(api.clone());
        let created = manager.create(&input("RRHH", "u-1")).await.expect("create");

        let remaining = manager.revoke(&created[0].id).await.expect("revoke");
        assert!(remaining.is_empty());

        let missing = manager.revoke(&DelegationId("DEL-404".to_string())).await;
        assert!(matches!(missing, Err(ActionError::Api(_))));
    }
}
