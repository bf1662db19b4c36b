use std::path::{Path, PathBuf};
use std::sync::Arc;

use custodia_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditSink};
use custodia_core::{
    summarize, translate_role, ChecklistProgress, DocumentId, DomainError, RoleChecklist,
    RoleError, RoleLookupError, RoleRegistry, Signature, SignatureAction, SignatureId,
    SignatureOverview, ValidationFailure,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, PortalApi};
use crate::audit::outcome_of;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Role(#[from] RoleError),
    #[error(transparent)]
    RoleConfiguration(#[from] RoleLookupError),
    #[error(transparent)]
    Workflow(#[from] DomainError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("action succeeded but reloading signatures failed: {0}")]
    ReloadFailed(ApiError),
    #[error("signed PDF download failed: {0}")]
    Download(String),
    #[error("another action is still in progress")]
    Busy,
    #[error("the view changed while the action was in flight")]
    Stale,
    #[error("`{action}` is not available for role `{role}` yet")]
    NotAvailable { action: &'static str, role: String },
}

impl ActionError {
    /// Whether the request was refused, as opposed to failing to complete.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Api(error) => error.is_client_rejection(),
            Self::ReloadFailed(_) | Self::Download(_) => false,
            _ => true,
        }
    }

    /// Toast text for the operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationFailure::IncompleteChecklist { checked, total }) => {
                format!("Complete all verifications before signing ({checked} of {total} checked).")
            }
            Self::Validation(ValidationFailure::EmptyReason) => {
                "Enter a reason for the rejection.".to_string()
            }
            Self::Validation(ValidationFailure::EmptyComment) => {
                "Enter the observation before sending it.".to_string()
            }
            Self::Validation(ValidationFailure::EmptyDelegate) => {
                "Select the user who will receive the delegation.".to_string()
            }
            Self::Validation(ValidationFailure::UnknownChecklistItem { item, total }) => {
                format!("Checklist item {item} does not exist; choose an item from 1 to {total}.")
            }
            Self::Validation(ValidationFailure::EmptyAssignee) => {
                "Select the user who will sign for this role.".to_string()
            }
            Self::Role(error) => error.to_string(),
            Self::RoleConfiguration(error) => error.to_string(),
            Self::Workflow(_) | Self::NotAvailable { .. } => {
                "This action is not available for the document in its current state.".to_string()
            }
            Self::Api(ApiError::Status { message: Some(message), .. }) => message.clone(),
            Self::Api(ApiError::Status { .. }) => "The portal rejected the request.".to_string(),
            Self::Api(ApiError::NotFound { .. }) => {
                "The requested record no longer exists on the portal.".to_string()
            }
            Self::Api(ApiError::Transport { .. }) => {
                "Could not reach the portal. Check the connection and try again.".to_string()
            }
            Self::Api(ApiError::Decode { .. } | ApiError::Record(_)) => {
                "The portal returned data this client cannot read.".to_string()
            }
            Self::ReloadFailed(_) => {
                "The action was saved but the signature list could not be refreshed.".to_string()
            }
            Self::Download(_) => "Could not download the signed PDF.".to_string(),
            Self::Busy => "Wait for the current action to finish.".to_string(),
            Self::Stale => "The document changed while the action ran. Reload and try again."
                .to_string(),
        }
    }
}

/// Fresh signature list fetched after a state-changing action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reloaded {
    pub document_id: DocumentId,
    pub signatures: Vec<Signature>,
    pub overview: SignatureOverview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestRoute {
    PerRole,
    /// The per-role endpoint was missing and the generic send-to-signature
    /// request was used instead.
    SendToSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestOutcome {
    pub route: RequestRoute,
    pub reloaded: Reloaded,
}

/// Validates local preconditions, sends signature actions and reloads the
/// signature list after each success.
pub struct ActionDispatcher {
    api: Arc<dyn PortalApi>,
    registry: Arc<RoleRegistry>,
    audit: Arc<dyn AuditSink>,
    context: AuditContext,
    download_dir: PathBuf,
}

impl ActionDispatcher {
    pub fn new(
        api: Arc<dyn PortalApi>,
        registry: Arc<RoleRegistry>,
        audit: Arc<dyn AuditSink>,
        context: AuditContext,
    ) -> Self {
        Self { api, registry, audit, context, download_dir: PathBuf::from(".") }
    }

    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    pub fn api(&self) -> &Arc<dyn PortalApi> {
        &self.api
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn checklist(&self, role: &str) -> Result<&RoleChecklist, RoleLookupError> {
        self.registry.lookup(role)
    }

    pub async fn sign(
        &self,
        document_id: &DocumentId,
        role: &str,
        progress: &ChecklistProgress,
        comment: Option<&str>,
    ) -> Result<Reloaded, ActionError> {
        let result: Result<Reloaded, ActionError> = async {
            let checklist = self.registry.lookup(role)?;
            ensure_checklist_complete(checklist, progress)?;
            let role_id = translate_role(role)?;
            let comment = comment.map(str::trim).filter(|comment| !comment.is_empty());
            self.api.sign(document_id, role_id, comment).await?;
            self.reload(document_id).await
        }
        .await;
        self.finish(document_id, SignatureAction::Sign, Some(role), result)
    }

    pub async fn reject(
        &self,
        document_id: &DocumentId,
        role: &str,
        reason: &str,
    ) -> Result<Reloaded, ActionError> {
        let result: Result<Reloaded, ActionError> = async {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(ValidationFailure::EmptyReason.into());
            }
            let role_id = translate_role(role)?;
            self.api.reject(document_id, role_id, reason).await?;
            self.reload(document_id).await
        }
        .await;
        self.finish(document_id, SignatureAction::Reject, Some(role), result)
    }

    pub async fn observe(
        &self,
        document_id: &DocumentId,
        signature_id: &SignatureId,
        comment: &str,
    ) -> Result<Reloaded, ActionError> {
        let result: Result<Reloaded, ActionError> = async {
            let comment = comment.trim();
            if comment.is_empty() {
                return Err(ValidationFailure::EmptyComment.into());
            }
            self.api.observe(document_id, signature_id, comment).await?;
            self.reload(document_id).await
        }
        .await;
        self.finish(document_id, SignatureAction::Observe, None, result)
    }

    /// Asks `role` to sign. Falls back once to the generic send-to-signature
    /// request when the per-role endpoint does not exist.
    pub async fn request_signature(
        &self,
        document_id: &DocumentId,
        role: &str,
    ) -> Result<RequestOutcome, ActionError> {
        let result: Result<RequestOutcome, ActionError> = async {
            let role_id = translate_role(role)?;
            let route = match self.api.request_role_signature(document_id, role_id).await {
                Ok(()) => RequestRoute::PerRole,
                Err(error) if error.is_not_found() => {
                    warn!(
                        event_name = "clearance.signature.request_fallback",
                        document_id = %document_id.0,
                        role = role_id,
                        error = %error,
                        "per-role signature request endpoint missing; sending document to signature"
                    );
                    self.api.send_to_signature(document_id).await?;
                    RequestRoute::SendToSignature
                }
                Err(error) => return Err(error.into()),
            };
            let reloaded = self.reload(document_id).await?;
            Ok(RequestOutcome { route, reloaded })
        }
        .await;
        self.finish(document_id, SignatureAction::RequestSignature, Some(role), result)
    }

    /// Saves the signed PDF for `role` under the download directory.
    pub async fn download_signed_pdf(
        &self,
        document_id: &DocumentId,
        role: &str,
    ) -> Result<PathBuf, ActionError> {
        let result: Result<PathBuf, ActionError> = async {
            let role_id = translate_role(role)?;
            let bytes = self
                .api
                .download_signed_pdf(document_id, role_id)
                .await
                .map_err(|error| ActionError::Download(error.to_string()))?;
            let target = self.download_dir.join(pdf_file_name(document_id, role_id));
            write_download(&self.download_dir, &target, &bytes)
                .await
                .map_err(|error| ActionError::Download(error.to_string()))?;
            Ok(target)
        }
        .await;
        self.finish(document_id, SignatureAction::DownloadSignedPdf, Some(role), result)
    }

    pub(crate) async fn reload(&self, document_id: &DocumentId) -> Result<Reloaded, ActionError> {
        let signatures =
            self.api.list_signatures(document_id).await.map_err(ActionError::ReloadFailed)?;
        let overview = summarize(Some(signatures.as_slice()));
        Ok(Reloaded { document_id: document_id.clone(), signatures, overview })
    }

    fn finish<T>(
        &self,
        document_id: &DocumentId,
        action: SignatureAction,
        role: Option<&str>,
        result: Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let outcome = outcome_of(&result);
        let category = match action {
            SignatureAction::DownloadSignedPdf => AuditCategory::Artifact,
            _ => AuditCategory::Signature,
        };
        let event_type = format!("signature.{}", action.as_str());

        let mut event = AuditEvent::new(
            &self.context.with_document(document_id),
            event_type.as_str(),
            category,
            outcome,
        );
        if let Some(role) = role {
            event = event.with_metadata("role", role);
        }

        match &result {
            Ok(_) => info!(
                event_name = %event_type,
                correlation_id = %self.context.correlation_id,
                document_id = %document_id.0,
                role = role.unwrap_or_default(),
                "clearance action completed"
            ),
            Err(error) => {
                event = event.with_metadata("error", error.to_string());
                warn!(
                    event_name = %event_type,
                    correlation_id = %self.context.correlation_id,
                    document_id = %document_id.0,
                    role = role.unwrap_or_default(),
                    error = %error,
                    "clearance action did not complete"
                );
            }
        }
        self.audit.emit(event);
        result
    }
}

fn ensure_checklist_complete(
    checklist: &RoleChecklist,
    progress: &ChecklistProgress,
) -> Result<(), ValidationFailure> {
    let total = checklist.checklist.len();
    if progress.total() != total {
        return Err(ValidationFailure::IncompleteChecklist {
            checked: progress.checked_count().min(total),
            total,
        });
    }
    progress.ensure_complete()
}

fn pdf_file_name(document_id: &DocumentId, role_id: &str) -> String {
    let safe = |raw: &str| -> String {
        raw.chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
            .collect()
    };
    format!("paz-y-salvo-{}-{}.pdf", safe(&document_id.0), safe(role_id))
}

async fn write_download(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(target, bytes).await
}
