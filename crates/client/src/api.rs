use async_trait::async_trait;
use chrono::NaiveDate;
use custodia_core::domain::acta::Acta;
use custodia_core::domain::chat::Conversation;
use custodia_core::domain::ticket::{Ticket, TicketId};
use custodia_core::{
    ClearanceDocument, Delegation, DelegationId, DocumentId, RecordError, RoleAssignment,
    RoleWorkflowEntry, Signature, SignatureId,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request to `{route}` failed: {message}")]
    Transport { route: String, message: String },
    #[error("`{route}` was not found on the backend")]
    NotFound { route: String },
    #[error("backend answered {status} for `{route}`: {}", .message.as_deref().unwrap_or("no message"))]
    Status { route: String, status: u16, message: Option<String> },
    #[error("could not decode response from `{route}`: {message}")]
    Decode { route: String, message: String },
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The backend refused the request (4xx other than not-found).
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}

/// Outbound delegation payload. `role` is already a backend identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    #[serde(rename = "rol")]
    pub role: String,
    #[serde(rename = "usuarioDelegadoId")]
    pub delegate_user_id: String,
    #[serde(rename = "motivo")]
    pub reason: String,
    #[serde(rename = "fechaFin", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleConfiguration {
    pub assignments: Vec<RoleAssignment>,
    pub workflow: Vec<RoleWorkflowEntry>,
}

/// Seam between the workflow client and the portal backend.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<ClearanceDocument>, ApiError>;
    async fn get_document(&self, document_id: &DocumentId) -> Result<ClearanceDocument, ApiError>;
    async fn list_signatures(&self, document_id: &DocumentId) -> Result<Vec<Signature>, ApiError>;

    async fn sign(
        &self,
        document_id: &DocumentId,
        role_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiError>;
    async fn reject(&self, document_id: &DocumentId, role_id: &str, reason: &str)
        -> Result<(), ApiError>;
    async fn observe(
        &self,
        document_id: &DocumentId,
        signature_id: &SignatureId,
        comment: &str,
    ) -> Result<(), ApiError>;
    async fn request_role_signature(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<(), ApiError>;
    async fn send_to_signature(&self, document_id: &DocumentId) -> Result<(), ApiError>;
    async fn download_signed_pdf(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<Vec<u8>, ApiError>;

    async fn list_delegations(&self) -> Result<Vec<Delegation>, ApiError>;
    async fn create_delegation(&self, request: &DelegationRequest) -> Result<(), ApiError>;
    async fn revoke_delegation(&self, delegation_id: &DelegationId) -> Result<(), ApiError>;

    async fn role_configuration(&self) -> Result<RoleConfiguration, ApiError>;
    async fn update_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), ApiError>;

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, ApiError>;
    async fn list_actas(&self) -> Result<Vec<Acta>, ApiError>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;
}
