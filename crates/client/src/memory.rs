//! In-process `PortalApi` that behaves like the backend for tests and dry runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use custodia_core::domain::acta::Acta;
use custodia_core::domain::chat::Conversation;
use custodia_core::domain::ticket::{Ticket, TicketId};
use custodia_core::workflow::derive_document_status;
use custodia_core::{
    ClearanceDocument, Delegation, DelegationId, DocumentId, DocumentStatus, RoleAssignment,
    Signature, SignatureId, SignatureRole, SignatureState,
};

use crate::api::{ApiError, DelegationRequest, PortalApi, RoleConfiguration};
use crate::routes;

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<String, ClearanceDocument>,
    delegations: Vec<Delegation>,
    configuration: Option<RoleConfiguration>,
    tickets: BTreeMap<String, Ticket>,
    actas: Vec<Acta>,
    conversations: Vec<Conversation>,
    failures: HashMap<&'static str, ApiError>,
    missing: HashSet<&'static str>,
    calls: Vec<String>,
    next_id: u64,
}

#[derive(Default)]
pub struct InMemoryPortalApi {
    state: Mutex<MemoryState>,
}

impl InMemoryPortalApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document: ClearanceDocument) -> Self {
        self.state_mut().documents.insert(document.id.0.clone(), document);
        self
    }

    pub fn with_configuration(mut self, configuration: RoleConfiguration) -> Self {
        self.state_mut().configuration = Some(configuration);
        self
    }

    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.state_mut().delegations.push(delegation);
        self
    }

    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        self.state_mut().tickets.insert(ticket.id.0.clone(), ticket);
        self
    }

    pub fn with_acta(mut self, acta: Acta) -> Self {
        self.state_mut().actas.push(acta);
        self
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.state_mut().conversations.push(conversation);
        self
    }

    /// The next call to `operation` fails with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.state().failures.insert(operation, error);
    }

    /// Every call to `operation` answers not-found, as if the endpoint did not exist.
    pub fn remove_endpoint(&self, operation: &'static str) {
        self.state().missing.insert(operation);
    }

    pub fn replace_conversations(&self, conversations: Vec<Conversation>) {
        self.state().conversations = conversations;
    }

    pub fn document(&self, document_id: &str) -> Option<ClearanceDocument> {
        self.state().documents.get(document_id).cloned()
    }

    /// Calls in arrival order, formatted as `operation target`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        let prefix = format!("{operation} ");
        self.state().calls.iter().filter(|call| call.starts_with(&prefix)).count()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn enter(
        &self,
        operation: &'static str,
        route: &routes::Route,
    ) -> Result<MutexGuard<'_, MemoryState>, ApiError> {
        let mut state = self.state();
        state.calls.push(format!("{operation} {route}"));
        if state.missing.contains(operation) {
            return Err(ApiError::NotFound { route: route.to_string() });
        }
        if let Some(error) = state.failures.remove(operation) {
            return Err(error);
        }
        Ok(state)
    }
}

fn not_found(route: &routes::Route) -> ApiError {
    ApiError::NotFound { route: route.to_string() }
}

fn conflict(route: &routes::Route, message: &str) -> ApiError {
    ApiError::Status { route: route.to_string(), status: 409, message: Some(message.to_string()) }
}

fn role_from_id(route: &routes::Route, role_id: &str) -> Result<SignatureRole, ApiError> {
    SignatureRole::from_label(role_id).map_err(|_| ApiError::Status {
        route: route.to_string(),
        status: 400,
        message: Some(format!("Rol desconocido: {role_id}")),
    })
}

fn resolve_signature(
    state: &mut MemoryState,
    route: &routes::Route,
    document_id: &DocumentId,
    role_id: &str,
    target: SignatureState,
    comment: Option<&str>,
) -> Result<(), ApiError> {
    let role = role_from_id(route, role_id)?;
    let document = state.documents.get_mut(&document_id.0).ok_or_else(|| not_found(route))?;
    if document.status != DocumentStatus::InSignature {
        return Err(conflict(route, "El documento no está en firma"));
    }

    let signature = document
        .signatures
        .iter_mut()
        .find(|signature| signature.role == role)
        .ok_or_else(|| not_found(route))?;
    if signature.state != SignatureState::Pending {
        return Err(conflict(route, "La firma ya fue procesada"));
    }

    signature.state = target;
    signature.signed_at = Some(Utc::now());
    signature.comment = comment.map(str::to_string);
    if target == SignatureState::Signed {
        signature.signature_hash = Some(format!("hash-{}-{}", document_id.0, role.backend_id()));
    }
    document.status = derive_document_status(document.status, &document.signatures);
    Ok(())
}

#[async_trait]
impl PortalApi for InMemoryPortalApi {
    async fn list_documents(&self) -> Result<Vec<ClearanceDocument>, ApiError> {
        let state = self.enter("list_documents", &routes::documents())?;
        Ok(state.documents.values().cloned().collect())
    }

    async fn get_document(&self, document_id: &DocumentId) -> Result<ClearanceDocument, ApiError> {
        let route = routes::document(&document_id.0);
        let state = self.enter("get_document", &route)?;
        state.documents.get(&document_id.0).cloned().ok_or_else(|| not_found(&route))
    }

    async fn list_signatures(&self, document_id: &DocumentId) -> Result<Vec<Signature>, ApiError> {
        let route = routes::signatures(&document_id.0);
        let state = self.enter("list_signatures", &route)?;
        state
            .documents
            .get(&document_id.0)
            .map(|document| document.signatures.clone())
            .ok_or_else(|| not_found(&route))
    }

    async fn sign(
        &self,
        document_id: &DocumentId,
        role_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        let route = routes::sign(&document_id.0, role_id);
        let mut state = self.enter("sign", &route)?;
        resolve_signature(&mut state, &route, document_id, role_id, SignatureState::Signed, comment)
    }

    async fn reject(
        &self,
        document_id: &DocumentId,
        role_id: &str,
        reason: &str,
    ) -> Result<(), ApiError> {
        let route = routes::reject(&document_id.0, role_id);
        let mut state = self.enter("reject", &route)?;
        resolve_signature(
            &mut state,
            &route,
            document_id,
            role_id,
            SignatureState::Rejected,
            Some(reason),
        )
    }

    async fn observe(
        &self,
        document_id: &DocumentId,
        signature_id: &SignatureId,
        comment: &str,
    ) -> Result<(), ApiError> {
        let route = routes::observe(&document_id.0, &signature_id.0);
        let mut state = self.enter("observe", &route)?;
        let document = state.documents.get_mut(&document_id.0).ok_or_else(|| not_found(&route))?;
        let signature = document
            .signatures
            .iter_mut()
            .find(|signature| signature.id == *signature_id)
            .ok_or_else(|| not_found(&route))?;
        signature.comment = Some(comment.to_string());
        Ok(())
    }

    async fn request_role_signature(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<(), ApiError> {
        let route = routes::request_signature(&document_id.0, role_id);
        let mut state = self.enter("request_role_signature", &route)?;
        role_from_id(&route, role_id)?;
        let document = state.documents.get_mut(&document_id.0).ok_or_else(|| not_found(&route))?;
        if document.status == DocumentStatus::Draft {
            document.status = DocumentStatus::InSignature;
        }
        Ok(())
    }

    async fn send_to_signature(&self, document_id: &DocumentId) -> Result<(), ApiError> {
        let route = routes::send_to_signature(&document_id.0);
        let mut state = self.enter("send_to_signature", &route)?;
        let document = state.documents.get_mut(&document_id.0).ok_or_else(|| not_found(&route))?;
        match document.status {
            DocumentStatus::Draft => {
                document.status = DocumentStatus::InSignature;
                Ok(())
            }
            DocumentStatus::InSignature => Ok(()),
            _ => Err(conflict(&route, "El documento ya no admite solicitudes de firma")),
        }
    }

    async fn download_signed_pdf(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let route = routes::signed_pdf(&document_id.0, role_id);
        let state = self.enter("download_signed_pdf", &route)?;
        let role = role_from_id(&route, role_id)?;
        let signed = state
            .documents
            .get(&document_id.0)
            .and_then(|document| document.signature_for(role))
            .is_some_and(|signature| signature.state == SignatureState::Signed);
        if !signed {
            return Err(not_found(&route));
        }
        Ok(format!("%PDF-1.4\n% {} {}\n%%EOF\n", document_id.0, role.backend_id()).into_bytes())
    }

    async fn list_delegations(&self) -> Result<Vec<Delegation>, ApiError> {
        let state = self.enter("list_delegations", &routes::delegations())?;
        Ok(state.delegations.clone())
    }

    async fn create_delegation(&self, request: &DelegationRequest) -> Result<(), ApiError> {
        let route = routes::delegations();
        let mut state = self.enter("create_delegation", &route)?;
        let role = role_from_id(&route, &request.role)?;
        state.next_id += 1;
        let id = DelegationId(format!("DEL-{}", state.next_id));
        state.delegations.push(Delegation {
            id,
            delegating_role: role,
            delegate_user_id: request.delegate_user_id.clone(),
            delegate_name: None,
            reason: request.reason.clone(),
            end_date: request.end_date,
            active: true,
        });
        Ok(())
    }

    async fn revoke_delegation(&self, delegation_id: &DelegationId) -> Result<(), ApiError> {
        let route = routes::delegation(&delegation_id.0);
        let mut state = self.enter("revoke_delegation", &route)?;
        let before = state.delegations.len();
        state.delegations.retain(|delegation| delegation.id != *delegation_id);
        if state.delegations.len() == before {
            return Err(not_found(&route));
        }
        Ok(())
    }

    async fn role_configuration(&self) -> Result<RoleConfiguration, ApiError> {
        let route = routes::role_configuration();
        let state = self.enter("role_configuration", &route)?;
        state.configuration.clone().ok_or_else(|| not_found(&route))
    }

    async fn update_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), ApiError> {
        let route = routes::role_configuration();
        let mut state = self.enter("update_role_assignment", &route)?;
        let configuration = state.configuration.as_mut().ok_or_else(|| not_found(&route))?;
        match configuration.assignments.iter_mut().find(|existing| existing.role == assignment.role) {
            Some(existing) => *existing = assignment.clone(),
            None => configuration.assignments.push(assignment.clone()),
        }
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, ApiError> {
        let route = routes::ticket(&ticket_id.0);
        let state = self.enter("get_ticket", &route)?;
        state.tickets.get(&ticket_id.0).cloned().ok_or_else(|| not_found(&route))
    }

    async fn list_actas(&self) -> Result<Vec<Acta>, ApiError> {
        let state = self.enter("list_actas", &routes::actas())?;
        Ok(state.actas.clone())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let state = self.enter("list_conversations", &routes::conversations())?;
        Ok(state.conversations.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use custodia_core::{
        ClearanceDocument, DocumentId, DocumentStatus, Signature, SignatureId, SignatureRole,
        SignatureState,
    };

    pub fn signature(role: SignatureRole, state: SignatureState) -> Signature {
        Signature {
            id: SignatureId(format!("F-{}", role.backend_id())),
            role,
            state,
            signed_at: None,
            comment: None,
            signature_hash: None,
            signer_name: None,
        }
    }

    pub fn document(id: &str, status: DocumentStatus, signatures: Vec<Signature>) -> ClearanceDocument {
        ClearanceDocument {
            id: DocumentId(id.to_string()),
            subject_user_id: "u-10".to_string(),
            subject_name: "Ana Rojas".to_string(),
            subject_national_id: "1-0987-0654".to_string(),
            exit_date: None,
            exit_reason: "Renuncia".to_string(),
            status,
            observations: None,
            signatures,
            final_pdf_url: None,
        }
    }

    /// Five pending signatures, document in signature.
    pub fn pending_document(id: &str) -> ClearanceDocument {
        document(
            id,
            DocumentStatus::InSignature,
            SignatureRole::ALL
                .iter()
                .map(|role| signature(*role, SignatureState::Pending))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use custodia_core::{DocumentId, DocumentStatus, SignatureRole, SignatureState};

    use super::fixtures::{document, pending_document, signature};
    use super::InMemoryPortalApi;
    use crate::api::{ApiError, PortalApi};

    #[tokio::test]
    async fn signing_twice_is_a_conflict_like_the_backend() {
        let api = InMemoryPortalApi::new().with_document(pending_document("PS-1"));
        let id = DocumentId("PS-1".to_string());

        api.sign(&id, "TI", None).await.expect("first signature");
        let error = api.sign(&id, "TI", None).await.expect_err("second signature");

        assert!(error.is_client_rejection());
        assert_eq!(api.calls_to("sign"), 2);
    }

    #[tokio::test]
    async fn last_signature_approves_document() {
        let signatures = vec![
            signature(SignatureRole::InformationTechnology, SignatureState::Signed),
            signature(SignatureRole::HumanResources, SignatureState::Pending),
        ];
        let api = InMemoryPortalApi::new()
            .with_document(document("PS-2", DocumentStatus::InSignature, signatures));

        api.sign(&DocumentId("PS-2".to_string()), "RRHH", Some("ok")).await.expect("sign");

        let stored = api.document("PS-2").expect("document");
        assert_eq!(stored.status, DocumentStatus::Approved);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let api = InMemoryPortalApi::new().with_document(pending_document("PS-3"));
        api.fail_next(
            "list_signatures",
            ApiError::Transport { route: "/x".to_string(), message: "reset".to_string() },
        );
        let id = DocumentId("PS-3".to_string());

        assert!(api.list_signatures(&id).await.is_err());
        assert_eq!(api.list_signatures(&id).await.expect("second call").len(), 5);
    }
}
