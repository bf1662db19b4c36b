//! One open clearance document: load, classify, act, reload.
//!
//! Only one action runs at a time. Every load and close bumps a generation
//! counter; an action whose generation is no longer current when it returns
//! leaves the view untouched and reports `ActionError::Stale`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use custodia_core::status::clearance_status;
use custodia_core::workflow::{check_action, derive_document_status, may_sign};
use custodia_core::{
    summarize, ChecklistProgress, ClearanceDocument, DocumentId, DocumentStatus, RoleChecklist,
    SignatureAction, SignatureOverview, SignatureRole, StatusBadge, ValidationFailure,
};
use serde::Serialize;
use tracing::debug;

use crate::dispatcher::{ActionDispatcher, ActionError, Reloaded, RequestRoute};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub document: ClearanceDocument,
    pub badge: StatusBadge,
    /// Status implied by the current signature list. May run ahead of
    /// `document.status` until the document is fetched again.
    pub derived_status: DocumentStatus,
    pub overview: SignatureOverview,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RolePanel {
    pub checklist: RoleChecklist,
    pub checked: usize,
    pub total: usize,
    pub may_sign: bool,
    pub available_actions: Vec<SignatureAction>,
}

struct View {
    document: ClearanceDocument,
    progress: HashMap<SignatureRole, ChecklistProgress>,
}

#[derive(Default)]
struct SessionState {
    view: Option<View>,
    generation: u64,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ClearanceSession {
    dispatcher: Arc<ActionDispatcher>,
    state: Mutex<SessionState>,
    busy: AtomicBool,
}

impl ClearanceSession {
    pub fn new(dispatcher: Arc<ActionDispatcher>) -> Self {
        Self { dispatcher, state: Mutex::new(SessionState::default()), busy: AtomicBool::new(false) }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Fetches the document and its signatures and replaces the view.
    pub async fn load(&self, document_id: &DocumentId) -> Result<SessionSnapshot, ActionError> {
        let _busy = self.begin()?;
        let generation = self.bump_generation();

        let mut document = self.dispatcher.api().get_document(document_id).await?;
        document.signatures = self.dispatcher.api().list_signatures(document_id).await?;

        let mut state = self.state();
        if state.generation != generation {
            return Err(ActionError::Stale);
        }
        let snapshot = snapshot_of(&document);
        state.view = Some(View { document, progress: HashMap::new() });
        debug!(event_name = "clearance.session.loaded", document_id = %document_id.0, generation);
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.state().view.as_ref().map(|view| snapshot_of(&view.document))
    }

    /// Discards the view. In-flight actions complete but are not applied.
    pub fn close(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.view = None;
    }

    pub fn role_panel(&self, role: &str) -> Result<RolePanel, ActionError> {
        let signature_role = SignatureRole::from_label(role)?;
        let checklist = self.dispatcher.checklist(role)?.clone();
        let state = self.state();
        let view = state.view.as_ref().ok_or(ActionError::Stale)?;

        let progress = view
            .progress
            .get(&signature_role)
            .cloned()
            .unwrap_or_else(|| ChecklistProgress::new(&checklist));
        let may_sign_now = may_sign(signature_role, &view.document.signatures);
        let available_actions = SignatureAction::ALL
            .into_iter()
            .filter(|action| gate(&view.document, signature_role, *action).is_ok())
            .collect();

        Ok(RolePanel {
            checked: progress.checked_count(),
            total: progress.total(),
            checklist,
            may_sign: may_sign_now,
            available_actions,
        })
    }

    /// Marks checklist item `index` (zero-based) of `role` as verified. An
    /// index past the end of the checklist is a validation failure.
    pub fn check_item(&self, role: &str, index: usize) -> Result<ChecklistProgress, ActionError> {
        self.with_progress(role, |progress| progress.confirm(index))
    }

    pub fn check_all(&self, role: &str) -> Result<ChecklistProgress, ActionError> {
        self.with_progress(role, |progress| {
            progress.check_all();
            Ok(())
        })
    }

    pub async fn sign(&self, role: &str, comment: Option<&str>) -> Result<SessionSnapshot, ActionError> {
        let _busy = self.begin()?;
        let (generation, document_id, signature_role, progress) =
            self.prepare(role, SignatureAction::Sign)?;

        let reloaded = self.dispatcher.sign(&document_id, role, &progress, comment).await?;
        self.apply(generation, reloaded, Some(signature_role))
    }

    pub async fn reject(&self, role: &str, reason: &str) -> Result<SessionSnapshot, ActionError> {
        let _busy = self.begin()?;
        let (generation, document_id, signature_role, _) =
            self.prepare(role, SignatureAction::Reject)?;

        let reloaded = self.dispatcher.reject(&document_id, role, reason).await?;
        self.apply(generation, reloaded, Some(signature_role))
    }

    pub async fn observe(&self, role: &str, comment: &str) -> Result<SessionSnapshot, ActionError> {
        let _busy = self.begin()?;
        let (generation, document_id, signature_role, _) =
            self.prepare(role, SignatureAction::Observe)?;
        let signature_id = {
            let state = self.state();
            state
                .view
                .as_ref()
                .and_then(|view| view.document.signature_for(signature_role))
                .map(|signature| signature.id.clone())
                .ok_or(ActionError::Stale)?
        };

        let reloaded = self.dispatcher.observe(&document_id, &signature_id, comment).await?;
        self.apply(generation, reloaded, None)
    }

    pub async fn request_signature(
        &self,
        role: &str,
    ) -> Result<(RequestRoute, SessionSnapshot), ActionError> {
        let _busy = self.begin()?;
        let (generation, document_id, _, _) = self.prepare(role, SignatureAction::RequestSignature)?;

        let outcome = self.dispatcher.request_signature(&document_id, role).await?;
        let snapshot = self.apply(generation, outcome.reloaded, None)?;
        Ok((outcome.route, snapshot))
    }

    pub async fn download_signed_pdf(&self, role: &str) -> Result<PathBuf, ActionError> {
        let _busy = self.begin()?;
        let (_, document_id, _, _) = self.prepare(role, SignatureAction::DownloadSignedPdf)?;
        self.dispatcher.download_signed_pdf(&document_id, role).await
    }

    fn begin(&self) -> Result<BusyGuard<'_>, ActionError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| ActionError::Busy)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bump_generation(&self) -> u64 {
        let mut state = self.state();
        state.generation += 1;
        state.generation
    }

    fn with_progress(
        &self,
        role: &str,
        update: impl FnOnce(&mut ChecklistProgress) -> Result<(), ValidationFailure>,
    ) -> Result<ChecklistProgress, ActionError> {
        let signature_role = SignatureRole::from_label(role)?;
        let checklist = self.dispatcher.checklist(role)?;
        let mut state = self.state();
        let view = state.view.as_mut().ok_or(ActionError::Stale)?;
        let progress = view
            .progress
            .entry(signature_role)
            .or_insert_with(|| ChecklistProgress::new(checklist));
        update(progress)?;
        Ok(progress.clone())
    }

    /// Gates `action` against the loaded view and captures what the request needs.
    fn prepare(
        &self,
        role: &str,
        action: SignatureAction,
    ) -> Result<(u64, DocumentId, SignatureRole, ChecklistProgress), ActionError> {
        let signature_role = SignatureRole::from_label(role)?;
        let state = self.state();
        let view = state.view.as_ref().ok_or(ActionError::Stale)?;
        gate(&view.document, signature_role, action)?;

        let progress = view.progress.get(&signature_role).cloned().unwrap_or_default();
        Ok((state.generation, view.document.id.clone(), signature_role, progress))
    }

    fn apply(
        &self,
        generation: u64,
        reloaded: Reloaded,
        resolved_role: Option<SignatureRole>,
    ) -> Result<SessionSnapshot, ActionError> {
        let mut state = self.state();
        if state.generation != generation {
            debug!(
                event_name = "clearance.session.stale_result",
                document_id = %reloaded.document_id.0,
                generation,
                current = state.generation
            );
            return Err(ActionError::Stale);
        }
        let view = state.view.as_mut().ok_or(ActionError::Stale)?;
        if view.document.id != reloaded.document_id {
            return Err(ActionError::Stale);
        }

        view.document.signatures = reloaded.signatures;
        if let Some(role) = resolved_role {
            view.progress.remove(&role);
        }
        Ok(snapshot_of(&view.document))
    }
}

/// Local gate mirroring a disabled button: the state machine plus the
/// advisory "may sign now" for sign and reject.
fn gate(
    document: &ClearanceDocument,
    role: SignatureRole,
    action: SignatureAction,
) -> Result<(), ActionError> {
    check_action(document, role, action)?;
    let needs_turn = matches!(action, SignatureAction::Sign | SignatureAction::Reject);
    if needs_turn && !may_sign(role, &document.signatures) {
        return Err(ActionError::NotAvailable {
            action: action.as_str(),
            role: role.display_name().to_string(),
        });
    }
    Ok(())
}

fn snapshot_of(document: &ClearanceDocument) -> SessionSnapshot {
    SessionSnapshot {
        document: document.clone(),
        badge: clearance_status(document.status.backend_label()),
        derived_status: derive_document_status(document.status, &document.signatures),
        overview: summarize(Some(document.signatures.as_slice())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use custodia_core::audit::{AuditContext, InMemoryAuditSink};
    use custodia_core::{
        DocumentId, DocumentStatus, RoleRegistry, SignatureAction, SignatureRole, SignatureState,
    };

    use super::ClearanceSession;
    use crate::dispatcher::{ActionDispatcher, ActionError};
    use crate::memory::fixtures::{document, pending_document, signature};
    use crate::memory::InMemoryPortalApi;

    fn session(api: Arc<InMemoryPortalApi>) -> ClearanceSession {
        let dispatcher = ActionDispatcher::new(
            api,
            Arc::new(RoleRegistry::builtin()),
            Arc::new(InMemoryAuditSink::default()),
            AuditContext::new(None, "req-s", "tests"),
        );
        ClearanceSession::new(Arc::new(dispatcher))
    }

    fn id(raw: &str) -> DocumentId {
        DocumentId(raw.to_string())
    }

    #[tokio::test]
    async fn hr_panel_stays_locked_until_every_other_role_signs() {
        let api = Arc::new(InMemoryPortalApi::new().with_document(pending_document("PS-1")));
        let session = session(api.clone());
        session.load(&id("PS-1")).await.expect("load");

        let panel = session.role_panel("RRHH").expect("panel");
        assert!(!panel.may_sign);
        assert!(!panel.available_actions.contains(&SignatureAction::Sign));

        let error = session.sign("RRHH", None).await.expect_err("hr too early");
        assert!(matches!(error, ActionError::NotAvailable { .. }));
        assert_eq!(api.calls_to("sign"), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn sign_applies_reloaded_signatures_to_the_view() {
        let api = Arc::new(InMemoryPortalApi::new().with_document(pending_document("PS-2")));
        let session = session(api);
        session.load(&id("PS-2")).await.expect("load");

        let progress = session.check_all("TI").expect("check all");
        assert!(progress.is_complete());
        let snapshot = session.sign("TI", Some("equipos recibidos")).await.expect("sign");

        let standing = snapshot
            .document
            .signature_for(SignatureRole::InformationTechnology)
            .expect("ti signature");
        assert_eq!(standing.state, SignatureState::Signed);
        assert_eq!(snapshot.overview.counts().map(|counts| counts.signed), Some(1));
        assert_eq!(session.role_panel("TI").expect("panel").checked, 0);
    }

    #[tokio::test]
    async fn last_signature_derives_approved_status() {
        let signatures = vec![
            signature(SignatureRole::DirectSupervisor, SignatureState::Signed),
            signature(SignatureRole::HumanResources, SignatureState::Pending),
        ];
        let api = Arc::new(
            InMemoryPortalApi::new()
                .with_document(document("PS-3", DocumentStatus::InSignature, signatures)),
        );
        let session = session(api);
        session.load(&id("PS-3")).await.expect("load");
        session.check_all("RRHH").expect("check all");

        let snapshot = session.sign("RRHH", None).await.expect("hr signs last");
        assert_eq!(snapshot.derived_status, DocumentStatus::Approved);
    }

    #[tokio::test]
    async fn closed_documents_only_offer_download() {
        let signatures = vec![signature(SignatureRole::Accounting, SignatureState::Signed)];
        let api = Arc::new(
            InMemoryPortalApi::new()
                .with_document(document("PS-4", DocumentStatus::Closed, signatures)),
        );
        let session = session(api);
        session.load(&id("PS-4")).await.expect("load");

        let panel = session.role_panel("Contabilidad").expect("panel");
        assert_eq!(panel.available_actions, vec![SignatureAction::DownloadSignedPdf]);
        let error = session.observe("Contabilidad", "tarde").await.expect_err("closed");
        assert!(matches!(error, ActionError::Workflow(_)));
    }

    #[tokio::test]
    async fn actions_without_a_loaded_view_are_stale() {
        let session = session(Arc::new(InMemoryPortalApi::new()));
        assert!(matches!(session.sign("TI", None).await, Err(ActionError::Stale)));
        assert!(session.snapshot().is_none());
    }

    #[tokio::test]
    async fn closing_discards_the_view() {
        let api = Arc::new(InMemoryPortalApi::new().with_document(pending_document("PS-5")));
        let session = session(api);
        session.load(&id("PS-5")).await.expect("load");

        session.close();
        assert!(session.snapshot().is_none());
        assert!(matches!(session.check_item("TI", 0), Err(ActionError::Stale)));
    }
}
