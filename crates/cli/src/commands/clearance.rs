//! `custodia clearance ...`: one clearance document at a time, driven
//! through a `ClearanceSession` so the same gating applies as in the portal.

use std::sync::Arc;

use custodia_client::{ActionDispatcher, ActionError, ClearanceSession, RolePanel, SessionSnapshot};
use custodia_core::status::clearance_status;
use custodia_core::{DocumentId, StatusBadge, ValidationFailure};
use serde::Serialize;

use super::{block_on, CommandResult, Workspace};

#[derive(Debug, Serialize)]
struct DocumentRow {
    id: String,
    subject_name: String,
    status: String,
    badge: StatusBadge,
}

#[derive(Debug, Serialize)]
struct DocumentView {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    panels: Vec<RolePanel>,
    /// Roles on the document with no checklist in the registry.
    unconfigured_roles: Vec<String>,
}

/// Checklist confirmations given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Confirmations {
    /// One-based checklist item numbers.
    pub items: Vec<usize>,
    pub all: bool,
}

pub fn list(workspace: &Workspace) -> CommandResult {
    const COMMAND: &str = "clearance.list";
    let result = match block_on(COMMAND, workspace.api.list_documents()) {
        Ok(result) => result,
        Err(failure) => return failure,
    };

    match result {
        Ok(documents) => {
            let rows: Vec<DocumentRow> = documents
                .iter()
                .map(|document| DocumentRow {
                    id: document.id.0.clone(),
                    subject_name: document.subject_name.clone(),
                    status: document.status.backend_label().to_string(),
                    badge: clearance_status(document.status.backend_label()),
                })
                .collect();
            CommandResult::success_with(COMMAND, format!("{} clearance documents", rows.len()), &rows)
        }
        Err(error) => CommandResult::from_action_error(COMMAND, &error.into()),
    }
}

pub fn show(workspace: &Workspace, document_id: &str) -> CommandResult {
    const COMMAND: &str = "clearance.show";
    let session = session(workspace, document_id);
    let result = block_on(COMMAND, session.load(&DocumentId(document_id.to_string())));

    let snapshot = match result {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(error)) => return CommandResult::from_action_error(COMMAND, &error),
        Err(failure) => return failure,
    };

    let mut panels = Vec::new();
    let mut unconfigured_roles = Vec::new();
    for signature in &snapshot.document.signatures {
        match session.role_panel(signature.role.display_name()) {
            Ok(panel) => panels.push(panel),
            Err(error) => unconfigured_roles.push(error.user_message()),
        }
    }

    let message = format!("{} ({})", snapshot.badge.label, document_id);
    CommandResult::success_with(COMMAND, message, &DocumentView { snapshot, panels, unconfigured_roles })
}

pub fn sign(
    workspace: &Workspace,
    document_id: &str,
    role: &str,
    confirmations: &Confirmations,
    comment: Option<&str>,
) -> CommandResult {
    const COMMAND: &str = "clearance.sign";
    let session = session(workspace, document_id);
    let id = DocumentId(document_id.to_string());

    let result = block_on(COMMAND, async {
        session.load(&id).await?;
        if confirmations.all {
            session.check_all(role)?;
        }
        for item in &confirmations.items {
            let index = match item.checked_sub(1) {
                Some(index) => index,
                None => {
                    let total = session.role_panel(role)?.total;
                    let failure = ValidationFailure::UnknownChecklistItem { item: *item, total };
                    return Err(ActionError::Validation(failure));
                }
            };
            session.check_item(role, index)?;
        }
        session.sign(role, comment).await
    });
    snapshot_result(COMMAND, result, format!("{role} signed {document_id}"))
}

pub fn reject(workspace: &Workspace, document_id: &str, role: &str, reason: &str) -> CommandResult {
    const COMMAND: &str = "clearance.reject";
    let session = session(workspace, document_id);
    let id = DocumentId(document_id.to_string());

    let result = block_on(COMMAND, async {
        session.load(&id).await?;
        session.reject(role, reason).await
    });
    snapshot_result(COMMAND, result, format!("{role} rejected {document_id}"))
}

pub fn observe(workspace: &Workspace, document_id: &str, role: &str, comment: &str) -> CommandResult {
    const COMMAND: &str = "clearance.observe";
    let session = session(workspace, document_id);
    let id = DocumentId(document_id.to_string());

    let result = block_on(COMMAND, async {
        session.load(&id).await?;
        session.observe(role, comment).await
    });
    snapshot_result(COMMAND, result, format!("observation recorded on {document_id}"))
}

pub fn request(workspace: &Workspace, document_id: &str, role: &str) -> CommandResult {
    const COMMAND: &str = "clearance.request";
    let session = session(workspace, document_id);
    let id = DocumentId(document_id.to_string());

    let result = block_on(COMMAND, async {
        session.load(&id).await?;
        session.request_signature(role).await
    });

    #[derive(Serialize)]
    struct Requested {
        route: custodia_client::RequestRoute,
        #[serde(flatten)]
        snapshot: SessionSnapshot,
    }

    match result {
        Ok(Ok((route, snapshot))) => CommandResult::success_with(
            COMMAND,
            format!("signature requested from {role} on {document_id}"),
            &Requested { route, snapshot },
        ),
        Ok(Err(error)) => CommandResult::from_action_error(COMMAND, &error),
        Err(failure) => failure,
    }
}

pub fn download(workspace: &Workspace, document_id: &str, role: &str) -> CommandResult {
    const COMMAND: &str = "clearance.download";
    let session = session(workspace, document_id);
    let id = DocumentId(document_id.to_string());

    let result = block_on(COMMAND, async {
        session.load(&id).await?;
        session.download_signed_pdf(role).await
    });

    match result {
        Ok(Ok(path)) => CommandResult::success(COMMAND, format!("saved {}", path.display())),
        Ok(Err(error)) => CommandResult::from_action_error(COMMAND, &error),
        Err(failure) => failure,
    }
}

fn session(workspace: &Workspace, document_id: &str) -> ClearanceSession {
    let dispatcher = ActionDispatcher::new(
        workspace.api.clone(),
        workspace.registry.clone(),
        workspace.audit.clone(),
        workspace.context.with_document(&DocumentId(document_id.to_string())),
    )
    .with_download_dir(workspace.config.workflow.download_dir.clone());
    ClearanceSession::new(Arc::new(dispatcher))
}

fn snapshot_result(
    command: &str,
    result: Result<Result<SessionSnapshot, ActionError>, CommandResult>,
    message: String,
) -> CommandResult {
    match result {
        Ok(Ok(snapshot)) => CommandResult::success_with(command, message, &snapshot),
        Ok(Err(error)) => CommandResult::from_action_error(command, &error),
        Err(failure) => failure,
    }
}
