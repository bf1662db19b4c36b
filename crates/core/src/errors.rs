use thiserror::Error;

use crate::domain::clearance::{DocumentStatus, SignatureState};
use crate::domain::role::RoleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid signature transition from {from:?} to {to:?}")]
    InvalidSignatureTransition { from: SignatureState, to: SignatureState },
    #[error("invalid document transition from {from:?} to {to:?}")]
    InvalidDocumentTransition { from: DocumentStatus, to: DocumentStatus },
    #[error("document `{document_id}` is closed and can no longer change")]
    DocumentClosed { document_id: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Raised at the normalization boundary when backend JSON cannot be mapped
/// onto a canonical record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{record} is missing required field `{field}`")]
    MissingField { record: &'static str, field: &'static str },
    #[error("{record} field `{field}` has unsupported value `{value}`")]
    InvalidValue { record: &'static str, field: &'static str, value: String },
    #[error("expected a JSON {expected} for {record}")]
    UnexpectedShape { record: &'static str, expected: &'static str },
    #[error(transparent)]
    Role(#[from] RoleError),
}

/// Local precondition failures. These never reach the network.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("complete all verifications before signing ({checked} of {total} checked)")]
    IncompleteChecklist { checked: usize, total: usize },
    #[error("a rejection reason is required")]
    EmptyReason,
    #[error("an observation comment is required")]
    EmptyComment,
    #[error("a delegate user identifier is required")]
    EmptyDelegate,
    #[error("an assigned user identifier is required")]
    EmptyAssignee,
    #[error("checklist item {item} does not exist (items are numbered 1 to {total})")]
    UnknownChecklistItem { item: usize, total: usize },
}
