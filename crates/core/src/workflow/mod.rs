pub mod aggregate;
pub mod transitions;

pub use aggregate::{may_sign, summarize, RoleStanding, SignatureCounts, SignatureOverview};
pub use transitions::{
    check_action, derive_document_status, validate_document_transition,
    validate_signature_transition, SignatureAction,
};
