pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod inbox;
pub mod normalize;
pub mod registry;
pub mod status;
pub mod timeline;
pub mod workflow;

pub use domain::clearance::{
    ClearanceDocument, DocumentId, DocumentStatus, Signature, SignatureId, SignatureState,
};
pub use domain::delegation::{
    CreateDelegationInput, Delegation, DelegationId, RoleAssignment, RoleWorkflowEntry,
};
pub use domain::role::{translate_role, RoleError, SignatureRole};
pub use errors::{DomainError, RecordError, ValidationFailure};
pub use inbox::{ChatInbox, HubEvent, InboxEffect};
pub use registry::{ChecklistProgress, RoleChecklist, RoleLookupError, RoleRegistry};
pub use status::StatusBadge;
pub use timeline::{build_timeline, place_comment, TicketStage, TicketTimeline};
pub use workflow::{summarize, SignatureAction, SignatureOverview};
