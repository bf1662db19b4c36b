//! Client side of the clearance workflow: backend access, action dispatch,
//! delegations, role assignments, the document session and chat sync.

pub mod api;
pub mod assignments;
pub mod audit;
pub mod delegation;
pub mod dispatcher;
pub mod http;
pub mod hub;
pub mod memory;
pub mod routes;
pub mod session;

pub use api::{ApiError, DelegationRequest, PortalApi, RoleConfiguration};
pub use assignments::{ConfigurationSource, LoadedConfiguration, RoleAssignments};
pub use audit::TracingAuditSink;
pub use delegation::DelegationManager;
pub use dispatcher::{ActionDispatcher, ActionError, Reloaded, RequestOutcome, RequestRoute};
pub use http::HttpPortalApi;
pub use hub::{BroadcastHub, EventHub, InboxChange, InboxSync, Subscription, SyncStats};
pub use memory::InMemoryPortalApi;
pub use session::{ClearanceSession, RolePanel, SessionSnapshot};
