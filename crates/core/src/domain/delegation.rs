use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::role::SignatureRole;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationId(pub String);

/// Temporary transfer of a role's signing authority.
///
/// Expiry is enforced by the backend; `end_date` is informational here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: DelegationId,
    pub delegating_role: SignatureRole,
    pub delegate_user_id: String,
    pub delegate_name: Option<String>,
    pub reason: String,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDelegationInput {
    pub delegating_role: String,
    pub delegate_user_id: String,
    pub reason: String,
    pub end_date: Option<NaiveDate>,
}

/// Maps an organizational role to the person authorized to sign it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub department: String,
    pub role: SignatureRole,
    pub assigned_user_id: String,
}

/// Position of a role in the signing sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleWorkflowEntry {
    pub role: SignatureRole,
    pub order: u8,
    pub mandatory: bool,
}
