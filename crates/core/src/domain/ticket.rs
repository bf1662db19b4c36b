use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Ticket status recorded when the comment was written. Absent on legacy comments.
    pub status_at_creation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub status: String,
    pub assignee: Option<String>,
    pub comments: Vec<TicketComment>,
}
