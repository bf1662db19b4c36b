//! Ticket timeline: a fixed five-stage pipeline with comments pinned to stages.
//!
//! Placement is a display convenience and never changes ticket state. Stage
//! indices and keywords must stay stable so existing ticket histories keep
//! their ordering.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ticket::{Ticket, TicketComment};
use crate::normalize::canonical_key;
use crate::status::{ticket_status, StatusBadge};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TicketStage {
    Pending = 0,
    Assigned = 1,
    InProgress = 2,
    Resolved = 3,
    Closed = 4,
}

impl TicketStage {
    pub const ALL: [TicketStage; 5] = [
        TicketStage::Pending,
        TicketStage::Assigned,
        TicketStage::InProgress,
        TicketStage::Resolved,
        TicketStage::Closed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Assigned => "Asignado",
            Self::InProgress => "En Proceso",
            Self::Resolved => "Resuelto",
            Self::Closed => "Cerrado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_key(raw).as_str() {
            "pendiente" | "abierto" | "nuevo" | "pending" | "open" => Some(Self::Pending),
            "asignado" | "assigned" => Some(Self::Assigned),
            "enproceso" | "inprogress" => Some(Self::InProgress),
            "resuelto" | "resolved" => Some(Self::Resolved),
            "cerrado" | "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

const ASSIGNMENT_KEYWORDS: [&str; 3] = ["asignado", "reasignado", "reassigned"];
const REASSIGNMENT_KEYWORDS: [&str; 2] = ["reasignado", "reassigned"];

/// Stage used for general updates that carry no recorded stage.
const LEGACY_UPDATE_STAGE: TicketStage = TicketStage::InProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Assignment,
    GeneralUpdate,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

pub fn classify_comment(text: &str) -> CommentKind {
    if contains_any(text, &ASSIGNMENT_KEYWORDS) {
        CommentKind::Assignment
    } else {
        CommentKind::GeneralUpdate
    }
}

pub fn is_reassignment(text: &str) -> bool {
    contains_any(text, &REASSIGNMENT_KEYWORDS)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub kind: CommentKind,
    pub stage_index: usize,
}

/// Pins a comment to a stage index.
///
/// Assignments sit between Assigned and InProgress (index 1), except
/// re-assignments on a ticket already at InProgress or later, which sit
/// between InProgress and Resolved (index 2). General updates sit at the stage
/// recorded on the comment, or at InProgress for legacy comments.
pub fn place_comment(ticket_status: &str, comment: &TicketComment) -> Placement {
    let kind = classify_comment(&comment.text);
    let stage_index = match kind {
        CommentKind::Assignment => {
            let current = TicketStage::parse(ticket_status).unwrap_or(TicketStage::Pending);
            if current >= TicketStage::InProgress && is_reassignment(&comment.text) {
                TicketStage::InProgress.index()
            } else {
                TicketStage::Assigned.index()
            }
        }
        CommentKind::GeneralUpdate => comment
            .status_at_creation
            .as_deref()
            .and_then(TicketStage::parse)
            .unwrap_or(LEGACY_UPDATE_STAGE)
            .index(),
    };

    Placement { kind, stage_index }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub comment_id: String,
    pub author: String,
    pub text: String,
    pub kind: CommentKind,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineStage {
    pub stage: TicketStage,
    pub label: &'static str,
    pub reached: bool,
    pub current: bool,
    pub entries: Vec<TimelineEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketTimeline {
    pub ticket_id: String,
    pub badge: StatusBadge,
    pub stages: Vec<TimelineStage>,
}

pub fn build_timeline(ticket: &Ticket) -> TicketTimeline {
    let current = TicketStage::parse(&ticket.status);

    let mut comments: Vec<&TicketComment> = ticket.comments.iter().collect();
    // Undated comments keep their relative order after the dated ones.
    comments.sort_by_key(|comment| (comment.created_at.is_none(), comment.created_at));

    let mut stages: Vec<TimelineStage> = TicketStage::ALL
        .into_iter()
        .map(|stage| TimelineStage {
            stage,
            label: stage.label(),
            reached: current.is_some_and(|current| stage <= current),
            current: current == Some(stage),
            entries: Vec::new(),
        })
        .collect();

    for comment in comments {
        let placement = place_comment(&ticket.status, comment);
        if let Some(stage) = stages.get_mut(placement.stage_index) {
            stage.entries.push(TimelineEntry {
                comment_id: comment.id.clone(),
                author: comment.author.clone(),
                text: comment.text.clone(),
                kind: placement.kind,
                created_at: comment.created_at,
            });
        }
    }

    TicketTimeline { ticket_id: ticket.id.0.clone(), badge: ticket_status(&ticket.status), stages }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::ticket::{Ticket, TicketComment, TicketId};

    use super::{build_timeline, classify_comment, place_comment, CommentKind, TicketStage};

    fn comment(id: &str, text: &str, status_at_creation: Option<&str>) -> TicketComment {
        TicketComment {
            id: id.to_string(),
            author: "mesa de ayuda".to_string(),
            text: text.to_string(),
            created_at: None,
            status_at_creation: status_at_creation.map(str::to_string),
        }
    }

    #[test]
    fn stage_indices_are_fixed() {
        let indices: Vec<usize> = TicketStage::ALL.iter().map(|stage| stage.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reassignment_on_in_progress_ticket_sits_at_stage_two() {
        let note = comment("c1", "Ticket reasignado a soporte nivel 2", None);
        let placement = place_comment("En Proceso", &note);
        assert_eq!(placement.kind, CommentKind::Assignment);
        assert_eq!(placement.stage_index, 2);
    }

    #[test]
    fn reassignment_on_assigned_ticket_sits_at_stage_one() {
        let note = comment("c1", "Ticket reasignado a soporte nivel 2", None);
        assert_eq!(place_comment("Asignado", &note).stage_index, 1);
    }

    #[test]
    fn first_assignment_stays_at_stage_one_even_when_in_progress() {
        let note = comment("c1", "Asignado a Carlos", None);
        assert_eq!(place_comment("Resuelto", &note).stage_index, 1);
    }

    #[test]
    fn legacy_general_update_defaults_to_in_progress() {
        let note = comment("c1", "Se reinició el equipo", None);
        let placement = place_comment("Pendiente", &note);
        assert_eq!(placement.kind, CommentKind::GeneralUpdate);
        assert_eq!(placement.stage_index, 2);
    }

    #[test]
    fn general_update_uses_recorded_stage() {
        let note = comment("c1", "Cliente confirma solución", Some("Resuelto"));
        assert_eq!(place_comment("Cerrado", &note).stage_index, 3);
    }

    #[test]
    fn english_reassigned_keyword_counts() {
        assert_eq!(classify_comment("Reassigned to network team"), CommentKind::Assignment);
        assert_eq!(classify_comment("Waiting for parts"), CommentKind::GeneralUpdate);
    }

    #[test]
    fn timeline_groups_comments_by_stage_in_chronological_order() {
        let mut late = comment("late", "Equipo entregado", Some("Resuelto"));
        late.created_at = Utc.with_ymd_and_hms(2026, 2, 3, 10, 0, 0).single();
        let mut early = comment("early", "Asignado a Carlos", None);
        early.created_at = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).single();
        let legacy = comment("legacy", "Revisión inicial", None);

        let ticket = Ticket {
            id: TicketId("T-88".to_string()),
            title: "Portátil no enciende".to_string(),
            status: "Resuelto".to_string(),
            assignee: Some("Carlos".to_string()),
            comments: vec![late, legacy, early],
        };

        let timeline = build_timeline(&ticket);
        assert_eq!(timeline.stages.len(), 5);
        assert_eq!(timeline.stages[1].entries[0].comment_id, "early");
        assert_eq!(timeline.stages[2].entries[0].comment_id, "legacy");
        assert_eq!(timeline.stages[3].entries[0].comment_id, "late");
        assert!(timeline.stages[3].current);
        assert!(timeline.stages[0].reached);
        assert!(!timeline.stages[4].reached);
    }
}
