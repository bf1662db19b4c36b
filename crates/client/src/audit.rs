use custodia_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use tracing::info;

use crate::dispatcher::ActionError;

/// Writes audit events to the log stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            correlation_id = %event.correlation_id,
            document_id = event.document_id.as_ref().map(|id| id.0.as_str()).unwrap_or_default(),
            actor = %event.actor,
            metadata = %metadata,
            "audit event"
        );
    }
}

pub(crate) fn outcome_of<T>(result: &Result<T, ActionError>) -> AuditOutcome {
    match result {
        Ok(_) => AuditOutcome::Success,
        Err(error) if error.is_rejection() => AuditOutcome::Rejected,
        Err(_) => AuditOutcome::Failed,
    }
}
