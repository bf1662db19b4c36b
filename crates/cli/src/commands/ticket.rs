use custodia_core::build_timeline;
use custodia_core::domain::ticket::TicketId;

use super::{block_on, CommandResult, Workspace};

pub fn timeline(workspace: &Workspace, ticket_id: &str) -> CommandResult {
    const COMMAND: &str = "ticket.timeline";
    let id = TicketId(ticket_id.to_string());

    match block_on(COMMAND, workspace.api.get_ticket(&id)) {
        Ok(Ok(ticket)) => {
            let timeline = build_timeline(&ticket);
            let message = format!("{}: {}", ticket.title, timeline.badge.label);
            CommandResult::success_with(COMMAND, message, &timeline)
        }
        Ok(Err(error)) => CommandResult::from_action_error(COMMAND, &error.into()),
        Err(failure) => failure,
    }
}
