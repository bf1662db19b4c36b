use custodia_core::domain::acta::Acta;
use custodia_core::status::acta_status;
use custodia_core::StatusBadge;
use serde::Serialize;

use super::{block_on, CommandResult, Workspace};

#[derive(Debug, Serialize)]
struct ActaRow {
    #[serde(flatten)]
    acta: Acta,
    badge: StatusBadge,
}

pub fn list(workspace: &Workspace) -> CommandResult {
    const COMMAND: &str = "acta.list";

    match block_on(COMMAND, workspace.api.list_actas()) {
        Ok(Ok(actas)) => {
            let rows: Vec<ActaRow> = actas
                .into_iter()
                .map(|acta| ActaRow { badge: acta_status(&acta.status), acta })
                .collect();
            CommandResult::success_with(COMMAND, format!("{} actas", rows.len()), &rows)
        }
        Ok(Err(error)) => CommandResult::from_action_error(COMMAND, &error.into()),
        Err(failure) => failure,
    }
}
