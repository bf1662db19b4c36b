use custodia_client::{ConfigurationSource, LoadedConfiguration, RoleAssignments};
use custodia_core::{RoleAssignment, SignatureRole};

use super::{block_on, CommandResult, Workspace};

pub fn show(workspace: &Workspace) -> CommandResult {
    const COMMAND: &str = "assignments.show";
    let assignments = assignments(workspace);
    loaded_result(COMMAND, block_on(COMMAND, assignments.load()), "role configuration loaded")
}

pub fn update(workspace: &Workspace, role: &str, department: &str, user: &str) -> CommandResult {
    const COMMAND: &str = "assignments.update";
    let role = match role.parse::<SignatureRole>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure(COMMAND, "role", error.to_string(), 3),
    };
    let assignment = RoleAssignment {
        department: department.to_string(),
        role,
        assigned_user_id: user.to_string(),
    };
    let assignments = assignments(workspace);
    loaded_result(
        COMMAND,
        block_on(COMMAND, assignments.update(&assignment)),
        &format!("{} assigned to {}", role.display_name(), user.trim()),
    )
}

fn assignments(workspace: &Workspace) -> RoleAssignments {
    RoleAssignments::new(workspace.api.clone(), workspace.audit.clone(), workspace.context.clone())
}

fn loaded_result(
    command: &str,
    result: Result<Result<LoadedConfiguration, custodia_client::ActionError>, CommandResult>,
    message: &str,
) -> CommandResult {
    match result {
        Ok(Ok(loaded)) => {
            let message = match loaded.source {
                ConfigurationSource::Backend => message.to_string(),
                ConfigurationSource::Fallback => {
                    format!("{message} (portal has no role configuration; default signing order)")
                }
            };
            CommandResult::success_with(command, message, &loaded)
        }
        Ok(Err(error)) => CommandResult::from_action_error(command, &error),
        Err(failure) => failure,
    }
}
