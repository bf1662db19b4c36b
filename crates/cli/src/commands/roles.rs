use custodia_core::{RoleChecklist, RoleRegistry};

use super::CommandResult;

/// Shows one role's checklist, or every configured role when `role` is absent.
pub fn run(registry: &RoleRegistry, role: Option<&str>) -> CommandResult {
    const COMMAND: &str = "roles";
    match role {
        Some(role) => match registry.lookup(role) {
            Ok(checklist) => CommandResult::success_with(COMMAND, checklist.title.clone(), checklist),
            Err(error) => CommandResult::failure(COMMAND, "role_configuration", error.to_string(), 3),
        },
        None => {
            let checklists: Vec<&RoleChecklist> = registry.iter().collect();
            CommandResult::success_with(
                COMMAND,
                format!("{} roles configured", checklists.len()),
                &checklists,
            )
        }
    }
}
