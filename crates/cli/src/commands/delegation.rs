use chrono::NaiveDate;
use custodia_client::DelegationManager;
use custodia_core::{CreateDelegationInput, Delegation, DelegationId};

use super::{block_on, CommandResult, Workspace};

pub fn list(workspace: &Workspace) -> CommandResult {
    const COMMAND: &str = "delegation.list";
    let manager = manager(workspace);
    delegations_result(COMMAND, block_on(COMMAND, manager.list()), |count| {
        format!("{count} delegations")
    })
}

pub fn create(
    workspace: &Workspace,
    role: &str,
    delegate: &str,
    reason: &str,
    until: Option<NaiveDate>,
) -> CommandResult {
    const COMMAND: &str = "delegation.create";
    let input = CreateDelegationInput {
        delegating_role: role.to_string(),
        delegate_user_id: delegate.to_string(),
        reason: reason.to_string(),
        end_date: until,
    };
    let manager = manager(workspace);
    delegations_result(COMMAND, block_on(COMMAND, manager.create(&input)), |_| {
        format!("{role} delegated to {}", delegate.trim())
    })
}

pub fn revoke(workspace: &Workspace, delegation_id: &str) -> CommandResult {
    const COMMAND: &str = "delegation.revoke";
    let id = DelegationId(delegation_id.to_string());
    let manager = manager(workspace);
    delegations_result(COMMAND, block_on(COMMAND, manager.revoke(&id)), |_| {
        format!("delegation {delegation_id} revoked")
    })
}

fn manager(workspace: &Workspace) -> DelegationManager {
    DelegationManager::new(workspace.api.clone(), workspace.audit.clone(), workspace.context.clone())
}

fn delegations_result(
    command: &str,
    result: Result<Result<Vec<Delegation>, custodia_client::ActionError>, CommandResult>,
    message: impl FnOnce(usize) -> String,
) -> CommandResult {
    match result {
        Ok(Ok(delegations)) => {
            CommandResult::success_with(command, message(delegations.len()), &delegations)
        }
        Ok(Err(error)) => CommandResult::from_action_error(command, &error),
        Err(failure) => failure,
    }
}
