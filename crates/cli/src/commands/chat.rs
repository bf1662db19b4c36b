//! `custodia chat watch`: keeps the inbox current and prints one JSON line
//! per change until interrupted.
//!
//! The portal's push channel is not bridged into the CLI, so the local hub
//! only ever carries what this process publishes and the reconciliation
//! poll does the work.

use std::io::Write;
use std::time::Duration;

use custodia_client::{BroadcastHub, EventHub, InboxChange, InboxSync};
use custodia_core::ChatInbox;
use serde::Serialize;
use tracing::info;

use super::{block_on, CommandResult, Workspace};

#[derive(Debug, Serialize)]
struct ChangeLine<'a> {
    change: &'static str,
    conversation_id: Option<&'a str>,
    conversations: usize,
    messages: usize,
}

pub fn watch(workspace: &Workspace, duration: Option<Duration>) -> CommandResult {
    const COMMAND: &str = "chat.watch";
    let reconcile_every = Duration::from_secs(workspace.config.workflow.reconcile_poll_secs);
    let hub = BroadcastHub::default();
    let mut subscription = hub.subscribe();
    let mut sync = InboxSync::new(workspace.api.clone(), reconcile_every);

    let shutdown = async move {
        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };

    info!(
        event_name = "chat.watch.started",
        correlation_id = %workspace.context.correlation_id,
        reconcile_poll_secs = reconcile_every.as_secs(),
        "watching chat inbox"
    );
    let result = block_on(COMMAND, sync.run(&mut subscription, shutdown, print_change));

    match result {
        Ok(Ok(stats)) => CommandResult::success_with(
            COMMAND,
            format!("inbox sync stopped after {} reloads", stats.reloads),
            &stats,
        ),
        Ok(Err(error)) => CommandResult::from_action_error(COMMAND, &error.into()),
        Err(failure) => failure,
    }
}

fn print_change(change: &InboxChange, inbox: &ChatInbox) {
    let (kind, conversation_id) = match change {
        InboxChange::Appended { conversation_id } => ("appended", Some(conversation_id.0.as_str())),
        InboxChange::Reloaded { .. } => ("reloaded", None),
    };
    let line = ChangeLine {
        change: kind,
        conversation_id,
        conversations: inbox.conversations().count(),
        messages: inbox.message_count(),
    };
    if let Ok(rendered) = serde_json::to_string(&line) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{rendered}");
    }
}
