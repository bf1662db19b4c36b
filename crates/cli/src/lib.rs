pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use custodia_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use commands::clearance::Confirmations;
use commands::{CommandResult, Workspace};

#[derive(Debug, Parser)]
#[command(
    name = "custodia",
    about = "Custodia clearance workflow CLI",
    long_about = "Review and sign Paz y Salvo clearance documents, manage delegations and role assignments, and inspect tickets, actas and chat against the asset portal.",
    after_help = "Examples:\n  custodia clearance show PS-1042\n  custodia clearance sign PS-1042 --role TI --confirm-all\n  custodia delegation create --role Contabilidad --delegate u-77 --reason vacaciones\n  custodia doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a custodia.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Portal base URL (overrides config and env)")]
    api_base_url: Option<String>,
    #[arg(long, global = true, help = "Actor name recorded in audit events")]
    actor: Option<String>,
    #[arg(long, global = true, help = "Directory signed PDFs are saved to")]
    download_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand, about = "Inspect and act on clearance documents")]
    Clearance(ClearanceCommand),
    #[command(subcommand, about = "List, create and revoke signing delegations")]
    Delegation(DelegationCommand),
    #[command(about = "Show role checklists from the registry")]
    Roles {
        #[arg(help = "Role label or backend identifier; all roles when omitted")]
        role: Option<String>,
    },
    #[command(subcommand, about = "Show or update who signs for each role")]
    Assignments(AssignmentsCommand),
    #[command(subcommand, about = "Support ticket views")]
    Ticket(TicketCommand),
    #[command(subcommand, about = "Asset custody acknowledgments")]
    Acta(ActaCommand),
    #[command(subcommand, about = "Chat inbox")]
    Chat(ChatCommand),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the role registry, and portal reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ClearanceCommand {
    #[command(about = "List clearance documents with their status")]
    List,
    #[command(about = "Show a document, its signature counts and each role's panel")]
    Show { document: String },
    #[command(about = "Sign for a role after confirming its checklist")]
    Sign {
        document: String,
        #[arg(long)]
        role: String,
        #[arg(long = "confirm", value_name = "ITEM", help = "Checklist item number to confirm (repeatable)")]
        confirm: Vec<usize>,
        #[arg(long, help = "Confirm every checklist item")]
        confirm_all: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Reject for a role with a reason")]
    Reject {
        document: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        reason: String,
    },
    #[command(about = "Attach an observation to a role's signature")]
    Observe {
        document: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        comment: String,
    },
    #[command(about = "Ask a role to sign")]
    Request {
        document: String,
        #[arg(long)]
        role: String,
    },
    #[command(about = "Save the signed PDF for a role")]
    Download {
        document: String,
        #[arg(long)]
        role: String,
    },
}

#[derive(Debug, Subcommand)]
enum DelegationCommand {
    List,
    Create {
        #[arg(long, help = "Role whose approval authority is delegated")]
        role: String,
        #[arg(long, help = "User who receives the delegation")]
        delegate: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        until: Option<NaiveDate>,
    },
    Revoke { delegation: String },
}

#[derive(Debug, Subcommand)]
enum AssignmentsCommand {
    Show,
    Update {
        #[arg(long)]
        role: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        user: String,
    },
}

#[derive(Debug, Subcommand)]
enum TicketCommand {
    #[command(about = "Show the five-stage timeline with placed comments")]
    Timeline { ticket: String },
}

#[derive(Debug, Subcommand)]
enum ActaCommand {
    List,
}

#[derive(Debug, Subcommand)]
enum ChatCommand {
    #[command(about = "Follow inbox changes until interrupted")]
    Watch {
        #[arg(long, help = "Stop after this many seconds")]
        duration_secs: Option<u64>,
    },
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.global.config.clone(),
            require_file: self.global.config.is_some(),
            overrides: ConfigOverrides {
                api_base_url: self.global.api_base_url.clone(),
                api_actor: self.global.actor.clone(),
                download_dir: self.global.download_dir.clone(),
                log_level: self.global.log_level.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn execute(cli: Cli) -> ExitCode {
    let options = cli.load_options();

    let result = match cli.command {
        Command::Config => CommandResult { exit_code: 0, output: commands::config::run(options) },
        Command::Doctor { json } => {
            CommandResult { exit_code: 0, output: commands::doctor::run(options, json) }
        }
        Command::Roles { role } => match AppConfig::load(options) {
            Ok(config) => match config.role_registry() {
                Ok(registry) => commands::roles::run(&registry, role.as_deref()),
                Err(error) => CommandResult::failure("roles", "role_registry", error.to_string(), 2),
            },
            Err(error) => CommandResult::failure("roles", "config_validation", error.to_string(), 2),
        },
        command => match Workspace::load(command.name(), options) {
            Ok(workspace) => dispatch(&workspace, command),
            Err(failure) => failure,
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(workspace: &Workspace, command: Command) -> CommandResult {
    use commands::{acta, assignments, chat, clearance, delegation, ticket};

    match command {
        Command::Clearance(command) => match command {
            ClearanceCommand::List => clearance::list(workspace),
            ClearanceCommand::Show { document } => clearance::show(workspace, &document),
            ClearanceCommand::Sign { document, role, confirm, confirm_all, comment } => {
                let confirmations = Confirmations { items: confirm, all: confirm_all };
                clearance::sign(workspace, &document, &role, &confirmations, comment.as_deref())
            }
            ClearanceCommand::Reject { document, role, reason } => {
                clearance::reject(workspace, &document, &role, &reason)
            }
            ClearanceCommand::Observe { document, role, comment } => {
                clearance::observe(workspace, &document, &role, &comment)
            }
            ClearanceCommand::Request { document, role } => {
                clearance::request(workspace, &document, &role)
            }
            ClearanceCommand::Download { document, role } => {
                clearance::download(workspace, &document, &role)
            }
        },
        Command::Delegation(command) => match command {
            DelegationCommand::List => delegation::list(workspace),
            DelegationCommand::Create { role, delegate, reason, until } => {
                delegation::create(workspace, &role, &delegate, &reason, until)
            }
            DelegationCommand::Revoke { delegation } => delegation::revoke(workspace, &delegation),
        },
        Command::Assignments(command) => match command {
            AssignmentsCommand::Show => assignments::show(workspace),
            AssignmentsCommand::Update { role, department, user } => {
                assignments::update(workspace, &role, &department, &user)
            }
        },
        Command::Ticket(TicketCommand::Timeline { ticket }) => ticket::timeline(workspace, &ticket),
        Command::Acta(ActaCommand::List) => acta::list(workspace),
        Command::Chat(ChatCommand::Watch { duration_secs }) => {
            chat::watch(workspace, duration_secs.map(Duration::from_secs))
        }
        Command::Roles { .. } | Command::Config | Command::Doctor { .. } => {
            CommandResult::failure(command.name(), "usage", "command does not use the portal", 64)
        }
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Clearance(_) => "clearance",
            Self::Delegation(_) => "delegation",
            Self::Roles { .. } => "roles",
            Self::Assignments(_) => "assignments",
            Self::Ticket(_) => "ticket",
            Self::Acta(_) => "acta",
            Self::Chat(_) => "chat",
            Self::Config => "config",
            Self::Doctor { .. } => "doctor",
        }
    }
}
