pub mod acta;
pub mod assignments;
pub mod chat;
pub mod clearance;
pub mod config;
pub mod delegation;
pub mod doctor;
pub mod roles;
pub mod ticket;

use std::future::Future;
use std::sync::Arc;

use custodia_client::{ActionError, HttpPortalApi, PortalApi, TracingAuditSink};
use custodia_core::audit::{AuditContext, AuditSink};
use custodia_core::config::{AppConfig, LoadOptions};
use custodia_core::RoleRegistry;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success payload carrying `data` as structured JSON.
    pub fn success_with(command: &str, message: impl Into<String>, data: &impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => {
                let payload = CommandOutcome {
                    command: command.to_string(),
                    status: "ok".to_string(),
                    error_class: None,
                    message: message.into(),
                    data: Some(data),
                };
                Self { exit_code: 0, output: serialize_payload(payload) }
            }
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps an action failure to an error class and exit code. Local
    /// precondition failures exit with 3 and never reached the portal.
    pub fn from_action_error(command: &str, error: &ActionError) -> Self {
        let (error_class, exit_code) = match error {
            ActionError::Validation(_) => ("validation", 3),
            ActionError::Role(_) | ActionError::RoleConfiguration(_) => ("role", 3),
            ActionError::Workflow(_) | ActionError::NotAvailable { .. } => ("workflow", 3),
            ActionError::Busy | ActionError::Stale => ("session", 1),
            ActionError::Api(api) if api.is_client_rejection() => ("rejected", 1),
            ActionError::Api(_) => ("api", 1),
            ActionError::ReloadFailed(_) => ("reload", 1),
            ActionError::Download(_) => ("download", 1),
        };
        Self::failure(command, error_class, error.user_message(), exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Everything a portal command needs, built once per invocation.
pub struct Workspace {
    pub config: AppConfig,
    pub api: Arc<dyn PortalApi>,
    pub registry: Arc<RoleRegistry>,
    pub audit: Arc<dyn AuditSink>,
    pub context: AuditContext,
}

impl Workspace {
    /// Loads configuration and the role registry and connects to the portal
    /// over HTTP. Failures come back as ready-to-print results.
    pub fn load(command: &str, options: LoadOptions) -> Result<Self, CommandResult> {
        let config = AppConfig::load(options)
            .map_err(|error| CommandResult::failure(command, "config_validation", error.to_string(), 2))?;
        let api = HttpPortalApi::new(&config.api)
            .map_err(|error| CommandResult::failure(command, "api", error.to_string(), 1))?;
        Self::with_api(command, config, Arc::new(api))
    }

    pub fn with_api(
        command: &str,
        config: AppConfig,
        api: Arc<dyn PortalApi>,
    ) -> Result<Self, CommandResult> {
        let registry = config
            .role_registry()
            .map_err(|error| CommandResult::failure(command, "role_registry", error.to_string(), 2))?;
        let context = AuditContext::for_actor(config.api.actor.clone());
        Ok(Self {
            config,
            api,
            registry: Arc::new(registry),
            audit: Arc::new(TracingAuditSink),
            context,
        })
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

/// Drives `future` on a fresh current-thread runtime.
pub(crate) fn block_on<T>(command: &str, future: impl Future<Output = T>) -> Result<T, CommandResult> {
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => Ok(runtime.block_on(future)),
        Err(error) => Err(CommandResult::failure(
            command,
            "runtime",
            format!("failed to initialize async runtime: {error}"),
            1,
        )),
    }
}
