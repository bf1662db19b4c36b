use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{RegistryError, RoleRegistry};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: SecretString,
    pub timeout_secs: u64,
    pub actor: String,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub role_registry_path: Option<PathBuf>,
    pub download_dir: PathBuf,
    pub reconcile_poll_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub api_actor: Option<String>,
    pub role_registry_path: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:5000".to_string(),
                token: String::new().into(),
                timeout_secs: 30,
                actor: "custodia-cli".to_string(),
            },
            workflow: WorkflowConfig {
                role_registry_path: None,
                download_dir: PathBuf::from("."),
                reconcile_poll_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("custodia.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Role checklist registry named by `workflow.role_registry_path`, or the
    /// built-in table when unset.
    pub fn role_registry(&self) -> Result<RoleRegistry, RegistryError> {
        match &self.workflow.role_registry_path {
            Some(path) => RoleRegistry::load(path),
            None => Ok(RoleRegistry::builtin()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(api) = patch.api {
            if let Some(base_url) = api.base_url {
                self.api.base_url = base_url;
            }
            if let Some(api_token_value) = api.token {
                self.api.token = secret_value(api_token_value);
            }
            if let Some(timeout_secs) = api.timeout_secs {
                self.api.timeout_secs = timeout_secs;
            }
            if let Some(actor) = api.actor {
                self.api.actor = actor;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(role_registry_path) = workflow.role_registry_path {
                self.workflow.role_registry_path = Some(role_registry_path);
            }
            if let Some(download_dir) = workflow.download_dir {
                self.workflow.download_dir = download_dir;
            }
            if let Some(reconcile_poll_secs) = workflow.reconcile_poll_secs {
                self.workflow.reconcile_poll_secs = reconcile_poll_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CUSTODIA_API_BASE_URL") {
            self.api.base_url = value;
        }
        if let Some(value) = read_env("CUSTODIA_API_TOKEN") {
            self.api.token = secret_value(value);
        }
        if let Some(value) = read_env("CUSTODIA_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_u64("CUSTODIA_API_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CUSTODIA_API_ACTOR") {
            self.api.actor = value;
        }

        if let Some(value) = read_env("CUSTODIA_WORKFLOW_ROLE_REGISTRY_PATH") {
            self.workflow.role_registry_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("CUSTODIA_WORKFLOW_DOWNLOAD_DIR") {
            self.workflow.download_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("CUSTODIA_WORKFLOW_RECONCILE_POLL_SECS") {
            self.workflow.reconcile_poll_secs =
                parse_u64("CUSTODIA_WORKFLOW_RECONCILE_POLL_SECS", &value)?;
        }

        let log_level =
            read_env("CUSTODIA_LOGGING_LEVEL").or_else(|| read_env("CUSTODIA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CUSTODIA_LOGGING_FORMAT").or_else(|| read_env("CUSTODIA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_base_url) = overrides.api_base_url {
            self.api.base_url = api_base_url;
        }
        if let Some(api_token) = overrides.api_token {
            self.api.token = secret_value(api_token);
        }
        if let Some(api_actor) = overrides.api_actor {
            self.api.actor = api_actor;
        }
        if let Some(role_registry_path) = overrides.role_registry_path {
            self.workflow.role_registry_path = Some(role_registry_path);
        }
        if let Some(download_dir) = overrides.download_dir {
            self.workflow.download_dir = download_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_api(&self.api)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("custodia.toml"), PathBuf::from("config/custodia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_api(api: &ApiConfig) -> Result<(), ConfigError> {
    let base_url = api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "api.base_url must start with http:// or https://".to_string(),
        ));
    }

    if api.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "api.token is required. Use the bearer token issued by the portal login (CUSTODIA_API_TOKEN)"
                .to_string(),
        ));
    }

    if api.timeout_secs == 0 || api.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "api.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if api.actor.trim().is_empty() {
        return Err(ConfigError::Validation("api.actor must not be empty".to_string()));
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if let Some(path) = &workflow.role_registry_path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "workflow.role_registry_path `{}` does not exist",
                path.display()
            )));
        }
    }

    if workflow.reconcile_poll_secs == 0 || workflow.reconcile_poll_secs > 3_600 {
        return Err(ConfigError::Validation(
            "workflow.reconcile_poll_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    api: Option<ApiPatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPatch {
    base_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
    actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    role_registry_path: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    reconcile_poll_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PORTAL_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("custodia.toml");
            fs::write(
                &path,
                r#"
[api]
base_url = "https://activos.example.com"
token = "${TEST_PORTAL_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.api.token.expose_secret() == "token-from-env",
                "api token should be loaded from environment",
            )?;
            ensure(
                config.api.base_url == "https://activos.example.com",
                "base url should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PORTAL_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CUSTODIA_API_TOKEN", "token-test");
        env::set_var("CUSTODIA_LOG_LEVEL", "warn");
        env::set_var("CUSTODIA_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CUSTODIA_API_TOKEN", "CUSTODIA_LOG_LEVEL", "CUSTODIA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CUSTODIA_API_BASE_URL", "https://from-env.example.com");
        env::set_var("CUSTODIA_API_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("custodia.toml");
            fs::write(
                &path,
                r#"
[api]
base_url = "https://from-file.example.com"
token = "token-from-file"
actor = "mesa-ti"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    api_base_url: Some("https://from-override.example.com".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.api.base_url == "https://from-override.example.com",
                "override base url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.api.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )?;
            ensure(config.api.actor == "mesa-ti", "file actor should win over default")?;
            Ok(())
        })();

        clear_vars(&["CUSTODIA_API_BASE_URL", "CUSTODIA_API_TOKEN"]);
        result
    }

    #[test]
    fn validation_fails_fast_without_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["CUSTODIA_API_TOKEN"]);

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("api.token")
        );
        ensure(has_message, "validation failure should mention api.token")
    }

    #[test]
    fn missing_role_registry_file_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                api_token: Some("token".to_string()),
                role_registry_path: Some("/nonexistent/roles.toml".into()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let has_message = matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("role_registry_path")
        );
        ensure(has_message, "validation failure should mention role_registry_path")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CUSTODIA_API_TOKEN", "bearer-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bearer-secret-value"), "debug output should not contain token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(config.role_registry().is_ok(), "built-in registry should load")?;
            Ok(())
        })();

        clear_vars(&["CUSTODIA_API_TOKEN"]);
        result
    }
}
