use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use custodia_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "api.base_url",
        &config.api.base_url,
        source("api.base_url", "CUSTODIA_API_BASE_URL"),
    ));
    lines.push(render_line(
        "api.token",
        &redact_token(config.api.token.expose_secret()),
        source("api.token", "CUSTODIA_API_TOKEN"),
    ));
    lines.push(render_line(
        "api.timeout_secs",
        &config.api.timeout_secs.to_string(),
        source("api.timeout_secs", "CUSTODIA_API_TIMEOUT_SECS"),
    ));
    lines.push(render_line(
        "api.actor",
        &config.api.actor,
        source("api.actor", "CUSTODIA_API_ACTOR"),
    ));

    let registry_path = config
        .workflow
        .role_registry_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());
    lines.push(render_line(
        "workflow.role_registry_path",
        &registry_path,
        source("workflow.role_registry_path", "CUSTODIA_WORKFLOW_ROLE_REGISTRY_PATH"),
    ));
    lines.push(render_line(
        "workflow.download_dir",
        &config.workflow.download_dir.display().to_string(),
        source("workflow.download_dir", "CUSTODIA_WORKFLOW_DOWNLOAD_DIR"),
    ));
    lines.push(render_line(
        "workflow.reconcile_poll_secs",
        &config.workflow.reconcile_poll_secs.to_string(),
        source("workflow.reconcile_poll_secs", "CUSTODIA_WORKFLOW_RECONCILE_POLL_SECS"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "CUSTODIA_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "CUSTODIA_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("custodia.toml"), PathBuf::from("config/custodia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of a bearer token.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn short_tokens_are_fully_redacted() {
        assert_eq!(redact_token("   "), "<empty>");
        assert_eq!(redact_token("abc123"), "<redacted>");
    }

    #[test]
    fn long_tokens_keep_only_the_tail() {
        assert_eq!(redact_token("eyJhbGciOiJIUzI1NiJ9.payload.sig1"), "***sig1");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: toml::Value = "[api]\nbase_url = \"https://portal\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "api.base_url"));
        assert!(!contains_path(&doc, "api.token"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
