use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use custodia_cli::Cli;
use custodia_core::config::{AppConfig, LogFormat, LoadOptions, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries the JSON command payload.
fn init_logging(options: &LoadOptions) -> Result<()> {
    let logging = AppConfig::load(options.clone())
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig { level: "warn".to_string(), format: LogFormat::Compact });

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|error| anyhow!("invalid log filter `{}`: {error}", logging.level))?;
    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&cli.load_options()) {
        eprintln!("custodia: {error:#}");
    }
    custodia_cli::execute(cli)
}
