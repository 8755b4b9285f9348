//! Configuration loading and tracing setup.

use anyhow::{Context, Result};
use eyedropper_setup_core::SetupConfig;
use tracing_subscriber::EnvFilter;

use super::Args;

pub(super) fn load_config(args: &Args) -> Result<SetupConfig> {
    match args.config.as_ref() {
        Some(path) => SetupConfig::load_from_path(path).context("read config from path"),
        None => SetupConfig::load_default().context("read default config"),
    }
}

/// Names where the configuration came from, for the startup log.
pub(super) fn config_source(args: &Args) -> &'static str {
    if args.config.is_some() {
        return "custom";
    }
    match SetupConfig::default_config_path() {
        Ok(path) if path.exists() => "default",
        _ => "builtin",
    }
}

pub(super) fn init_tracing(config: &SetupConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .general
                .log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
        )
    });
    // Stdout carries prompts and event lines.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
