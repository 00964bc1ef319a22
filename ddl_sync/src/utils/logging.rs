//! Logging utilities for DdlSync
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Parse a level name, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level);

    let directive: Directive = format!("ddl_sync={}", level)
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);
    let json = config.format.eq_ignore_ascii_case("json");

    if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = Mutex::new(File::create(file_path)?);

        if json {
            let subscriber = fmt::Subscriber::builder()
                .json()
                .with_env_filter(env_filter)
                .with_writer(file)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
        } else {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(file)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
        }
    } else if config.stdout {
        if json {
            let subscriber = fmt::Subscriber::builder()
                .json()
                .with_env_filter(env_filter)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
        } else {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(config.color)
                .with_target(false)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
        }
    }

    Ok(())
}
