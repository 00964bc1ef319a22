//! Configuration handling for DdlSync

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete DdlSync configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ddl: DdlConfig,
    pub scripts: ScriptsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Owner schema used for qualifier stripping and catalog lookups.
    ///
    /// An explicit `ddl.owner_schema` wins over the user part of the connection string.
    pub fn owner_schema(&self) -> Result<String> {
        if let Some(schema) = &self.ddl.owner_schema {
            return Ok(schema.clone());
        }
        match &self.database.connection {
            Some(cnn) => Ok(crate::db::DbCredentials::parse(cnn)?.schema_name().to_string()),
            None => Err(Error::ConfigError(
                "Owner schema is unknown: set ddl.owner_schema or database.connection".to_string(),
            )),
        }
    }

    /// DDL tree root; defaults to the `ddl` directory next to the scripts directory.
    pub fn ddl_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.ddl.directory {
            return Ok(dir.clone());
        }
        let scripts_dir = self.scripts.directory.as_ref().ok_or_else(|| {
            Error::ConfigError("Scripts directory is not configured".to_string())
        })?;
        let parent = scripts_dir.parent().ok_or_else(|| {
            Error::ConfigError(format!(
                "Scripts directory [{}] has no parent directory",
                scripts_dir.display()
            ))
        })?;
        Ok(parent.join(DDL_DIRECTORY_NAME))
    }
}

/// Name of the DDL tree directory, a sibling of the scripts directory
pub const DDL_DIRECTORY_NAME: &str = "ddl";

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    /// Owner connection string, `<user>/<password>@<host>:<port>/<service>`
    pub connection: Option<String>,
    /// Driver URL; takes precedence over `connection` when both are set
    pub url: Option<String>,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "postgres".to_string(),
            connection: None,
            url: None,
            pool_size: None,
            timeout_seconds: None,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_size(&self) -> u32 {
        self.pool_size.unwrap_or(4).max(1)
    }

    /// Resolve the URL handed to the driver
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        match &self.connection {
            Some(cnn) => Ok(crate::db::DbCredentials::parse(cnn)?.to_url(&self.driver)),
            None => Err(Error::ConfigError(
                "Either database.url or database.connection must be set".to_string(),
            )),
        }
    }
}

/// DDL generation settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DdlConfig {
    pub owner_schema: Option<String>,
    pub directory: Option<PathBuf>,
    /// Packages whose name starts with one of these prefixes get no DDL file
    pub excluded_packages: Vec<String>,
    /// Views whose name starts with one of these prefixes get no DDL file
    pub excluded_views: Vec<String>,
    /// Dependent sequences whose DDL contains one of these names are left out of table files
    pub excluded_sequences: Vec<String>,
}

impl Default for DdlConfig {
    fn default() -> Self {
        Self {
            owner_schema: None,
            directory: None,
            excluded_packages: vec!["PKGR_".to_string()],
            excluded_views: vec!["VX_".to_string()],
            excluded_sequences: vec!["SEQ_BPD_ITEMS_UNIT_ID".to_string()],
        }
    }
}

/// Migration scripts location
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScriptsConfig {
    pub directory: Option<PathBuf>,
    /// Scripts whose file name sorts after this one are considered new
    pub since: Option<String>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
            color: true,
        }
    }
}
