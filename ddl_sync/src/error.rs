//! Error types for DdlSync

use std::path::PathBuf;

use thiserror::Error;

/// Result type for DdlSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for DdlSync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Introspection error: {0}")]
    IntrospectionError(String),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Can't write ddl to file [{}]: {source}", path.display())]
    DdlWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't delete ddl file [{}]: {source}", path.display())]
    DdlDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Convert Serde JSON errors to DdlSync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to DdlSync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
