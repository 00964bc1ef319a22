//! Database module for DdlSync
//!
//! This module handles connections, credentials, schema introspection and
//! migration script discovery.

pub mod connection;
pub mod credentials;
pub mod introspect;
pub mod scripts;

// Re-export key types
pub use connection::DatabaseConnection;
pub use credentials::DbCredentials;
pub use introspect::{PostgresIntrospector, SchemaIntrospector};
pub use scripts::{load_scripts, DirectoryScriptSource, Script, ScriptSource};
