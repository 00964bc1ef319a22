//! DdlSync: keeps a tree of DDL files in step with the live database schema
//!
//! DdlSync reads the migration scripts added since the last run, works out
//! which schema objects they touched, re-extracts those objects' DDL from the
//! database and rewrites (or deletes) their files in the DDL tree.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod utils;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use db::introspect::{PostgresIntrospector, SchemaIntrospector};
pub use db::scripts::{DirectoryScriptSource, Script, ScriptSource};
pub use error::{Error, Result};
pub use schema::{
    ChangeDetector, ChangeRecord, DbObject, DdlNormalizer, DdlTree, DependencyResolver,
    ObjectType,
};

/// Initialize DdlSync with the specified configuration file
pub async fn init(config_path: &str) -> Result<DdlSyncClient> {
    let config = config::load_from_file(config_path)?;
    DdlSyncClient::new(config).await
}

/// What a generation run did
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub generated_at: DateTime<Utc>,
    /// Names of the scripts that were scanned
    pub scripts: Vec<String>,
    pub changes: Vec<ChangeRecord>,
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// Objects left out by the exclusion prefixes
    pub skipped: Vec<DbObject>,
    /// Dependent objects without an owning table
    pub orphans: Vec<ChangeRecord>,
}

impl SyncReport {
    /// True when the run touched no file
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.deleted.is_empty()
    }
}

/// The main client for interacting with DdlSync
pub struct DdlSyncClient {
    config: Config,
    connection: Option<DatabaseConnection>,
    introspector: Arc<dyn SchemaIntrospector>,
    normalizer: DdlNormalizer,
    tree: DdlTree,
    concurrency: usize,
}

impl DdlSyncClient {
    /// Create a new DdlSync client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let owner_schema = config.owner_schema()?;
        let connection = DatabaseConnection::connect_as_owner(&config.database, &owner_schema).await?;
        let introspector = Arc::new(PostgresIntrospector::new(&connection, &owner_schema));
        let concurrency = connection.max_connections() as usize;

        let mut client = Self::with_introspector(config, introspector)?;
        client.connection = Some(connection);
        client.concurrency = concurrency.max(1);
        Ok(client)
    }

    /// Create a client over any introspector, without opening a connection
    pub fn with_introspector(
        config: Config,
        introspector: Arc<dyn SchemaIntrospector>,
    ) -> Result<Self> {
        let owner_schema = config.owner_schema()?;
        let normalizer = DdlNormalizer::new(&owner_schema, &config.ddl)?;
        let tree = DdlTree::new(config.ddl_directory()?);
        let concurrency = config.database.pool_size() as usize;

        Ok(Self {
            config,
            connection: None,
            introspector,
            normalizer,
            tree,
            concurrency,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tree(&self) -> &DdlTree {
        &self.tree
    }

    /// Read the scripts added since the configured marker
    pub fn new_scripts(&self) -> Result<Vec<Script>> {
        let directory = self.config.scripts.directory.as_ref().ok_or_else(|| {
            Error::ConfigError("Scripts directory is not configured".to_string())
        })?;
        let source = DirectoryScriptSource::new(directory)?;
        let paths = source.list_new_scripts(self.config.scripts.since.as_deref())?;
        tracing::info!(count = paths.len(), "Found new scripts");

        Ok(db::scripts::load_scripts(&source, &paths))
    }

    /// Regenerate DDL for everything the given scripts touched
    pub async fn generate(&self, scripts: &[Script]) -> Result<SyncReport> {
        let changes = ChangeDetector::detect(scripts);
        tracing::info!(changes = changes.len(), "Detected changed objects");

        let plan = DependencyResolver::new(self.introspector.as_ref())
            .resolve(&changes)
            .await?;

        let mut deleted = Vec::new();
        for object in &plan.deletions {
            deleted.extend(self.tree.delete(&object.name, object.object_type)?);
        }

        let (skipped, seeds): (Vec<DbObject>, Vec<DbObject>) = plan
            .seeds
            .into_iter()
            .partition(|object| self.normalizer.is_excluded(object));
        for object in &skipped {
            tracing::debug!(object = %object, "Excluded from generation");
        }

        let mut written: Vec<PathBuf> = stream::iter(seeds)
            .map(|object| self.generate_object(object))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .flatten()
            .collect();
        written.sort();

        Ok(SyncReport {
            generated_at: Utc::now(),
            scripts: scripts.iter().map(|s| s.name.clone()).collect(),
            changes,
            written,
            deleted,
            skipped,
            orphans: plan.orphans,
        })
    }

    /// Scan the new scripts and regenerate their DDL
    pub async fn sync(&self) -> Result<SyncReport> {
        let scripts = self.new_scripts()?;
        self.generate(&scripts).await
    }

    /// Extract, normalize and write one object
    async fn generate_object(&self, mut object: DbObject) -> Result<Option<PathBuf>> {
        tracing::info!(object = %object, "Generating DDL");
        object.ddl = self
            .introspector
            .extract_ddl(&object.name, object.object_type)
            .await?;
        let dependents =
            db::introspect::extract_dependents(self.introspector.as_ref(), &object).await?;

        match self.normalizer.render(&object, &dependents) {
            Some(content) => self.tree.write(&object, &content).map(Some),
            None => Ok(None),
        }
    }

    /// Close the database connection, if one was opened
    pub async fn close(&self) {
        if let Some(connection) = &self.connection {
            connection.close().await;
        }
    }
}
