//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use ddl_sync::config::Config;
use ddl_sync::{DdlSyncClient, Error, ObjectType, Result, SchemaIntrospector, Script};

type Key = (String, ObjectType);

fn key(name: &str, object_type: ObjectType) -> Key {
    (name.to_lowercase(), object_type)
}

/// Schema held in memory, names matched case-insensitively
#[derive(Default)]
pub struct MemoryIntrospector {
    objects: HashMap<Key, String>,
    owners: HashMap<Key, String>,
    dependents: HashMap<Key, Vec<String>>,
    missing_ddl: Vec<Key>,
    extracted: Mutex<Vec<String>>,
}

impl MemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, name: &str, object_type: ObjectType, ddl: &str) -> Self {
        self.objects.insert(key(name, object_type), ddl.to_string());
        self
    }

    pub fn with_table(self, name: &str, ddl: &str) -> Self {
        self.with_object(name, ObjectType::Table, ddl)
    }

    /// An object that exists but whose DDL can't be extracted
    pub fn with_unextractable(mut self, name: &str, object_type: ObjectType) -> Self {
        self.objects.insert(key(name, object_type), String::new());
        self.missing_ddl.push(key(name, object_type));
        self
    }

    /// A dependent object owned by `table`
    pub fn with_dependent(
        mut self,
        table: &str,
        name: &str,
        object_type: ObjectType,
        ddl: &str,
    ) -> Self {
        self.owners.insert(key(name, object_type), table.to_string());
        self.dependents
            .entry(key(table, object_type))
            .or_default()
            .push(ddl.to_string());
        self
    }

    /// Comment DDL attached to a table or view
    pub fn with_comments(mut self, owner: &str, ddl: &str) -> Self {
        self.dependents
            .entry(key(owner, ObjectType::Comment))
            .or_default()
            .push(ddl.to_string());
        self
    }

    /// A dependent whose owning table is recorded but may not exist
    pub fn with_owner(mut self, name: &str, object_type: ObjectType, table: &str) -> Self {
        self.owners.insert(key(name, object_type), table.to_string());
        self
    }

    /// Names passed to `extract_ddl`, in call order
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaIntrospector for MemoryIntrospector {
    async fn object_exists(&self, name: &str, object_type: ObjectType) -> Result<bool> {
        let key = key(name, object_type);
        Ok(self.objects.contains_key(&key) || self.owners.contains_key(&key))
    }

    async fn resolve_object_type(&self, name: &str) -> Result<Option<ObjectType>> {
        Ok([ObjectType::Table, ObjectType::View]
            .into_iter()
            .find(|object_type| self.objects.contains_key(&key(name, *object_type))))
    }

    async fn resolve_owning_table(
        &self,
        name: &str,
        object_type: ObjectType,
    ) -> Result<Option<String>> {
        Ok(self.owners.get(&key(name, object_type)).cloned())
    }

    async fn extract_ddl(&self, name: &str, object_type: ObjectType) -> Result<String> {
        self.extracted.lock().unwrap().push(name.to_string());
        let key = key(name, object_type);
        if self.missing_ddl.contains(&key) {
            return Err(Error::IntrospectionError(format!(
                "Can't extract DDL of {} {}",
                object_type, name
            )));
        }
        self.objects.get(&key).cloned().ok_or_else(|| {
            Error::IntrospectionError(format!("{} {} not found", object_type, name))
        })
    }

    async fn extract_dependent_ddl(
        &self,
        owner: &str,
        dependent_type: ObjectType,
    ) -> Result<Vec<String>> {
        Ok(self
            .dependents
            .get(&key(owner, dependent_type))
            .cloned()
            .unwrap_or_default())
    }
}

/// Temporary `scripts/` directory next to a `ddl/` tree with its subdirectories
pub fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("scripts")).unwrap();
    for sub in ["tables", "views", "packages"] {
        fs::create_dir_all(dir.path().join("ddl").join(sub)).unwrap();
    }
    dir
}

pub fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.ddl.owner_schema = Some("APP".to_string());
    config.scripts.directory = Some(root.join("scripts"));
    config.database.pool_size = Some(2);
    config
}

pub fn client(root: &Path, introspector: Arc<MemoryIntrospector>) -> DdlSyncClient {
    DdlSyncClient::with_introspector(config(root), introspector).unwrap()
}

pub fn script(name: &str, content: &str) -> Script {
    Script {
        name: name.to_string(),
        content: content.to_string(),
    }
}

pub fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join("ddl").join(relative)).unwrap()
}

pub const ORDERS_DDL: &str = concat!(
    "\n  CREATE TABLE \"APP\".\"ORDERS\" \n",
    "   (\t\"ID\" NUMBER(10,0) NOT NULL ENABLE, \n",
    "\t\"CUSTOMER_ID\" NUMBER(10,0), \n",
    "\t CONSTRAINT \"FK_ORDERS_CUSTOMER\" FOREIGN KEY (\"CUSTOMER_ID\")\n",
    "\t  REFERENCES \"APP\".\"CUSTOMERS\" (\"ID\") ENABLE\n",
    "   ) ;"
);
