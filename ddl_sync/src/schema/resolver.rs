//! Dependency resolution
//!
//! Turns detected change records into the objects whose files must be
//! regenerated and the objects whose files must be removed.

use indexmap::IndexMap;
use serde::Serialize;

use crate::db::introspect::SchemaIntrospector;
use crate::error::Result;
use crate::schema::types::{ChangeRecord, DbObject, ObjectType};

/// Outcome of resolving a batch of change records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionPlan {
    /// Objects to extract and write, one per (name, type)
    pub seeds: Vec<DbObject>,
    /// Objects gone from the database whose files must be deleted
    pub deletions: Vec<DbObject>,
    /// Dependent objects whose owning table couldn't be found
    pub orphans: Vec<ChangeRecord>,
}

/// Resolves change records against the live schema
pub struct DependencyResolver<'a> {
    introspector: &'a dyn SchemaIntrospector,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(introspector: &'a dyn SchemaIntrospector) -> Self {
        Self { introspector }
    }

    /// Resolve every record.
    ///
    /// Runs sequentially; the seed set is final before any extraction starts,
    /// so several dependents of one table collapse onto a single TABLE seed.
    pub async fn resolve(&self, changes: &[ChangeRecord]) -> Result<ResolutionPlan> {
        let mut seeds: IndexMap<(String, ObjectType), DbObject> = IndexMap::new();
        let mut deletions: IndexMap<(String, ObjectType), DbObject> = IndexMap::new();
        let mut orphans = Vec::new();

        for change in changes {
            let object_type = if change.object_type == ObjectType::Comment {
                match self.introspector.resolve_object_type(&change.name).await? {
                    Some(object_type) => object_type,
                    None => {
                        tracing::warn!(name = %change.name, "Commented object not found, skipping comment change");
                        continue;
                    }
                }
            } else {
                change.object_type
            };

            if object_type.is_dependent() {
                match self.owning_table(&change.name, object_type).await? {
                    Some(table) => {
                        let seed = DbObject::new(&table, ObjectType::Table);
                        seeds.entry(seed.key()).or_insert(seed);
                    }
                    None => {
                        tracing::warn!(
                            object_type = %object_type,
                            name = %change.name,
                            "Parent object not found! Please, modify related DDL manually"
                        );
                        orphans.push(ChangeRecord::new(&change.name, object_type, change.disposition));
                    }
                }
                continue;
            }

            let object = DbObject::new(&change.name, object_type);
            if self.introspector.object_exists(&object.name, object_type).await? {
                seeds.entry(object.key()).or_insert(object);
            } else {
                tracing::debug!(object = %object, "Object no longer exists");
                deletions.entry(object.key()).or_insert(object);
            }
        }

        Ok(ResolutionPlan {
            seeds: seeds.into_values().collect(),
            deletions: deletions.into_values().collect(),
            orphans,
        })
    }

    /// Owning table of an index, trigger or sequence, if it still exists
    async fn owning_table(&self, name: &str, object_type: ObjectType) -> Result<Option<String>> {
        let Some(table) = self
            .introspector
            .resolve_owning_table(name, object_type)
            .await?
        else {
            return Ok(None);
        };

        if self.introspector.object_exists(&table, ObjectType::Table).await? {
            Ok(Some(table))
        } else {
            Ok(None)
        }
    }
}
