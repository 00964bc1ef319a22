//! Type definitions for tracked schema objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a tracked schema object
///
/// `Comment` only exists while changes are being detected; it is resolved to
/// the type of the commented object before any DDL is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Table,
    View,
    PackageSpec,
    PackageBody,
    Index,
    Trigger,
    Sequence,
    Comment,
}

impl ObjectType {
    /// Subdirectory of the DDL tree holding files of this type
    pub fn directory(self) -> Option<&'static str> {
        match self {
            ObjectType::Table => Some("tables"),
            ObjectType::View => Some("views"),
            ObjectType::PackageSpec | ObjectType::PackageBody => Some("packages"),
            ObjectType::Index | ObjectType::Trigger | ObjectType::Sequence | ObjectType::Comment => {
                None
            }
        }
    }

    /// File name suffix placed before `.sql`
    pub fn file_suffix(self) -> &'static str {
        match self {
            ObjectType::PackageSpec => "_spec",
            _ => "",
        }
    }

    /// Objects whose DDL lives in their owning table's file
    pub fn is_dependent(self) -> bool {
        matches!(
            self,
            ObjectType::Index | ObjectType::Trigger | ObjectType::Sequence
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::View => "VIEW",
            ObjectType::PackageSpec => "PACKAGE_SPEC",
            ObjectType::PackageBody => "PACKAGE_BODY",
            ObjectType::Index => "INDEX",
            ObjectType::Trigger => "TRIGGER",
            ObjectType::Sequence => "SEQUENCE",
            ObjectType::Comment => "COMMENT",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a script created/altered an object or dropped it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Added,
    Dropped,
}

/// An object touched by a migration script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub name: String,
    pub object_type: ObjectType,
    pub disposition: Disposition,
}

impl ChangeRecord {
    pub fn new(name: &str, object_type: ObjectType, disposition: Disposition) -> Self {
        Self {
            name: name.to_string(),
            object_type,
            disposition,
        }
    }

    /// Deduplication key; names compare case-insensitively
    pub fn key(&self) -> (String, ObjectType) {
        (self.name.to_lowercase(), self.object_type)
    }
}

/// A schema object on its way from the database to the DDL tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbObject {
    pub name: String,
    pub object_type: ObjectType,
    pub ddl: String,
}

impl DbObject {
    /// Create a seed with no DDL yet
    pub fn new(name: &str, object_type: ObjectType) -> Self {
        Self {
            name: name.to_string(),
            object_type,
            ddl: String::new(),
        }
    }

    /// Identity key; a package spec and body of the same name stay distinct
    pub fn key(&self) -> (String, ObjectType) {
        (self.name.to_lowercase(), self.object_type)
    }
}

impl fmt::Display for DbObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.object_type, self.name)
    }
}

/// Raw DDL of the objects folded into a table or view file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentDdl {
    pub comments: Vec<String>,
    pub indexes: Vec<String>,
    pub sequences: Vec<String>,
    pub triggers: Vec<String>,
}
