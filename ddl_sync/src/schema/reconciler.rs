//! DDL tree reconciliation
//!
//! Writes rendered DDL into the tree and removes files of objects that no
//! longer exist. The type subdirectories are created by whoever sets the
//! tree up; nothing here creates them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::types::{DbObject, ObjectType};
use crate::utils::naming::{ddl_file_name, FileNameMatcher};

/// Root of the `packages/`, `tables/`, `views/` tree
#[derive(Debug, Clone)]
pub struct DdlTree {
    root: PathBuf,
}

impl DdlTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<type dir>/<lowercased name><suffix>.sql`, for types that own a file
    pub fn path_for(&self, name: &str, object_type: ObjectType) -> Option<PathBuf> {
        object_type
            .directory()
            .map(|dir| self.root.join(dir).join(ddl_file_name(name, object_type)))
    }

    /// Overwrite the object's file with `content`
    pub fn write(&self, object: &DbObject, content: &str) -> Result<PathBuf> {
        let path = self.path_for(&object.name, object.object_type).ok_or_else(|| {
            Error::ValidationError(format!("{} has no file of its own", object))
        })?;

        fs::write(&path, content).map_err(|source| Error::DdlWrite {
            path: path.clone(),
            source,
        })?;

        tracing::info!(object = %object, path = %path.display(), "Generated DDL");
        Ok(path)
    }

    /// Delete the files of an object that no longer exists.
    ///
    /// File names match case-insensitively. Deleting a package spec also
    /// deletes its body. Missing files are not an error.
    pub fn delete(&self, name: &str, object_type: ObjectType) -> Result<Vec<PathBuf>> {
        let Some(dir) = object_type.directory() else {
            return Ok(Vec::new());
        };
        let dir = self.root.join(dir);

        let mut deleted = self.delete_matching(&dir, &ddl_file_name(name, object_type))?;
        if object_type == ObjectType::PackageSpec {
            deleted.extend(
                self.delete_matching(&dir, &ddl_file_name(name, ObjectType::PackageBody))?,
            );
        }
        Ok(deleted)
    }

    fn delete_matching(&self, dir: &Path, file_name: &str) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let matcher = FileNameMatcher::new(file_name);
        let mut deleted = Vec::new();

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if !matcher.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Deleted DDL file");
                    deleted.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(Error::DdlDelete { path, source }),
            }
        }

        deleted.sort();
        Ok(deleted)
    }
}
