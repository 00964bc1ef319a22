//! Migration script discovery
//!
//! Lists the scripts added since the previous generation run and reads their text.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A migration script's name and text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub content: String,
}

/// Where new migration scripts come from
pub trait ScriptSource {
    /// Scripts added after `since`, in application order
    fn list_new_scripts(&self, since: Option<&str>) -> Result<Vec<PathBuf>>;

    /// Read the full text of a script
    fn read_script(&self, path: &Path) -> Result<String>;
}

/// `*.sql` files directly inside a scripts directory, ordered by file name
#[derive(Debug, Clone)]
pub struct DirectoryScriptSource {
    directory: PathBuf,
}

impl DirectoryScriptSource {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(Error::ScriptError(format!(
                "Path [{}] doesn't exist or isn't a directory",
                directory.display()
            )));
        }
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ScriptSource for DirectoryScriptSource {
    fn list_new_scripts(&self, since: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut scripts = Vec::new();

        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::ScriptError(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file()
                || !path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("sql"))
            {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if since.map_or(true, |marker| &*file_name > marker) {
                scripts.push(path.to_path_buf());
            }
        }

        Ok(scripts)
    }

    fn read_script(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// Read every listed script, skipping unreadable ones with a warning
pub fn load_scripts(source: &dyn ScriptSource, paths: &[PathBuf]) -> Vec<Script> {
    paths
        .iter()
        .filter_map(|path| match source.read_script(path) {
            Ok(content) => Some(Script {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                content,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Can't read script file, skipping it");
                None
            }
        })
        .collect()
}
