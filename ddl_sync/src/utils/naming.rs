//! Naming utilities for DdlSync
//!
//! File naming for the DDL tree and case-insensitive name matching.

use glob::{MatchOptions, Pattern};

use crate::schema::types::ObjectType;

/// Extension of every DDL file
pub const DDL_FILE_EXTENSION: &str = "sql";

/// File name for an object: lower-cased name, `_spec` for package specs
pub fn ddl_file_name(name: &str, object_type: ObjectType) -> String {
    format!(
        "{}{}.{}",
        name.to_lowercase(),
        object_type.file_suffix(),
        DDL_FILE_EXTENSION
    )
}

/// Whether `name` starts with any of `prefixes`, ignoring case
pub fn has_excluded_prefix(name: &str, prefixes: &[String]) -> bool {
    let name = name.to_uppercase();
    prefixes
        .iter()
        .any(|prefix| name.starts_with(&prefix.to_uppercase()))
}

/// Substring test ignoring case
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

/// Case-insensitive file name matcher
#[derive(Debug, Clone)]
pub struct FileNameMatcher {
    pattern: Pattern,
}

impl FileNameMatcher {
    /// Match exactly `file_name`, ignoring case
    pub fn new(file_name: &str) -> Self {
        Self {
            pattern: Pattern::new(&Pattern::escape(file_name))
                .unwrap_or_else(|_| Pattern::default()),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.pattern.matches_with(
            candidate,
            MatchOptions {
                case_sensitive: false,
                require_literal_separator: true,
                require_literal_leading_dot: false,
            },
        )
    }
}
