//! Utilities for DdlSync
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{contains_ignore_case, ddl_file_name, has_excluded_prefix, FileNameMatcher};
