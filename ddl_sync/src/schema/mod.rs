//! Schema module for DdlSync
//!
//! This module handles change detection, dependency resolution, DDL
//! normalization and reconciliation of the DDL tree.

pub mod classifier;
pub mod detector;
pub mod normalizer;
pub mod reconciler;
pub mod resolver;
pub mod types;

// Re-export key types
pub use classifier::{classify, Classification, KeywordRule, RULES};
pub use detector::{normalize_script, ChangeDetector};
pub use normalizer::{pipeline, DdlNormalizer, Step};
pub use reconciler::DdlTree;
pub use resolver::{DependencyResolver, ResolutionPlan};
pub use types::{ChangeRecord, DbObject, DependentDdl, Disposition, ObjectType};
