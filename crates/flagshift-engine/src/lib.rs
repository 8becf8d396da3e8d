//! flagshift engine
//!
//! Everything between scanning and writing:
//!
//! - **Project**: arena of findings for one pass
//! - **Classifier**: blocks gates and configs that belong to experiments
//! - **Context**: Statsig user → LaunchDarkly context
//! - **Rewrite**: per-finding patches, applied per file
//! - **Report**: counts, grouped items and next steps
//!
//! # Example
//!
//! ```rust,ignore
//! use flagshift_engine::{build, classify, rewrite_project, Project, RewriteOptions};
//!
//! let mut project = Project::from_scanned(scanned);
//! let classification = classify(project.findings_mut());
//! let rewrites = rewrite_project(&project, &catalog, &RewriteOptions::default());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod classifier;
pub mod context;
pub mod error;
pub mod patch;
pub mod project;
pub mod report;
pub mod rewrite;
pub mod warning;

pub use classifier::{call_sites, classify, Classification, ExperimentBinding};
pub use context::{transform, TargetContext};
pub use error::{ContextError, RewriteFailure};
pub use patch::{PatchSet, RewritePatch, TextEdit};
pub use project::{Project, ProjectFile};
pub use report::{build, FileFailure, ItemKey, MigrationReport, MigrationSummary};
pub use rewrite::{
    rewrite, rewrite_file, rewrite_project, FileRewrite, FindingOutcome, MigratedItem, Outcome,
    Rewrite, RewriteContext, RewriteOptions, DEFAULT_CLIENT_IDENTIFIER,
    DEFAULT_CREDENTIAL_PLACEHOLDER,
};
pub use warning::{Warning, WarningCode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
