//! flagshift core - migration orchestrator
//!
//! Runs a Statsig → LaunchDarkly migration pass over a project:
//! - Loads configuration (`flagshift.toml`) and the pattern catalog
//! - Scans sources concurrently with per-file timeouts
//! - Classifies experiment-related flags and rewrites the rest
//! - Writes patched files atomically and the `migration-summary` artifact
//!
//! # Example
//!
//! ```rust,ignore
//! use flagshift_core::{MigrationConfig, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MigrationConfig::new().with_dry_run(true);
//! let orchestrator = Orchestrator::for_root(config, "./web")?;
//!
//! let result = orchestrator.run().await?;
//! println!("{} of {} items migrated", result.report.migrated.len(), result.report.total);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use cancel::CancellationFlag;
pub use config::{MigrationConfig, OutputMode, CONFIG_FILE_NAME, DEFAULT_SUMMARY_PATH};
pub use error::{ConfigError, MigrationError, StoreError};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use state::{validate_transition, PassState, PassTracker};
pub use store::{FsStore, ProjectStore};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a migration
    pub use crate::{
        CancellationFlag, FsStore, MigrationConfig, MigrationError, MigrationResult, Orchestrator,
        OutputMode, PassState, ProjectStore,
    };
    pub use flagshift_engine::{MigrationReport, MigrationSummary};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
