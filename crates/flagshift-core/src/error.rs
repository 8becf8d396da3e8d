//! Error types for the orchestrator
//!
//! Per-file problems never surface here; they become failed report items.
//! Everything in [`MigrationError`] aborts the pass.

use std::path::PathBuf;

use flagshift_catalog::CatalogError;

use crate::state::PassState;

/// Project store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Project root is missing or not a directory
    #[error("project root not found: {0}")]
    RootNotFound(PathBuf),

    /// Directory walk failed
    #[error("failed to list {path}: {message}")]
    List { path: PathBuf, message: String },

    /// Reading a file failed
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a file failed
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid UTF-8
    #[error("{0} is not valid UTF-8")]
    Encoding(PathBuf),

    /// Blocking task panicked or was cancelled
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Create read error
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create write error
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Invalid configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    /// Create invalid value error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Fatal errors of a migration pass
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pattern catalog could not be built
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Project could not be listed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Summary artifact could not be written
    #[error("failed to write migration summary to {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// Summary artifact could not be serialized
    #[error("failed to serialize migration summary: {0}")]
    Serialize(#[from] serde_json::Error),

    /// State machine violation
    #[error("invalid pass transition: {from:?} -> {to:?}")]
    InvalidTransition { from: PassState, to: PassState },

    /// Worker task panicked
    #[error("worker task failed: {0}")]
    Task(String),

    /// Cancelled before anything was written
    #[error("migration cancelled")]
    Cancelled,
}

impl MigrationError {
    /// True when the pass stopped because it was asked to
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
