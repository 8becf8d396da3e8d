//! Error types for context transformation and rewriting

use flagshift_catalog::{FindingId, Location};

/// Errors converting a Statsig user into a LaunchDarkly context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// `userID` (or `key`) is absent
    #[error("missing required field: '{0}'")]
    MissingRequiredField(String),

    /// A flattened attribute would overwrite `kind`, `key` or `_meta`
    #[error("attribute '{0}' collides with a reserved context attribute")]
    ReservedAttribute(String),

    /// The same attribute is produced twice
    #[error("attribute '{0}' is defined more than once")]
    DuplicateAttribute(String),

    /// The user is not an object literal
    #[error("user is not an object literal: {0}")]
    NotAnObject(String),
}

/// Why a finding could not be rewritten
///
/// Each of these turns the finding into a failed report item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteFailure {
    /// Name is computed at runtime
    #[error("name is not a string literal: {0}")]
    DynamicName(String),

    /// Receiver could not be tied to a Statsig import
    #[error("low-confidence match; enable rewrite_low_confidence to migrate it")]
    LowConfidence,

    /// Relationship to an experiment cannot be decided
    #[error("ambiguous experiment relationship: {0}")]
    Ambiguous(String),

    /// Config fallback cannot be derived from the source
    #[error("ambiguous fallback for '{config}': {detail}")]
    AmbiguousFallback { config: String, detail: String },

    /// User object could not be converted
    #[error("context conversion failed: {0}")]
    Context(#[from] ContextError),

    /// No automatic equivalent
    #[error("{what} has no automatic equivalent: {guidance}")]
    Unsupported { what: String, guidance: String },

    /// Import kept because none of its call sites were migrated
    #[error("import retained: none of its {0} call sites were migrated")]
    ImportInUse(usize),

    /// Overlaps a patch produced earlier in the same file
    #[error("patch overlaps the rewrite of {other} at {location}")]
    PatchOverlap { other: FindingId, location: Location },

    /// Span past the end of the file or inside a character
    #[error("patch span {start}..{end} does not fit the file")]
    InvalidSpan { start: usize, end: usize },

    /// File changed between scanning and writing
    #[error("file changed since it was scanned")]
    ConcurrentModification,

    /// Patched file could not be written
    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl RewriteFailure {
    /// Create unsupported-feature failure
    pub fn unsupported(what: impl Into<String>, guidance: impl Into<String>) -> Self {
        Self::Unsupported {
            what: what.into(),
            guidance: guidance.into(),
        }
    }

    /// Create ambiguous-fallback failure
    pub fn ambiguous_fallback(config: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AmbiguousFallback {
            config: config.into(),
            detail: detail.into(),
        }
    }
}
