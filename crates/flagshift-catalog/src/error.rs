//! Catalog loading errors

use crate::model::FindingKind;

/// Errors while building the pattern catalog
///
/// All of these are fatal for a migration pass.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Pragma tag is empty or contains characters outside `[A-Za-z0-9_:.-]`
    #[error("invalid pragma tag: '{0}'")]
    InvalidPragmaTag(String),

    /// Wrapper name is not a JavaScript identifier
    #[error("invalid wrapper name: '{0}'")]
    InvalidWrapper(String),

    /// Wrapper kind cannot be expressed as a method call
    #[error("wrapper '{name}' cannot be mapped to {kind}")]
    UnsupportedWrapperKind { name: String, kind: FindingKind },

    /// Wrapper shadows a built-in method of another kind
    #[error("wrapper '{name}' maps to {requested} but the built-in method is {builtin}")]
    WrapperCollision {
        name: String,
        builtin: FindingKind,
        requested: FindingKind,
    },

    /// Pragma pattern failed to compile
    #[error("pragma pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl CatalogError {
    /// Create wrapper collision error
    pub fn collision(
        name: impl Into<String>,
        builtin: FindingKind,
        requested: FindingKind,
    ) -> Self {
        Self::WrapperCollision {
            name: name.into(),
            builtin,
            requested,
        }
    }
}
