//! Non-fatal diagnostics collected during a pass

use flagshift_catalog::Location;
use serde::Serialize;

/// Warning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    LowConfidenceMatch,
    NonFalseFallback,
    EmptyConfigFallback,
    AmbiguousRelation,
    OrphanPragma,
    UnmatchedPragmaName,
    BucketingChange,
    DroppedAttribute,
    UnknownAttribute,
    DroppedOption,
    LostFeature,
    PassThroughUser,
    AnonymousContext,
    RetainedImport,
    ClientNotInScope,
    BehaviorChange,
    FileSkipped,
}

impl WarningCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::LowConfidenceMatch => "low_confidence_match",
            WarningCode::NonFalseFallback => "non_false_fallback",
            WarningCode::EmptyConfigFallback => "empty_config_fallback",
            WarningCode::AmbiguousRelation => "ambiguous_relation",
            WarningCode::OrphanPragma => "orphan_pragma",
            WarningCode::UnmatchedPragmaName => "unmatched_pragma_name",
            WarningCode::BucketingChange => "bucketing_change",
            WarningCode::DroppedAttribute => "dropped_attribute",
            WarningCode::UnknownAttribute => "unknown_attribute",
            WarningCode::DroppedOption => "dropped_option",
            WarningCode::LostFeature => "lost_feature",
            WarningCode::PassThroughUser => "pass_through_user",
            WarningCode::AnonymousContext => "anonymous_context",
            WarningCode::RetainedImport => "retained_import",
            WarningCode::ClientNotInScope => "client_not_in_scope",
            WarningCode::BehaviorChange => "behavior_change",
            WarningCode::FileSkipped => "file_skipped",
        }
    }
}

/// A warning, optionally tied to a source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
    pub location: Option<Location>,
}

impl Warning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn at(mut self, location: &Location) -> Self {
        self.location = Some(location.clone());
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[{}] {} ({location})", self.code.as_str(), self.message),
            None => write!(f, "[{}] {}", self.code.as_str(), self.message),
        }
    }
}
