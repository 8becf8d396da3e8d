//! Finding model
//!
//! A [`Finding`] is one recognized Statsig call site or import. Findings are
//! produced by the scanner, annotated by the classifier and consumed by the
//! rewrite engine and report builder. Everything here is plain data.

use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::literal::JsValue;

/// Kind of recognized site
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Import,
    GateCheck,
    ConfigFetch,
    ExperimentFetch,
    LayerFetch,
    ProviderInit,
    HookUsage,
    EventLog,
    ManualExposure,
    Override,
}

impl FindingKind {
    /// Stable snake_case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Import => "import",
            FindingKind::GateCheck => "gate_check",
            FindingKind::ConfigFetch => "config_fetch",
            FindingKind::ExperimentFetch => "experiment_fetch",
            FindingKind::LayerFetch => "layer_fetch",
            FindingKind::ProviderInit => "provider_init",
            FindingKind::HookUsage => "hook_usage",
            FindingKind::EventLog => "event_log",
            FindingKind::ManualExposure => "manual_exposure",
            FindingKind::Override => "override",
        }
    }

    /// Gates and dynamic configs: the only kinds that become flags
    #[inline]
    #[must_use]
    pub fn is_flag(&self) -> bool {
        matches!(self, FindingKind::GateCheck | FindingKind::ConfigFetch)
    }

    /// Experiments and layers are never migrated
    #[inline]
    #[must_use]
    pub fn is_experiment_like(&self) -> bool {
        matches!(self, FindingKind::ExperimentFetch | FindingKind::LayerFetch)
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SDK flavour a site was written against
///
/// `Plain` covers every Statsig package that is neither the browser JS client
/// nor the React bindings (server SDKs), and sites with no resolvable import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkVariant {
    JavaScript,
    React,
    Plain,
}

impl SdkVariant {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkVariant::JavaScript => "javascript",
            SdkVariant::React => "react",
            SdkVariant::Plain => "plain",
        }
    }
}

impl std::fmt::Display for SdkVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sure the scanner is that a site really is a Statsig call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    High,
    Low,
}

/// Source position of a finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Path relative to the project root
    pub file: PathBuf,
    /// Byte range in the file
    pub span: Range<usize>,
    /// 1-based line
    pub line: usize,
    /// 1-based column (bytes)
    pub column: usize,
}

impl Location {
    #[inline]
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, span: Range<usize>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            span,
            line,
            column,
        }
    }

    /// Check whether two locations in the same file share any byte
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Location) -> bool {
        self.file == other.file
            && self.span.start < other.span.end
            && other.span.start < self.span.end
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Index of a finding in the project arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FindingId(pub usize);

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role a known package plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "of")]
pub enum PackageRole {
    /// A Statsig SDK entry point
    Sdk(SdkVariant),
    /// An observability add-on shipped as a client plugin
    Observability(PluginKind),
}

/// Observability add-ons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    SessionReplay,
    WebAnalytics,
}

/// `.get(key, default)` read on a fetched config, experiment or layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRead {
    /// Source text of the object `.get` is called on
    pub accessor: String,
    pub key: String,
    pub key_is_literal: bool,
    /// `None` when the default argument is missing
    pub default: Option<JsValue>,
    pub location: Location,
}

/// Per-shape data carried by a finding
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FindingDetail {
    #[default]
    None,
    Import(ImportDetail),
    Call(CallDetail),
    Provider(ProviderDetail),
}

/// Import or `require` of a known package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDetail {
    pub package: String,
    pub role: PackageRole,
    /// Local names bound by the statement
    pub locals: Vec<String>,
    /// `const x = require(...)` rather than `import`
    pub commonjs: bool,
    /// Statement ends with a semicolon
    pub semicolon: bool,
}

/// Shape of the hook return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookShape {
    /// The flag value itself
    Value,
    /// Object exposing `.value`
    ValueField,
    /// Object exposing `.config`
    ConfigField,
    /// Object exposing `.client`
    ClientField,
    /// Anything else; never rewritten automatically
    Opaque,
}

/// How the call was written
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CallStyle {
    /// `receiver.method(...)`; receiver is empty for bare wrapper calls
    Method {
        receiver: String,
        method: String,
        /// Receiver is an imported namespace (`Statsig.checkGate`)
        namespace_receiver: bool,
    },
    /// `useSomething(...)`
    Hook { hook: String, shape: HookShape },
}

/// Arguments of an event log call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventArgs {
    pub value: Option<JsValue>,
    pub metadata: Option<JsValue>,
}

/// Method and hook calls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDetail {
    pub style: CallStyle,
    /// User argument of a server-style call (`checkGate(user, "name")`)
    pub server_user: Option<String>,
    pub param_reads: Vec<ParamRead>,
    /// Names from pragmas near an experiment or layer fetch
    pub related_names: Vec<String>,
    pub event: Option<EventArgs>,
}

impl CallDetail {
    #[inline]
    #[must_use]
    pub fn new(style: CallStyle) -> Self {
        Self {
            style,
            server_user: None,
            param_reads: Vec::new(),
            related_names: Vec::new(),
            event: None,
        }
    }
}

/// How the SDK gets initialized
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ProviderStyle {
    /// `Statsig.initialize(key, user, options)`
    StaticInitialize { receiver: String },
    /// `new StatsigClient(key, user, options)`
    Constructor { class: String },
    /// `client.initializeAsync()` / `client.initializeSync()`
    ClientStart { receiver: String, method: String },
    /// `<StatsigProvider ...>`; the finding spans the opening tag
    Jsx {
        component: String,
        /// Byte range of the closing tag, absent for self-closing elements
        closing_tag: Option<Range<usize>>,
    },
}

/// SDK initialization site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDetail {
    pub style: ProviderStyle,
    pub user: Option<JsValue>,
    pub options: Option<JsValue>,
    /// Arguments or props that have no target equivalent
    pub dropped: Vec<String>,
    /// The call is a whole expression statement
    pub statement_level: bool,
    pub awaited: bool,
    /// Leading whitespace of the statement's line
    pub indent: String,
}

/// Name argument of a call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NameArg {
    pub text: String,
    pub literal: bool,
}

impl NameArg {
    #[inline]
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literal: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn dynamic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literal: false,
        }
    }
}

/// One recognized Statsig site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub source_name: String,
    /// False when the name is a runtime expression
    pub name_is_literal: bool,
    pub location: Location,
    pub sdk_variant: SdkVariant,
    pub fallback_literal: Option<JsValue>,
    pub confidence: Confidence,
    /// Set only by the classifier
    pub blocked: bool,
    /// Experiments responsible for the block, non-empty iff `blocked`
    pub block_reasons: Vec<String>,
    /// Set only by the classifier when relatedness cannot be decided
    pub ambiguity: Option<String>,
    pub detail: FindingDetail,
}

impl Finding {
    /// Create an unclassified finding
    #[must_use]
    pub fn new(
        kind: FindingKind,
        name: NameArg,
        location: Location,
        sdk_variant: SdkVariant,
    ) -> Self {
        Self {
            kind,
            source_name: name.text,
            name_is_literal: name.literal,
            location,
            sdk_variant,
            fallback_literal: None,
            confidence: Confidence::High,
            blocked: false,
            block_reasons: Vec::new(),
            ambiguity: None,
            detail: FindingDetail::None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_detail(mut self, detail: FindingDetail) -> Self {
        self.detail = detail;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<JsValue>) -> Self {
        self.fallback_literal = fallback;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Mark blocked by an experiment; repeated names are ignored
    pub fn block(&mut self, experiment: &str) {
        if !self.block_reasons.iter().any(|r| r == experiment) {
            self.block_reasons.push(experiment.to_string());
        }
        self.blocked = true;
    }

    /// Call detail, if the finding is a method or hook call
    #[inline]
    #[must_use]
    pub fn call(&self) -> Option<&CallDetail> {
        match &self.detail {
            FindingDetail::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Import detail, if the finding is an import
    #[inline]
    #[must_use]
    pub fn import(&self) -> Option<&ImportDetail> {
        match &self.detail {
            FindingDetail::Import(import) => Some(import),
            _ => None,
        }
    }

    /// Parameter reads attached to a config, experiment or layer fetch
    #[inline]
    #[must_use]
    pub fn param_reads(&self) -> &[ParamRead] {
        self.call().map_or(&[], |c| c.param_reads.as_slice())
    }
}
