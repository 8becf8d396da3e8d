//! Pattern catalog
//!
//! Static tables of every Statsig call shape the migrator understands, plus
//! the LaunchDarkly targets each SDK flavour is rewritten to.
//!
//! [`Catalog::match_node`] is purely syntactic: it recognizes a node's shape
//! and extracts names, fallbacks and arguments. Whether a receiver is really
//! bound to a Statsig import is decided by the scanner.

use std::ops::Range;

use indexmap::IndexMap;
use regex::Regex;
use tree_sitter::Node;

use crate::error::CatalogError;
use crate::literal::{self, named_children, node_text, JsValue};
use crate::model::{EventArgs, FindingKind, HookShape, NameArg, PackageRole, PluginKind, SdkVariant};

/// Default pragma tag
pub const DEFAULT_PRAGMA_TAG: &str = "flagshift:related";

/// What a method call does beyond naming a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodRole {
    /// First string argument names a gate, config, experiment or layer
    Named,
    /// `Statsig.initialize(key, user, options)`
    Initialize,
    /// `client.initializeAsync()` on an already constructed client
    ClientStart,
    /// `logEvent(...)`
    EventLog,
}

/// A known method name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub kind: FindingKind,
    /// Distinctive names match without a bound receiver (at low confidence)
    pub distinctive: bool,
    pub role: MethodRole,
    /// Configured project wrapper rather than an SDK method
    pub wrapper: bool,
}

/// A known React hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSpec {
    pub name: &'static str,
    pub kind: FindingKind,
    pub shape: HookShape,
}

/// LaunchDarkly API used for one SDK flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetApi {
    pub variant: SdkVariant,
    pub package: &'static str,
    /// Named exports imported when nothing more specific is known
    pub default_imports: &'static [&'static str],
    /// Boolean flag evaluation method
    pub bool_method: &'static str,
    /// JSON flag evaluation method
    pub json_method: &'static str,
    /// Client factory function
    pub init_function: &'static str,
    /// Evaluation calls take a context argument
    pub context_argument: bool,
    /// Supports the observability plugins
    pub plugins: bool,
}

/// LaunchDarkly replacement of an observability add-on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservabilityTarget {
    pub kind: PluginKind,
    pub package: &'static str,
    /// Default export name
    pub export: &'static str,
}

const PACKAGES: &[(&str, PackageRole)] = &[
    ("statsig-js", PackageRole::Sdk(SdkVariant::JavaScript)),
    ("@statsig/js-client", PackageRole::Sdk(SdkVariant::JavaScript)),
    ("statsig-react", PackageRole::Sdk(SdkVariant::React)),
    ("@statsig/react-bindings", PackageRole::Sdk(SdkVariant::React)),
    ("statsig-node", PackageRole::Sdk(SdkVariant::Plain)),
    ("@statsig/statsig-node-core", PackageRole::Sdk(SdkVariant::Plain)),
    ("@statsig/session-replay", PackageRole::Observability(PluginKind::SessionReplay)),
    ("@statsig/web-analytics", PackageRole::Observability(PluginKind::WebAnalytics)),
];

// (name, kind, distinctive, role)
const METHODS: &[(&str, FindingKind, bool, MethodRole)] = &[
    ("checkGate", FindingKind::GateCheck, true, MethodRole::Named),
    ("checkGateWithExposureLoggingDisabled", FindingKind::GateCheck, true, MethodRole::Named),
    ("getFeatureGate", FindingKind::GateCheck, true, MethodRole::Named),
    ("getConfig", FindingKind::ConfigFetch, false, MethodRole::Named),
    ("getDynamicConfig", FindingKind::ConfigFetch, true, MethodRole::Named),
    ("getConfigWithExposureLoggingDisabled", FindingKind::ConfigFetch, true, MethodRole::Named),
    ("getExperiment", FindingKind::ExperimentFetch, true, MethodRole::Named),
    (
        "getExperimentWithExposureLoggingDisabled",
        FindingKind::ExperimentFetch,
        true,
        MethodRole::Named,
    ),
    ("getLayer", FindingKind::LayerFetch, true, MethodRole::Named),
    ("getLayerWithExposureLoggingDisabled", FindingKind::LayerFetch, true, MethodRole::Named),
    ("initialize", FindingKind::ProviderInit, false, MethodRole::Initialize),
    ("initializeAsync", FindingKind::ProviderInit, true, MethodRole::ClientStart),
    ("initializeSync", FindingKind::ProviderInit, true, MethodRole::ClientStart),
    ("logEvent", FindingKind::EventLog, false, MethodRole::EventLog),
    ("manuallyLogGateExposure", FindingKind::ManualExposure, true, MethodRole::Named),
    ("manuallyLogConfigExposure", FindingKind::ManualExposure, true, MethodRole::Named),
    ("manuallyLogExperimentExposure", FindingKind::ManualExposure, true, MethodRole::Named),
    ("manuallyLogLayerParameterExposure", FindingKind::ManualExposure, true, MethodRole::Named),
    ("overrideGate", FindingKind::Override, true, MethodRole::Named),
    ("overrideConfig", FindingKind::Override, true, MethodRole::Named),
    ("overrideExperiment", FindingKind::Override, true, MethodRole::Named),
    ("overrideLayer", FindingKind::Override, true, MethodRole::Named),
];

const HOOKS: &[HookSpec] = &[
    HookSpec { name: "useGate", kind: FindingKind::GateCheck, shape: HookShape::ValueField },
    HookSpec { name: "useFeatureGate", kind: FindingKind::GateCheck, shape: HookShape::ValueField },
    HookSpec { name: "useGateValue", kind: FindingKind::GateCheck, shape: HookShape::Value },
    HookSpec { name: "useConfig", kind: FindingKind::ConfigFetch, shape: HookShape::ConfigField },
    HookSpec {
        name: "useDynamicConfig",
        kind: FindingKind::ConfigFetch,
        shape: HookShape::ValueField,
    },
    HookSpec {
        name: "useExperiment",
        kind: FindingKind::ExperimentFetch,
        shape: HookShape::Opaque,
    },
    HookSpec { name: "useLayer", kind: FindingKind::LayerFetch, shape: HookShape::Opaque },
    HookSpec {
        name: "useStatsigClient",
        kind: FindingKind::HookUsage,
        shape: HookShape::ClientField,
    },
    HookSpec { name: "useStatsigUser", kind: FindingKind::HookUsage, shape: HookShape::Opaque },
    HookSpec {
        name: "useClientAsyncInit",
        kind: FindingKind::HookUsage,
        shape: HookShape::ClientField,
    },
    HookSpec {
        name: "useClientBootstrapInit",
        kind: FindingKind::HookUsage,
        shape: HookShape::ClientField,
    },
];

// (class, distinctive)
const CLIENT_CLASSES: &[(&str, bool)] = &[("StatsigClient", true), ("Statsig", false)];

const PROVIDER_COMPONENTS: &[&str] = &["StatsigProvider"];

/// Props of `<StatsigProvider>` with a LaunchDarkly counterpart
pub const PROVIDER_PROPS: &[&str] = &[
    "sdkKey",
    "user",
    "options",
    "client",
    "waitForInitialization",
];

const PLUGIN_CLASSES: &[(&str, PluginKind)] = &[
    ("StatsigSessionReplayPlugin", PluginKind::SessionReplay),
    ("StatsigAutoCapturePlugin", PluginKind::WebAnalytics),
];

const PLUGIN_FUNCTIONS: &[(&str, PluginKind)] = &[
    ("runStatsigSessionReplay", PluginKind::SessionReplay),
    ("runStatsigAutoCapture", PluginKind::WebAnalytics),
];

const TARGETS: &[TargetApi] = &[
    TargetApi {
        variant: SdkVariant::JavaScript,
        package: "launchdarkly-js-client-sdk",
        default_imports: &["initialize"],
        bool_method: "variation",
        json_method: "variation",
        init_function: "initialize",
        context_argument: false,
        plugins: true,
    },
    TargetApi {
        variant: SdkVariant::React,
        package: "launchdarkly-react-client-sdk",
        default_imports: &["LDProvider", "useFlags", "useLDClient"],
        bool_method: "variation",
        json_method: "variation",
        init_function: "LDProvider",
        context_argument: false,
        plugins: true,
    },
    TargetApi {
        variant: SdkVariant::Plain,
        package: "@launchdarkly/node-server-sdk",
        default_imports: &["init"],
        bool_method: "boolVariation",
        json_method: "jsonVariation",
        init_function: "init",
        context_argument: true,
        plugins: false,
    },
];

const OBSERVABILITY: &[ObservabilityTarget] = &[
    ObservabilityTarget {
        kind: PluginKind::SessionReplay,
        package: "@launchdarkly/session-replay",
        export: "SessionReplay",
    },
    ObservabilityTarget {
        kind: PluginKind::WebAnalytics,
        package: "@launchdarkly/observability",
        export: "Observability",
    },
];

/// Binding introduced by an import or `require`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Exported name; `None` for default and namespace imports
    pub imported: Option<String>,
    pub local: String,
}

/// Recognized import statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportMatch {
    pub package: String,
    pub role: PackageRole,
    pub bindings: Vec<ImportBinding>,
    pub commonjs: bool,
    pub semicolon: bool,
}

/// Recognized `receiver.method(...)` or bare `method(...)` call
#[derive(Debug, Clone, PartialEq)]
pub struct MethodMatch {
    /// Receiver source text, `None` for a bare call
    pub receiver: Option<String>,
    /// Receiver is a plain identifier
    pub simple_receiver: bool,
    pub spec: MethodSpec,
    pub server_user: Option<String>,
    pub event: Option<EventArgs>,
    pub arguments: Vec<JsValue>,
}

/// Recognized hook call
#[derive(Debug, Clone, PartialEq)]
pub struct HookMatch {
    pub spec: HookSpec,
    pub arguments: Vec<JsValue>,
}

/// Recognized `new StatsigClient(...)`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructMatch {
    pub class: String,
    pub distinctive: bool,
    pub arguments: Vec<JsValue>,
}

/// Recognized `<StatsigProvider ...>`
#[derive(Debug, Clone, PartialEq)]
pub struct JsxMatch {
    pub component: String,
    /// Props in source order; `None` for valueless props
    pub props: IndexMap<String, Option<JsValue>>,
    pub closing_tag: Option<Range<usize>>,
}

/// Call shape of a match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchShape {
    Import(ImportMatch),
    Method(MethodMatch),
    Hook(HookMatch),
    Construct(ConstructMatch),
    Jsx(JsxMatch),
}

/// Result of matching one syntax node
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub kind: FindingKind,
    pub name: NameArg,
    pub fallback: Option<JsValue>,
    /// Byte range the finding covers
    pub span: Range<usize>,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub shape: MatchShape,
}

/// Recognized observability plugin use
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMatch {
    pub kind: PluginKind,
    pub options: Option<JsValue>,
    pub span: Range<usize>,
}

/// Comment pragma listing names related to an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub names: Vec<String>,
}

/// Pattern catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    methods: IndexMap<String, MethodSpec>,
    pragma_tag: String,
    pragma: Regex,
}

impl Catalog {
    /// Built-in catalog with the default pragma tag
    ///
    /// # Errors
    ///
    /// Only fails if the built-in pragma pattern fails to compile.
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_extensions(DEFAULT_PRAGMA_TAG, std::iter::empty::<(String, FindingKind)>())
    }

    /// Catalog with a custom pragma tag and project wrapper methods
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for an invalid tag or wrapper name, or a
    /// wrapper that collides with a built-in method of a different kind.
    pub fn with_extensions<I, S>(pragma_tag: &str, wrappers: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (S, FindingKind)>,
        S: AsRef<str>,
    {
        if pragma_tag.is_empty()
            || !pragma_tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
        {
            return Err(CatalogError::InvalidPragmaTag(pragma_tag.to_string()));
        }

        let mut methods = IndexMap::new();
        for &(name, kind, distinctive, role) in METHODS {
            methods.insert(
                name.to_string(),
                MethodSpec {
                    name: name.to_string(),
                    kind,
                    distinctive,
                    role,
                    wrapper: false,
                },
            );
        }

        for (name, kind) in wrappers {
            let name = name.as_ref();
            if !literal::is_identifier(name) {
                return Err(CatalogError::InvalidWrapper(name.to_string()));
            }
            let role = match kind {
                FindingKind::EventLog => MethodRole::EventLog,
                FindingKind::GateCheck
                | FindingKind::ConfigFetch
                | FindingKind::ExperimentFetch
                | FindingKind::LayerFetch
                | FindingKind::ManualExposure
                | FindingKind::Override => MethodRole::Named,
                FindingKind::Import | FindingKind::ProviderInit | FindingKind::HookUsage => {
                    return Err(CatalogError::UnsupportedWrapperKind {
                        name: name.to_string(),
                        kind,
                    });
                }
            };
            if let Some(builtin) = methods.get(name) {
                if builtin.kind != kind {
                    return Err(CatalogError::collision(name, builtin.kind, kind));
                }
            }
            methods.insert(
                name.to_string(),
                MethodSpec {
                    name: name.to_string(),
                    kind,
                    distinctive: true,
                    role,
                    wrapper: true,
                },
            );
        }

        let pragma = Regex::new(&format!(
            r"^(?://+|/\*+)\s*{}\s+(.*?)\s*(?:\*+/)?\s*$",
            regex::escape(pragma_tag)
        ))?;

        Ok(Self {
            methods,
            pragma_tag: pragma_tag.to_string(),
            pragma,
        })
    }

    #[inline]
    #[must_use]
    pub fn pragma_tag(&self) -> &str {
        &self.pragma_tag
    }

    /// Role of a known package
    #[must_use]
    pub fn package(&self, name: &str) -> Option<PackageRole> {
        PACKAGES
            .iter()
            .find(|(package, _)| *package == name)
            .map(|&(_, role)| role)
    }

    #[inline]
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }

    #[must_use]
    pub fn hook(&self, name: &str) -> Option<&'static HookSpec> {
        HOOKS.iter().find(|hook| hook.name == name)
    }

    /// Client class name, with its distinctive flag
    #[must_use]
    pub fn client_class(&self, name: &str) -> Option<bool> {
        CLIENT_CLASSES
            .iter()
            .find(|(class, _)| *class == name)
            .map(|&(_, distinctive)| distinctive)
    }

    #[must_use]
    pub fn is_provider_component(&self, name: &str) -> bool {
        PROVIDER_COMPONENTS.contains(&name)
    }

    /// Target API for an SDK flavour
    #[must_use]
    pub fn target(&self, variant: SdkVariant) -> &'static TargetApi {
        match variant {
            SdkVariant::JavaScript => &TARGETS[0],
            SdkVariant::React => &TARGETS[1],
            SdkVariant::Plain => &TARGETS[2],
        }
    }

    #[must_use]
    pub fn observability_target(&self, kind: PluginKind) -> &'static ObservabilityTarget {
        match kind {
            PluginKind::SessionReplay => &OBSERVABILITY[0],
            PluginKind::WebAnalytics => &OBSERVABILITY[1],
        }
    }

    /// Parse a comment as a relatedness pragma
    #[must_use]
    pub fn pragma(&self, comment: &str) -> Option<Pragma> {
        let captures = self.pragma.captures(comment.trim())?;
        let names: Vec<String> = captures
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        (!names.is_empty()).then_some(Pragma { names })
    }

    /// Recognize an observability plugin construction or runner call
    #[must_use]
    pub fn match_plugin(&self, node: Node<'_>, source: &str) -> Option<PluginMatch> {
        let (callee, arguments, options_index) = match node.kind() {
            "new_expression" => (
                node.child_by_field_name("constructor")?,
                node.child_by_field_name("arguments"),
                0,
            ),
            "call_expression" => (
                node.child_by_field_name("function")?,
                node.child_by_field_name("arguments"),
                1,
            ),
            _ => return None,
        };
        if callee.kind() != "identifier" {
            return None;
        }
        let name = node_text(callee, source);
        let table = if node.kind() == "new_expression" { PLUGIN_CLASSES } else { PLUGIN_FUNCTIONS };
        let kind = table.iter().find(|(n, _)| *n == name).map(|&(_, kind)| kind)?;

        let options = arguments
            .map(named_children)
            .and_then(|args| args.get(options_index).copied())
            .map(|arg| JsValue::from_node(arg, source));
        Some(PluginMatch {
            kind,
            options,
            span: node.byte_range(),
        })
    }

    /// Recognize a Statsig call shape at `node`
    #[must_use]
    pub fn match_node(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        match node.kind() {
            "import_statement" => self.match_import(node, source),
            "lexical_declaration" | "variable_declaration" => self.match_require(node, source),
            "call_expression" => self.match_call(node, source),
            "new_expression" => self.match_construct(node, source),
            "jsx_element" | "jsx_self_closing_element" => self.match_jsx(node, source),
            _ => None,
        }
    }

    fn match_import(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        let source_node = node.child_by_field_name("source")?;
        let package = literal::string_value(source_node, source);
        let role = self.package(&package)?;

        let mut bindings = Vec::new();
        for child in named_children(node) {
            if child.kind() != "import_clause" {
                continue;
            }
            for clause in named_children(child) {
                match clause.kind() {
                    "identifier" => bindings.push(ImportBinding {
                        imported: None,
                        local: node_text(clause, source).to_string(),
                    }),
                    "namespace_import" => {
                        if let Some(ident) = named_children(clause)
                            .into_iter()
                            .find(|n| n.kind() == "identifier")
                        {
                            bindings.push(ImportBinding {
                                imported: None,
                                local: node_text(ident, source).to_string(),
                            });
                        }
                    }
                    "named_imports" => {
                        for specifier in named_children(clause) {
                            if specifier.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name) = specifier.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = node_text(name, source).to_string();
                            let local = specifier
                                .child_by_field_name("alias")
                                .map_or_else(
                                    || imported.clone(),
                                    |alias| node_text(alias, source).to_string(),
                                );
                            bindings.push(ImportBinding {
                                imported: Some(imported),
                                local,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        let semicolon = node_text(node, source).trim_end().ends_with(';');
        Some(self.import_match(node, package, role, bindings, false, semicolon))
    }

    fn match_require(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        let declarators: Vec<Node<'_>> = named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "variable_declarator")
            .collect();
        let [declarator] = declarators.as_slice() else {
            return None;
        };
        let value = declarator.child_by_field_name("value")?;
        if value.kind() != "call_expression" {
            return None;
        }
        let function = value.child_by_field_name("function")?;
        if function.kind() != "identifier" || node_text(function, source) != "require" {
            return None;
        }
        let argument = value
            .child_by_field_name("arguments")
            .map(named_children)
            .and_then(|args| args.first().copied())?;
        if argument.kind() != "string" {
            return None;
        }
        let package = literal::string_value(argument, source);
        let role = self.package(&package)?;

        let pattern = declarator.child_by_field_name("name")?;
        let mut bindings = Vec::new();
        match pattern.kind() {
            "identifier" => bindings.push(ImportBinding {
                imported: None,
                local: node_text(pattern, source).to_string(),
            }),
            "object_pattern" => {
                for property in named_children(pattern) {
                    match property.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = node_text(property, source).to_string();
                            bindings.push(ImportBinding {
                                imported: Some(name.clone()),
                                local: name,
                            });
                        }
                        "pair_pattern" => {
                            let key = property.child_by_field_name("key");
                            let value = property.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value) {
                                if value.kind() == "identifier" {
                                    bindings.push(ImportBinding {
                                        imported: Some(node_text(key, source).to_string()),
                                        local: node_text(value, source).to_string(),
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        let semicolon = node_text(node, source).trim_end().ends_with(';');
        Some(self.import_match(node, package, role, bindings, true, semicolon))
    }

    #[allow(clippy::unused_self)]
    fn import_match(
        &self,
        node: Node<'_>,
        package: String,
        role: PackageRole,
        bindings: Vec<ImportBinding>,
        commonjs: bool,
        semicolon: bool,
    ) -> PatternMatch {
        PatternMatch {
            kind: FindingKind::Import,
            name: NameArg::literal(package.clone()),
            fallback: None,
            span: node.byte_range(),
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            shape: MatchShape::Import(ImportMatch {
                package,
                role,
                bindings,
                commonjs,
                semicolon,
            }),
        }
    }

    fn match_call(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        let function = node.child_by_field_name("function")?;
        let arguments: Vec<Node<'_>> = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();

        let (receiver, simple_receiver, method_name) = match function.kind() {
            "member_expression" => {
                let object = function.child_by_field_name("object")?;
                let property = function.child_by_field_name("property")?;
                (
                    Some(node_text(object, source).to_string()),
                    object.kind() == "identifier",
                    node_text(property, source),
                )
            }
            "identifier" => {
                let name = node_text(function, source);
                if let Some(hook) = self.hook(name) {
                    return Some(hook_match(node, source, *hook, &arguments));
                }
                (None, false, name)
            }
            _ => return None,
        };

        let spec = self.method(method_name)?.clone();
        let values: Vec<JsValue> = arguments
            .iter()
            .map(|arg| JsValue::from_node(*arg, source))
            .collect();

        let (name, fallback, server_user, event) = match spec.role {
            MethodRole::Named => {
                let (server_user, rest) = split_server_user(&arguments, source);
                let name = rest
                    .first()
                    .map_or_else(|| NameArg::dynamic(""), |arg| name_arg(*arg, source));
                let fallback = rest.get(1).map(|arg| JsValue::from_node(*arg, source));
                (name, fallback, server_user, None)
            }
            MethodRole::EventLog => {
                let (name, server_user, event) = event_args(&arguments, source);
                (name, None, server_user, Some(event))
            }
            MethodRole::Initialize | MethodRole::ClientStart => {
                let callee = node_text(function, source).to_string();
                (NameArg::literal(callee), None, None, None)
            }
        };

        Some(PatternMatch {
            kind: spec.kind,
            name,
            fallback,
            span: node.byte_range(),
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            shape: MatchShape::Method(MethodMatch {
                receiver,
                simple_receiver,
                spec,
                server_user,
                event,
                arguments: values,
            }),
        })
    }

    fn match_construct(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        let constructor = node.child_by_field_name("constructor")?;
        if constructor.kind() != "identifier" {
            return None;
        }
        let class = node_text(constructor, source);
        let distinctive = self.client_class(class)?;
        let arguments = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(|arg| JsValue::from_node(arg, source))
            .collect();

        Some(PatternMatch {
            kind: FindingKind::ProviderInit,
            name: NameArg::literal(class),
            fallback: None,
            span: node.byte_range(),
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
            shape: MatchShape::Construct(ConstructMatch {
                class: class.to_string(),
                distinctive,
                arguments,
            }),
        })
    }

    fn match_jsx(&self, node: Node<'_>, source: &str) -> Option<PatternMatch> {
        let (opening, closing) = if node.kind() == "jsx_element" {
            let children = named_children(node);
            let opening = children.iter().copied().find(|n| n.kind() == "jsx_opening_element")?;
            let closing = children.iter().copied().find(|n| n.kind() == "jsx_closing_element");
            (opening, closing)
        } else {
            (node, None)
        };

        let name_node = opening.child_by_field_name("name")?;
        let component = node_text(name_node, source);
        if !self.is_provider_component(component) {
            return None;
        }

        let mut props = IndexMap::new();
        for attribute in named_children(opening) {
            if attribute.kind() != "jsx_attribute" {
                continue;
            }
            let parts = named_children(attribute);
            let Some(prop) = parts.first() else {
                continue;
            };
            let value = parts.get(1).map(|value| match value.kind() {
                "jsx_expression" => named_children(*value)
                    .first()
                    .map_or(JsValue::Undefined, |expr| JsValue::from_node(*expr, source)),
                _ => JsValue::from_node(*value, source),
            });
            props.insert(node_text(*prop, source).to_string(), value);
        }

        Some(PatternMatch {
            kind: FindingKind::ProviderInit,
            name: NameArg::literal(component),
            fallback: None,
            span: opening.byte_range(),
            line: opening.start_position().row + 1,
            column: opening.start_position().column + 1,
            shape: MatchShape::Jsx(JsxMatch {
                component: component.to_string(),
                props,
                closing_tag: closing.map(|n| n.byte_range()),
            }),
        })
    }
}

fn hook_match(
    node: Node<'_>,
    source: &str,
    spec: HookSpec,
    arguments: &[Node<'_>],
) -> PatternMatch {
    let (name, fallback) = if spec.kind == FindingKind::HookUsage {
        (NameArg::literal(spec.name), None)
    } else {
        (
            arguments.first().map_or_else(|| NameArg::dynamic(""), |arg| name_arg(*arg, source)),
            arguments.get(1).map(|arg| JsValue::from_node(*arg, source)),
        )
    };
    PatternMatch {
        kind: spec.kind,
        name,
        fallback,
        span: node.byte_range(),
        line: node.start_position().row + 1,
        column: node.start_position().column + 1,
        shape: MatchShape::Hook(HookMatch {
            spec,
            arguments: arguments.iter().map(|arg| JsValue::from_node(*arg, source)).collect(),
        }),
    }
}

/// String literal or substitution-free template
fn is_string_like(node: Node<'_>) -> bool {
    match node.kind() {
        "string" => true,
        "template_string" => !named_children(node)
            .iter()
            .any(|child| child.kind() == "template_substitution"),
        _ => false,
    }
}

fn name_arg(node: Node<'_>, source: &str) -> NameArg {
    match JsValue::from_node(node, source) {
        JsValue::String(name) if is_string_like(node) => NameArg::literal(name),
        _ => NameArg::dynamic(node_text(node, source)),
    }
}

/// Server SDK calls take the user first: `checkGate(user, "name")`
fn split_server_user<'a, 't>(
    arguments: &'a [Node<'t>],
    source: &str,
) -> (Option<String>, &'a [Node<'t>]) {
    match arguments {
        [first, second, ..] if !is_string_like(*first) && is_string_like(*second) => {
            (Some(node_text(*first, source).to_string()), &arguments[1..])
        }
        _ => (None, arguments),
    }
}

fn event_args(arguments: &[Node<'_>], source: &str) -> (NameArg, Option<String>, EventArgs) {
    let (server_user, rest) = match arguments {
        [first, second, ..]
            if !is_string_like(*first)
                && first.kind() != "object"
                && (is_string_like(*second) || second.kind() == "object") =>
        {
            (Some(node_text(*first, source).to_string()), &arguments[1..])
        }
        _ => (None, arguments),
    };

    let Some(first) = rest.first() else {
        return (
            NameArg::dynamic(""),
            server_user,
            EventArgs { value: None, metadata: None },
        );
    };

    if first.kind() == "object" {
        if let JsValue::Object(fields) = JsValue::from_node(*first, source) {
            let name = match fields.get("eventName") {
                Some(JsValue::String(name)) => NameArg::literal(name.clone()),
                Some(other) => NameArg::dynamic(other.render()),
                None => NameArg::dynamic(""),
            };
            let event = EventArgs {
                value: fields.get("value").cloned(),
                metadata: fields.get("metadata").cloned(),
            };
            return (name, server_user, event);
        }
    }

    let event = EventArgs {
        value: rest.get(1).map(|arg| JsValue::from_node(*arg, source)),
        metadata: rest.get(2).map(|arg| JsValue::from_node(*arg, source)),
    };
    (name_arg(*first, source), server_user, event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    /// Every match in pre-order
    fn matches(source: &str) -> Vec<PatternMatch> {
        let catalog = Catalog::new().unwrap();
        let tree = parse(source);
        let mut out = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if let Some(m) = catalog.match_node(node, source) {
                out.push(m);
            }
            for i in (0..node.named_child_count()).rev() {
                if let Some(child) = node.named_child(i) {
                    stack.push(child);
                }
            }
        }
        out
    }

    #[test]
    fn named_and_default_imports() {
        let found = matches(
            "import Statsig, { useGate as gate } from 'statsig-react';\nimport x from 'lodash';",
        );
        assert_eq!(found.len(), 1);
        let MatchShape::Import(import) = &found[0].shape else {
            panic!("expected import");
        };
        assert_eq!(import.package, "statsig-react");
        assert_eq!(import.role, PackageRole::Sdk(SdkVariant::React));
        assert!(import.semicolon);
        assert_eq!(
            import.bindings,
            vec![
                ImportBinding { imported: None, local: "Statsig".into() },
                ImportBinding { imported: Some("useGate".into()), local: "gate".into() },
            ]
        );
    }

    #[test]
    fn require_imports() {
        let found = matches("const { StatsigClient } = require('@statsig/js-client')");
        let MatchShape::Import(import) = &found[0].shape else {
            panic!("expected import");
        };
        assert!(import.commonjs);
        assert!(!import.semicolon);
        assert_eq!(import.bindings[0].local, "StatsigClient");
    }

    #[test]
    fn gate_check_with_fallback() {
        let found = matches("Statsig.checkGate('new_checkout', true);");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, FindingKind::GateCheck);
        assert_eq!(found[0].name, NameArg::literal("new_checkout"));
        assert_eq!(found[0].fallback, Some(JsValue::Bool(true)));
        let MatchShape::Method(method) = &found[0].shape else {
            panic!("expected method");
        };
        assert_eq!(method.receiver.as_deref(), Some("Statsig"));
        assert!(method.simple_receiver);
    }

    #[test]
    fn server_style_call_keeps_user() {
        let found = matches("await statsig.checkGate(user, 'beta_access');");
        let MatchShape::Method(method) = &found[0].shape else {
            panic!("expected method");
        };
        assert_eq!(method.server_user.as_deref(), Some("user"));
        assert_eq!(found[0].name, NameArg::literal("beta_access"));
    }

    #[test]
    fn dynamic_names_are_marked() {
        let found = matches("client.getExperiment(`exp_${id}`);");
        assert_eq!(found[0].kind, FindingKind::ExperimentFetch);
        assert!(!found[0].name.literal);
    }

    #[test]
    fn event_log_object_form() {
        let found = matches(
            "client.logEvent({ eventName: 'purchase', value: 9.99, \
             metadata: { sku: 'a' } });",
        );
        let MatchShape::Method(method) = &found[0].shape else {
            panic!("expected method");
        };
        assert_eq!(found[0].name, NameArg::literal("purchase"));
        let event = method.event.as_ref().unwrap();
        assert_eq!(event.value, Some(JsValue::Number("9.99".into())));
    }

    #[test]
    fn hooks_and_provider() {
        let source = "const App = () => (<StatsigProvider sdkKey=\"client-key\" \
                      user={{ userID: 'u1' }} waitForInitialization>\
                      {children}</StatsigProvider>);\n\
                      const { value } = useGate('admin_panel');";
        let found = matches(source);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, FindingKind::ProviderInit);
        let MatchShape::Jsx(jsx) = &found[0].shape else {
            panic!("expected jsx");
        };
        assert_eq!(jsx.props.get("sdkKey"), Some(&Some(JsValue::string("client-key"))));
        assert_eq!(jsx.props.get("waitForInitialization"), Some(&None));
        assert!(jsx.closing_tag.is_some());
        assert_eq!(found[1].kind, FindingKind::GateCheck);
        assert_eq!(found[1].name, NameArg::literal("admin_panel"));
    }

    #[test]
    fn pragma_parsing() {
        let catalog = Catalog::new().unwrap();
        let pragma = catalog.pragma("// flagshift:related express_checkout, one_click").unwrap();
        assert_eq!(pragma.names, vec!["express_checkout", "one_click"]);
        assert!(catalog.pragma("/* flagshift:related a */").is_some());
        assert!(catalog.pragma("// unrelated comment").is_none());
        assert!(catalog.pragma("// flagshift:related").is_none());
    }

    #[test]
    fn wrapper_collision_is_rejected() {
        let err = Catalog::with_extensions(
            "flagshift:related",
            [("checkGate", FindingKind::ConfigFetch)],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::WrapperCollision { .. }));

        let err = Catalog::with_extensions("bad tag", std::iter::empty::<(String, FindingKind)>())
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPragmaTag(_)));

        let catalog = Catalog::with_extensions(
            "flagshift:related",
            [("isFeatureOn", FindingKind::GateCheck)],
        )
        .unwrap();
        assert!(catalog.method("isFeatureOn").unwrap().wrapper);
    }

    #[test]
    fn plugin_uses() {
        let catalog = Catalog::new().unwrap();
        let source = "new StatsigSessionReplayPlugin({ privacyMask: true })";
        let tree = parse(source);
        let expr = tree.root_node().named_child(0).unwrap().named_child(0).unwrap();
        let plugin = catalog.match_plugin(expr, source).unwrap();
        assert_eq!(plugin.kind, PluginKind::SessionReplay);
        assert!(plugin.options.unwrap().as_object().unwrap().contains_key("privacyMask"));
    }
}
