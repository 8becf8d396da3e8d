//! Source scanner
//!
//! Turns a parsed file into [`Finding`]s. A pre-pass builds the
//! [`BindingTable`]; findings are then produced lazily by a pre-order walk,
//! so [`FileScan::findings`] can be called any number of times.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flagshift_catalog::literal::{named_children, node_text, string_value};
use flagshift_catalog::{
    CallDetail, CallStyle, Catalog, Confidence, Finding, FindingDetail, FindingKind, HookShape,
    ImportDetail, JsValue, Location, MatchShape, MethodRole, PackageRole, ParamRead,
    PatternMatch, ProviderDetail, ProviderStyle, SdkVariant, PROVIDER_PROPS,
};
use tree_sitter::Node;

use crate::bindings::{location_of, BindingTable, PluginUse, PragmaSite};
use crate::error::ParseError;
use crate::hash::ContentHash;
use crate::parser::{ParsedFile, ParserRegistry};

/// Default number of lines a pragma reaches forward
pub const DEFAULT_PRAGMA_WINDOW: usize = 3;

/// Scanner over parsed files
#[derive(Debug, Clone)]
pub struct Scanner {
    catalog: Arc<Catalog>,
    pragma_window: usize,
}

impl Scanner {
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            pragma_window: DEFAULT_PRAGMA_WINDOW,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_pragma_window(mut self, lines: usize) -> Self {
        self.pragma_window = lines;
        self
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Prepare a lazy scan of one parsed file
    #[must_use]
    pub fn scan<'a>(&'a self, parsed: &'a ParsedFile) -> FileScan<'a> {
        let bindings = BindingTable::build(
            parsed.tree.root_node(),
            &parsed.source,
            &self.catalog,
            &parsed.path,
        );

        let mut related: HashMap<usize, Vec<String>> = HashMap::new();
        let mut orphans = Vec::new();
        for pragma in bindings.pragmas() {
            match bindings.next_experiment_line(pragma.location.line, self.pragma_window) {
                Some(line) => {
                    let names = related.entry(line).or_default();
                    for name in &pragma.names {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                }
                None => orphans.push(pragma.clone()),
            }
        }

        FileScan {
            parsed,
            catalog: &self.catalog,
            bindings,
            related,
            orphans,
        }
    }

    /// Parse and scan a source file in one step
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the file cannot be parsed.
    pub fn scan_source(
        &self,
        registry: &ParserRegistry,
        path: &Path,
        source: &str,
    ) -> Result<ScannedFile, ParseError> {
        let parsed = registry.parse(path, source)?;
        let scanned = self.scan(&parsed).into_scanned();
        tracing::debug!(
            "scanned {}: {} findings",
            path.display(),
            scanned.findings.len()
        );
        Ok(scanned)
    }
}

/// Scan of one file; findings are produced on demand
pub struct FileScan<'a> {
    parsed: &'a ParsedFile,
    catalog: &'a Catalog,
    bindings: BindingTable,
    /// Experiment line to pragma names attached to it
    related: HashMap<usize, Vec<String>>,
    orphans: Vec<PragmaSite>,
}

impl<'a> FileScan<'a> {
    /// Fresh pre-order iterator over the file's findings
    #[must_use]
    pub fn findings(&self) -> Findings<'_> {
        Findings {
            scan: self,
            stack: vec![self.parsed.tree.root_node()],
        }
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Pragmas not followed by an experiment or layer fetch
    #[inline]
    #[must_use]
    pub fn orphan_pragmas(&self) -> &[PragmaSite] {
        &self.orphans
    }

    /// Collect everything into an owned result
    #[must_use]
    pub fn into_scanned(self) -> ScannedFile {
        let findings = self.findings().collect();
        ScannedFile {
            path: self.parsed.path.clone(),
            source: self.parsed.source.clone(),
            hash: self.parsed.hash,
            findings,
            plugins: self.bindings.plugins().to_vec(),
            orphan_pragmas: self.orphans.clone(),
            mixed_variants: self.bindings.mixed(),
        }
    }

    fn source(&self) -> &'a str {
        &self.parsed.source
    }

    fn path(&self) -> &'a Path {
        &self.parsed.path
    }

    /// Finding for `node`, if it is a Statsig site that resolves
    fn finding_at(&self, node: Node<'_>) -> Option<Finding> {
        let found = self.catalog.match_node(node, self.source())?;
        let location = Location::new(self.path(), found.span.clone(), found.line, found.column);
        let (variant, confidence) = self.resolve(&found)?;

        let detail = match &found.shape {
            MatchShape::Import(import) => FindingDetail::Import(ImportDetail {
                package: import.package.clone(),
                role: import.role,
                locals: import.bindings.iter().map(|b| b.local.clone()).collect(),
                commonjs: import.commonjs,
                semicolon: import.semicolon,
            }),
            MatchShape::Method(method) => match method.spec.role {
                MethodRole::Initialize | MethodRole::ClientStart => {
                    return Some(self.provider_finding(node, &found, location, variant, confidence));
                }
                MethodRole::Named | MethodRole::EventLog => {
                    let namespace_receiver = method
                        .receiver
                        .as_deref()
                        .filter(|_| method.simple_receiver)
                        .and_then(|r| self.bindings.resolve_receiver(r))
                        .is_some_and(|r| r.namespace);
                    let mut call = CallDetail::new(CallStyle::Method {
                        receiver: method.receiver.clone().unwrap_or_default(),
                        method: method.spec.name.clone(),
                        namespace_receiver,
                    });
                    call.server_user.clone_from(&method.server_user);
                    call.event.clone_from(&method.event);
                    self.attach_chain(node, &found, None, &mut call);
                    FindingDetail::Call(call)
                }
            },
            MatchShape::Hook(hook) => {
                let mut call = CallDetail::new(CallStyle::Hook {
                    hook: hook.spec.name.to_string(),
                    shape: hook.spec.shape,
                });
                self.attach_chain(node, &found, Some(hook.spec.shape), &mut call);
                FindingDetail::Call(call)
            }
            MatchShape::Construct(_) | MatchShape::Jsx(_) => {
                return Some(self.provider_finding(node, &found, location, variant, confidence));
            }
        };

        Some(
            Finding::new(found.kind, found.name.clone(), location, variant)
                .with_fallback(found.fallback.clone())
                .with_confidence(confidence)
                .with_detail(detail),
        )
    }

    /// Variant and confidence, or `None` when a generic name is unbound
    fn resolve(&self, found: &PatternMatch) -> Option<(SdkVariant, Confidence)> {
        let (variant, confidence) = match &found.shape {
            MatchShape::Import(import) => match import.role {
                PackageRole::Sdk(variant) => (variant, Confidence::High),
                PackageRole::Observability(_) => (self.bindings.file_variant(), Confidence::High),
            },
            MatchShape::Method(method) => {
                let resolution = match &method.receiver {
                    Some(receiver) if method.simple_receiver => {
                        self.bindings.resolve_receiver(receiver)
                    }
                    Some(_) => None,
                    None => self
                        .bindings
                        .is_sdk_bound(&method.spec.name)
                        .then(|| self.bindings.variant_of(&method.spec.name))
                        .map(|variant| crate::bindings::Resolution {
                            variant,
                            namespace: true,
                        }),
                };
                match resolution {
                    Some(resolution) => (
                        resolution.variant.unwrap_or_else(|| self.bindings.file_variant()),
                        Confidence::High,
                    ),
                    None if method.spec.wrapper => (self.bindings.file_variant(), Confidence::High),
                    None if method.spec.distinctive => {
                        (self.bindings.file_variant(), Confidence::Low)
                    }
                    None => return None,
                }
            }
            MatchShape::Hook(hook) => self.named_import(hook.spec.name, true)?,
            MatchShape::Construct(construct) => {
                self.named_import(&construct.class, construct.distinctive)?
            }
            MatchShape::Jsx(jsx) => self.named_import(&jsx.component, true)?,
        };

        if self.bindings.mixed() {
            Some((SdkVariant::JavaScript, Confidence::Low))
        } else {
            Some((variant, confidence))
        }
    }

    fn named_import(&self, local: &str, distinctive: bool) -> Option<(SdkVariant, Confidence)> {
        match self.bindings.variant_of(local) {
            Some(variant) => Some((variant, Confidence::High)),
            None if distinctive => Some((self.bindings.file_variant(), Confidence::Low)),
            None => None,
        }
    }

    fn provider_finding(
        &self,
        node: Node<'_>,
        found: &PatternMatch,
        mut location: Location,
        variant: SdkVariant,
        confidence: Confidence,
    ) -> Finding {
        let source = self.source();
        let positional = |arguments: &[JsValue]| -> (Option<JsValue>, Option<JsValue>) {
            if variant == SdkVariant::Plain {
                (None, arguments.get(1).cloned())
            } else {
                (arguments.get(1).cloned(), arguments.get(2).cloned())
            }
        };

        let mut detail = ProviderDetail {
            style: ProviderStyle::Constructor { class: String::new() },
            user: None,
            options: None,
            dropped: Vec::new(),
            statement_level: false,
            awaited: false,
            indent: String::new(),
        };

        match &found.shape {
            MatchShape::Method(method) => {
                let receiver = method.receiver.clone().unwrap_or_default();
                let namespace = method.simple_receiver
                    && self
                        .bindings
                        .resolve_receiver(&receiver)
                        .is_some_and(|r| r.namespace);
                if method.spec.role == MethodRole::Initialize
                    && (namespace || method.receiver.is_none())
                {
                    detail.style = ProviderStyle::StaticInitialize { receiver };
                    (detail.user, detail.options) = positional(&method.arguments);
                    self.statement_span(node, &mut location, &mut detail);
                } else {
                    detail.style = ProviderStyle::ClientStart {
                        receiver,
                        method: method.spec.name.clone(),
                    };
                }
            }
            MatchShape::Construct(construct) => {
                detail.style = ProviderStyle::Constructor {
                    class: construct.class.clone(),
                };
                (detail.user, detail.options) = positional(&construct.arguments);
            }
            MatchShape::Jsx(jsx) => {
                detail.style = ProviderStyle::Jsx {
                    component: jsx.component.clone(),
                    closing_tag: jsx.closing_tag.clone(),
                };
                detail.user = jsx.props.get("user").cloned().flatten();
                detail.options = jsx.props.get("options").cloned().flatten();
                detail.dropped = jsx
                    .props
                    .keys()
                    .filter(|prop| !PROVIDER_PROPS.contains(&prop.as_str()))
                    .cloned()
                    .collect();
                if jsx.props.contains_key("client") {
                    detail.dropped.push("client".to_string());
                }
                detail.indent = line_indent(source, location.span.start);
            }
            MatchShape::Import(_) | MatchShape::Hook(_) => {}
        }

        Finding::new(found.kind, found.name.clone(), location, variant)
            .with_confidence(confidence)
            .with_detail(FindingDetail::Provider(detail))
    }

    /// Widen a `[await] Statsig.initialize(...)` statement to the whole statement
    fn statement_span(&self, call: Node<'_>, location: &mut Location, detail: &mut ProviderDetail) {
        let mut outer = call;
        while let Some(parent) = outer.parent() {
            match parent.kind() {
                "await_expression" => {
                    detail.awaited = true;
                    outer = parent;
                }
                "parenthesized_expression" => outer = parent,
                _ => break,
            }
        }
        let Some(statement) = outer.parent().filter(|p| p.kind() == "expression_statement") else {
            return;
        };
        detail.statement_level = true;
        detail.indent = line_indent(self.source(), statement.start_byte());
        *location = location_of(statement, self.path());
    }

    /// Parameter reads and pragma names for config, experiment and layer fetches
    fn attach_chain(
        &self,
        node: Node<'_>,
        found: &PatternMatch,
        shape: Option<HookShape>,
        call: &mut CallDetail,
    ) {
        if !matches!(
            found.kind,
            FindingKind::ConfigFetch | FindingKind::ExperimentFetch | FindingKind::LayerFetch
        ) {
            return;
        }
        call.param_reads = self.param_reads(node, shape);
        if found.kind.is_experiment_like() {
            if let Some(names) = self.related.get(&found.line) {
                call.related_names.clone_from(names);
            }
        }
    }

    fn param_reads(&self, call: Node<'_>, shape: Option<HookShape>) -> Vec<ParamRead> {
        let source = self.source();
        let mut outer = call;
        while let Some(parent) = outer.parent() {
            if matches!(
                parent.kind(),
                "await_expression" | "parenthesized_expression" | "non_null_expression"
            ) {
                outer = parent;
            } else {
                break;
            }
        }
        let Some(parent) = outer.parent() else {
            return Vec::new();
        };

        // direct chain: getConfig('x').get('k', d) / useConfig('x').config.get('k', d)
        if parent.kind() == "member_expression" && is_field(parent, "object", outer) {
            let mut member = parent;
            if shape == Some(HookShape::ConfigField) || shape == Some(HookShape::ValueField) {
                let property = member.child_by_field_name("property").map(|p| node_text(p, source));
                if matches!(property, Some("config" | "value")) {
                    match member.parent() {
                        Some(next)
                            if next.kind() == "member_expression"
                                && is_field(next, "object", member) =>
                        {
                            member = next;
                        }
                        _ => return Vec::new(),
                    }
                }
            }
            return self.read_at(member).into_iter().collect();
        }

        if parent.kind() != "variable_declarator" || !is_field(parent, "value", outer) {
            return Vec::new();
        }
        let Some(pattern) = parent.child_by_field_name("name") else {
            return Vec::new();
        };

        let mut accessors = Vec::new();
        match pattern.kind() {
            "identifier" => {
                let name = node_text(pattern, source).to_string();
                if matches!(shape, Some(HookShape::ConfigField)) {
                    accessors.push(format!("{name}.config"));
                }
                accessors.push(name);
            }
            "object_pattern" => {
                for property in named_children(pattern) {
                    match property.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = node_text(property, source);
                            if is_accessor_field(name) {
                                accessors.push(name.to_string());
                            }
                        }
                        "pair_pattern" => {
                            let key = property
                                .child_by_field_name("key")
                                .map(|k| node_text(k, source));
                            let value = property.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value) {
                                if is_accessor_field(key) && value.kind() == "identifier" {
                                    accessors.push(node_text(value, source).to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        if accessors.is_empty() {
            return Vec::new();
        }

        let scope = enclosing_scope(parent);
        let bound: Vec<&str> = accessors
            .iter()
            .filter_map(|a| a.split('.').next())
            .collect();
        let mut reads = Vec::new();
        let mut stack = vec![scope];
        while let Some(node) = stack.pop() {
            // a nested scope with its own binding of the name reads something else
            if node.id() != scope.id() && shadows(node, &bound, source) {
                continue;
            }
            if node.kind() == "call_expression" {
                if let Some(function) = node.child_by_field_name("function") {
                    if function.kind() == "member_expression" {
                        let object = function
                            .child_by_field_name("object")
                            .map(|o| node_text(o, source));
                        if object.is_some_and(|o| accessors.iter().any(|a| a == o)) {
                            if let Some(read) = self.read_at(function) {
                                reads.push(read);
                            }
                        }
                    }
                }
            }
            for i in (0..node.named_child_count()).rev() {
                if let Some(child) = node.named_child(i) {
                    stack.push(child);
                }
            }
        }
        reads
    }

    /// `member` is `x.get` / `x.getValue`; read the call it is the callee of
    fn read_at(&self, member: Node<'_>) -> Option<ParamRead> {
        let source = self.source();
        let property = member.child_by_field_name("property")?;
        if !matches!(node_text(property, source), "get" | "getValue") {
            return None;
        }
        let call = member.parent().filter(|p| p.kind() == "call_expression")?;
        if !is_field(call, "function", member) {
            return None;
        }
        let arguments = call
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let key = arguments.first()?;
        let (key_text, key_is_literal) = if key.kind() == "string" {
            (string_value(*key, source), true)
        } else {
            (node_text(*key, source).to_string(), false)
        };
        let accessor = member.child_by_field_name("object").map(|o| node_text(o, source))?;
        Some(ParamRead {
            accessor: accessor.to_string(),
            key: key_text,
            key_is_literal,
            default: arguments.get(1).map(|d| JsValue::from_node(*d, source)),
            location: location_of(call, self.path()),
        })
    }
}

/// Lazy pre-order walk producing findings
pub struct Findings<'s> {
    scan: &'s FileScan<'s>,
    stack: Vec<Node<'s>>,
}

impl Iterator for Findings<'_> {
    type Item = Finding;

    fn next(&mut self) -> Option<Finding> {
        while let Some(node) = self.stack.pop() {
            for i in (0..node.named_child_count()).rev() {
                if let Some(child) = node.named_child(i) {
                    self.stack.push(child);
                }
            }
            if let Some(finding) = self.scan.finding_at(node) {
                return Some(finding);
            }
        }
        None
    }
}

/// Owned scan result of one file
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub source: String,
    pub hash: ContentHash,
    pub findings: Vec<Finding>,
    pub plugins: Vec<PluginUse>,
    pub orphan_pragmas: Vec<PragmaSite>,
    /// Both JavaScript and React SDK imports present
    pub mixed_variants: bool,
}

fn is_field(parent: Node<'_>, field: &str, child: Node<'_>) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|node| node.id() == child.id())
}

fn is_accessor_field(name: &str) -> bool {
    matches!(name, "config" | "experiment" | "layer" | "dynamicConfig")
}

fn enclosing_scope(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if matches!(parent.kind(), "statement_block" | "program" | "class_body") {
            return parent;
        }
        current = parent;
    }
    current
}

/// Whether `node` opens a scope that declares one of `names` itself
fn shadows(node: Node<'_>, names: &[&str], source: &str) -> bool {
    let binds = |n: Node<'_>| pattern_binds(n, names, source);
    match node.kind() {
        "function_declaration"
        | "function_expression"
        | "function"
        | "generator_function"
        | "generator_function_declaration"
        | "arrow_function"
        | "method_definition" => {
            node.child_by_field_name("parameter").is_some_and(binds)
                || node
                    .child_by_field_name("parameters")
                    .is_some_and(|params| named_children(params).into_iter().any(binds))
        }
        "statement_block" | "class_body" => named_children(node).into_iter().any(|statement| {
            match statement.kind() {
                "lexical_declaration" | "variable_declaration" => binds(statement),
                "function_declaration" | "class_declaration" => statement
                    .child_by_field_name("name")
                    .is_some_and(|name| names.iter().any(|n| *n == node_text(name, source))),
                _ => false,
            }
        }),
        "for_statement" => node.child_by_field_name("initializer").is_some_and(binds),
        "for_in_statement" => node.child_by_field_name("left").is_some_and(binds),
        "catch_clause" => node.child_by_field_name("parameter").is_some_and(binds),
        _ => false,
    }
}

/// Whether a declaration or binding pattern introduces one of `names`
fn pattern_binds(node: Node<'_>, names: &[&str], source: &str) -> bool {
    let field = |name: &str| {
        node.child_by_field_name(name)
            .is_some_and(|child| pattern_binds(child, names, source))
    };
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            names.iter().any(|n| *n == node_text(node, source))
        }
        "lexical_declaration" | "variable_declaration" | "object_pattern" | "array_pattern"
        | "rest_pattern" => named_children(node)
            .into_iter()
            .any(|child| pattern_binds(child, names, source)),
        "variable_declarator" => field("name"),
        "required_parameter" | "optional_parameter" => field("pattern"),
        "assignment_pattern" | "object_assignment_pattern" => field("left"),
        "pair_pattern" => field("value"),
        _ => false,
    }
}

/// Leading whitespace of the line containing `offset`
fn line_indent(source: &str, offset: usize) -> String {
    let line_start = source[..offset.min(source.len())].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::default_parsers;
    use pretty_assertions::assert_eq;

    fn scan(path: &str, source: &str) -> ScannedFile {
        let scanner = Scanner::new(Arc::new(Catalog::new().unwrap()));
        scanner
            .scan_source(&default_parsers(), Path::new(path), source)
            .unwrap()
    }

    fn kinds(file: &ScannedFile) -> Vec<(FindingKind, &str)> {
        file.findings
            .iter()
            .map(|f| (f.kind, f.source_name.as_str()))
            .collect()
    }

    #[test]
    fn react_component_findings() {
        let file = scan(
            "src/Admin.tsx",
            "import { useGate, useConfig } from 'statsig-react';\n\
             export function Admin() {\n\
               const { value } = useGate('admin_panel_access');\n\
               const { config } = useConfig('banner');\n\
               return <h1>{config.get('title', 'Welcome')}</h1>;\n\
             }\n",
        );
        assert_eq!(
            kinds(&file),
            vec![
                (FindingKind::Import, "statsig-react"),
                (FindingKind::GateCheck, "admin_panel_access"),
                (FindingKind::ConfigFetch, "banner"),
            ]
        );
        assert!(file.findings.iter().all(|f| f.sdk_variant == SdkVariant::React));
        assert!(file.findings.iter().all(|f| f.confidence == Confidence::High));

        let reads = file.findings[2].param_reads();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].key, "title");
        assert_eq!(reads[0].default, Some(JsValue::string("Welcome")));
    }

    #[test]
    fn direct_chain_and_bound_variable_reads() {
        let file = scan(
            "src/checkout.js",
            "import Statsig from 'statsig-js';\n\
             const title = Statsig.getConfig('copy').get('title', 'Default');\n\
             function render() {\n\
               const cfg = Statsig.getConfig('limits');\n\
               return [cfg.get('max', 10), cfg.getValue('enabled', false)];\n\
             }\n",
        );
        let copy = &file.findings[1];
        assert_eq!(copy.kind, FindingKind::ConfigFetch);
        assert_eq!(copy.param_reads()[0].key, "title");

        let limits = &file.findings[2];
        let keys: Vec<&str> = limits.param_reads().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["max", "enabled"]);
    }

    #[test]
    fn reads_stop_at_nested_rebinding_of_the_name() {
        let file = scan(
            "src/banner.js",
            "import Statsig from 'statsig-js';\n\
             const config = Statsig.getConfig('banner');\n\
             const title = config.get('title', 'hi');\n\
             function f() {\n\
               const config = Statsig.getExperiment('checkout_test');\n\
               return config.get('discount', 0);\n\
             }\n\
             const g = (config) => config.get('size', 1);\n",
        );
        let banner = file
            .findings
            .iter()
            .find(|f| f.source_name == "banner")
            .unwrap();
        let keys: Vec<&str> = banner.param_reads().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["title"]);

        let experiment = file
            .findings
            .iter()
            .find(|f| f.source_name == "checkout_test")
            .unwrap();
        let keys: Vec<&str> = experiment.param_reads().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["discount"]);
    }

    #[test]
    fn generic_methods_need_a_bound_receiver() {
        let file = scan(
            "src/util.ts",
            "const c = settings.getConfig('theme');\nconst g = other.checkGate('beta');\n",
        );
        assert_eq!(kinds(&file), vec![(FindingKind::GateCheck, "beta")]);
        assert_eq!(file.findings[0].confidence, Confidence::Low);
        assert_eq!(file.findings[0].sdk_variant, SdkVariant::Plain);
    }

    #[test]
    fn mixed_imports_lower_confidence() {
        let file = scan(
            "src/mixed.tsx",
            "import { StatsigClient } from '@statsig/js-client';\n\
             import { useFeatureGate } from '@statsig/react-bindings';\n\
             const gate = useFeatureGate('beta');\n",
        );
        assert!(file.mixed_variants);
        assert!(file
            .findings
            .iter()
            .all(|f| f.confidence == Confidence::Low && f.sdk_variant == SdkVariant::JavaScript));
    }

    #[test]
    fn pragma_attaches_to_next_experiment() {
        let file = scan(
            "src/checkout.js",
            "import Statsig from 'statsig-js';\n\
             // flagshift:related express_checkout\n\
             const exp = Statsig.getExperiment('checkout_flow_test');\n\
             const on = Statsig.checkGate('express_checkout');\n",
        );
        let exp = &file.findings[1];
        assert_eq!(exp.kind, FindingKind::ExperimentFetch);
        assert_eq!(exp.call().unwrap().related_names, vec!["express_checkout"]);
        assert!(file.orphan_pragmas.is_empty());
    }

    #[test]
    fn orphan_pragmas_are_kept() {
        let file = scan("src/a.js", "// flagshift:related lonely_gate\nconst x = 1;\n");
        assert_eq!(file.orphan_pragmas.len(), 1);
        assert_eq!(file.orphan_pragmas[0].names, vec!["lonely_gate"]);
    }

    #[test]
    fn statement_level_initialize_spans_statement() {
        let source = "import Statsig from 'statsig-js';\n\
                      async function boot() {\n\
                      \x20 await Statsig.initialize('client-key', { userID: 'u1' }, \
                      { environment: { tier: 'prod' } });\n\
                      }\n";
        let file = scan("src/boot.js", source);
        let init = &file.findings[1];
        assert_eq!(init.kind, FindingKind::ProviderInit);
        assert_eq!(init.source_name, "Statsig.initialize");
        let FindingDetail::Provider(provider) = &init.detail else {
            panic!("expected provider detail");
        };
        assert!(provider.statement_level);
        assert!(provider.awaited);
        assert_eq!(provider.indent, "  ");
        assert!(source[init.location.span.clone()].ends_with(");"));
        assert_eq!(
            provider.user.as_ref().and_then(|u| u.as_object()).map(|m| m.len()),
            Some(1)
        );
    }

    #[test]
    fn server_calls_and_events() {
        let file = scan(
            "src/server.ts",
            "import statsig from 'statsig-node';\n\
             export async function handler(user) {\n\
               const on = await statsig.checkGate(user, 'beta_access');\n\
               statsig.logEvent(user, 'purchase', 12, { sku: 'a' });\n\
             }\n",
        );
        let gate = &file.findings[1];
        assert_eq!(gate.sdk_variant, SdkVariant::Plain);
        assert_eq!(gate.call().unwrap().server_user.as_deref(), Some("user"));
        let event = &file.findings[2];
        assert_eq!(event.kind, FindingKind::EventLog);
        assert_eq!(event.source_name, "purchase");
    }

    #[test]
    fn findings_iterator_is_restartable() {
        let parsed = default_parsers()
            .parse(
                Path::new("src/a.js"),
                "import S from 'statsig-js';\nS.checkGate('a');\nS.checkGate('b');\n",
            )
            .unwrap();
        let scanner = Scanner::new(Arc::new(Catalog::new().unwrap()));
        let scan = scanner.scan(&parsed);
        let first: Vec<Finding> = scan.findings().collect();
        let second: Vec<Finding> = scan.findings().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(scan.findings().take(1).count(), 1);
    }
}
