//! Per-file binding table
//!
//! Built by a pre-pass over the whole tree before findings are produced. It
//! records which local names refer to Statsig imports or Statsig client
//! instances, the comment pragmas and the observability plugin uses.

use std::collections::HashMap;

use flagshift_catalog::literal::{named_children, node_text};
use flagshift_catalog::{
    Catalog, HookShape, JsValue, Location, MatchShape, PackageRole, PluginKind, SdkVariant,
};
use tree_sitter::Node;

/// What a local name is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Default or namespace import of a Statsig SDK
    Namespace(SdkVariant),
    /// Named import of a Statsig SDK export
    Named { imported: String, variant: SdkVariant },
    /// Instance created by a client constructor or client hook
    Client(Option<SdkVariant>),
    /// Import of an observability package
    Plugin(PluginKind),
}

/// Resolved receiver of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub variant: Option<SdkVariant>,
    /// Receiver is an imported namespace rather than a client instance
    pub namespace: bool,
}

/// Comment pragma with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaSite {
    pub names: Vec<String>,
    pub location: Location,
}

/// Observability plugin construction or runner call
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PluginUse {
    pub kind: PluginKind,
    pub options: Option<JsValue>,
    pub location: Location,
}

/// Client variable awaiting resolution of its constructor binding
struct PendingClient {
    local: String,
    /// Class or hook name the value came from
    origin: String,
}

/// Binding table of one file
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<String, Binding>,
    /// SDK variants imported by the file, in discovery order
    variants: Vec<SdkVariant>,
    pragmas: Vec<PragmaSite>,
    plugins: Vec<PluginUse>,
    /// Start lines of experiment and layer fetches
    experiment_lines: Vec<usize>,
}

impl BindingTable {
    /// Walk the tree once and collect every binding
    #[must_use]
    pub fn build(root: Node<'_>, source: &str, catalog: &Catalog, file: &std::path::Path) -> Self {
        let mut table = Self::default();
        let mut pending = Vec::new();

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "comment" => {
                    if let Some(pragma) = catalog.pragma(node_text(node, source)) {
                        table.pragmas.push(PragmaSite {
                            names: pragma.names,
                            location: location_of(node, file),
                        });
                    }
                }
                "variable_declarator" => collect_client(node, source, catalog, &mut pending),
                _ => {}
            }

            if let Some(plugin) = catalog.match_plugin(node, source) {
                table.plugins.push(PluginUse {
                    kind: plugin.kind,
                    options: plugin.options,
                    location: location_of(node, file),
                });
            }

            if let Some(found) = catalog.match_node(node, source) {
                match found.shape {
                    MatchShape::Import(import) => table.add_import(&import.role, &import.bindings),
                    _ if found.kind.is_experiment_like() => table.experiment_lines.push(found.line),
                    _ => {}
                }
            }

            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }

        for client in pending {
            let variant = table.variant_of(&client.origin);
            table
                .bindings
                .entry(client.local)
                .or_insert(Binding::Client(variant));
        }

        table.experiment_lines.sort_unstable();
        table.experiment_lines.dedup();
        table
    }

    fn add_import(&mut self, role: &PackageRole, bindings: &[flagshift_catalog::ImportBinding]) {
        match *role {
            PackageRole::Sdk(variant) => {
                if !self.variants.contains(&variant) {
                    self.variants.push(variant);
                }
                for binding in bindings {
                    let bound = match &binding.imported {
                        None => Binding::Namespace(variant),
                        Some(imported) => Binding::Named {
                            imported: imported.clone(),
                            variant,
                        },
                    };
                    self.bindings.insert(binding.local.clone(), bound);
                }
            }
            PackageRole::Observability(kind) => {
                for binding in bindings {
                    self.bindings.insert(binding.local.clone(), Binding::Plugin(kind));
                }
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, local: &str) -> Option<&Binding> {
        self.bindings.get(local)
    }

    /// Variant of an SDK import binding
    #[must_use]
    pub fn variant_of(&self, local: &str) -> Option<SdkVariant> {
        match self.bindings.get(local)? {
            Binding::Namespace(variant) | Binding::Named { variant, .. } => Some(*variant),
            Binding::Client(variant) => *variant,
            Binding::Plugin(_) => None,
        }
    }

    /// True when `local` is an SDK import or a client instance
    #[must_use]
    pub fn is_sdk_bound(&self, local: &str) -> bool {
        matches!(
            self.bindings.get(local),
            Some(Binding::Namespace(_) | Binding::Named { .. } | Binding::Client(_))
        )
    }

    /// Resolve a plain-identifier receiver
    #[must_use]
    pub fn resolve_receiver(&self, receiver: &str) -> Option<Resolution> {
        match self.bindings.get(receiver)? {
            Binding::Namespace(variant) | Binding::Named { variant, .. } => Some(Resolution {
                variant: Some(*variant),
                namespace: true,
            }),
            Binding::Client(variant) => Some(Resolution {
                variant: *variant,
                namespace: false,
            }),
            Binding::Plugin(_) => None,
        }
    }

    /// The file imports both the browser JS client and the React bindings
    #[must_use]
    pub fn mixed(&self) -> bool {
        self.variants.contains(&SdkVariant::JavaScript)
            && self.variants.contains(&SdkVariant::React)
    }

    /// Variant used for sites without a resolvable binding
    #[must_use]
    pub fn file_variant(&self) -> SdkVariant {
        if self.mixed() {
            return SdkVariant::JavaScript;
        }
        self.variants.first().copied().unwrap_or(SdkVariant::Plain)
    }

    #[inline]
    #[must_use]
    pub fn pragmas(&self) -> &[PragmaSite] {
        &self.pragmas
    }

    #[inline]
    #[must_use]
    pub fn plugins(&self) -> &[PluginUse] {
        &self.plugins
    }

    /// Line of the first experiment or layer fetch within `window` lines after `line`
    #[must_use]
    pub fn next_experiment_line(&self, line: usize, window: usize) -> Option<usize> {
        self.experiment_lines
            .iter()
            .copied()
            .find(|&candidate| candidate >= line && candidate <= line + window)
    }
}

/// Record `x = new StatsigClient(...)` / `{ client } = useStatsigClient()` style declarators
fn collect_client(
    declarator: Node<'_>,
    source: &str,
    catalog: &Catalog,
    pending: &mut Vec<PendingClient>,
) {
    let (Some(name), Some(value)) = (
        declarator.child_by_field_name("name"),
        declarator.child_by_field_name("value"),
    ) else {
        return;
    };
    let value = unwrap_expression(value);

    let (origin, via_client_field) = match value.kind() {
        "new_expression" => {
            let Some(constructor) = value.child_by_field_name("constructor") else {
                return;
            };
            let class = node_text(constructor, source);
            if catalog.client_class(class).is_none() {
                return;
            }
            (class.to_string(), false)
        }
        "call_expression" => match client_hook(value, source, catalog) {
            Some(hook) => (hook, true),
            None => return,
        },
        "member_expression" => {
            let object = value.child_by_field_name("object").map(unwrap_expression);
            let property = value.child_by_field_name("property");
            match (object, property) {
                (Some(object), Some(property))
                    if object.kind() == "call_expression"
                        && node_text(property, source) == "client" =>
                {
                    match client_hook(object, source, catalog) {
                        Some(hook) => (hook, false),
                        None => return,
                    }
                }
                _ => return,
            }
        }
        _ => return,
    };

    match name.kind() {
        "identifier" if !via_client_field => pending.push(PendingClient {
            local: node_text(name, source).to_string(),
            origin,
        }),
        "object_pattern" if via_client_field => {
            for property in named_children(name) {
                let local = match property.kind() {
                    "shorthand_property_identifier_pattern"
                        if node_text(property, source) == "client" =>
                    {
                        Some(node_text(property, source))
                    }
                    "pair_pattern" => {
                        let key = property
                            .child_by_field_name("key")
                            .map(|k| node_text(k, source));
                        let value = property.child_by_field_name("value");
                        match (key, value) {
                            (Some("client"), Some(value)) if value.kind() == "identifier" => {
                                Some(node_text(value, source))
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some(local) = local {
                    pending.push(PendingClient {
                        local: local.to_string(),
                        origin: origin.clone(),
                    });
                }
            }
        }
        _ => {}
    }
}

/// Hook returning `{ client }`
fn client_hook(call: Node<'_>, source: &str, catalog: &Catalog) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "identifier" {
        return None;
    }
    let name = node_text(function, source);
    let hook = catalog.hook(name)?;
    (hook.shape == HookShape::ClientField).then(|| name.to_string())
}

/// Strip `await`, parentheses and type assertions
#[must_use]
pub fn unwrap_expression(mut node: Node<'_>) -> Node<'_> {
    loop {
        match node.kind() {
            "await_expression"
            | "parenthesized_expression"
            | "as_expression"
            | "non_null_expression" => match named_children(node).into_iter().next() {
                Some(inner) => node = inner,
                None => return node,
            },
            _ => return node,
        }
    }
}

/// Location of a node (1-based line and column)
#[must_use]
pub fn location_of(node: Node<'_>, file: &std::path::Path) -> Location {
    let start = node.start_position();
    Location::new(file, node.byte_range(), start.row + 1, start.column + 1)
}
