//! JavaScript literal values
//!
//! Object/array/scalar literals found at call sites are lifted into
//! [`JsValue`] so fallbacks and user objects can be inspected and re-emitted.
//! Anything that is not a literal is kept verbatim as [`JsValue::Expr`].

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use tree_sitter::Node;

/// A JavaScript value as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    /// Raw numeric literal text
    Number(String),
    String(String),
    Array(Vec<JsValue>),
    /// Insertion-ordered object literal
    Object(IndexMap<String, JsValue>),
    /// Non-literal expression, verbatim source text
    Expr(String),
}

impl JsValue {
    /// Build a JS object from ordered pairs
    #[must_use]
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, JsValue)>) -> Self {
        JsValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[inline]
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        JsValue::String(s.into())
    }

    /// `null` or `undefined`
    #[inline]
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    /// Literal `false`
    #[inline]
    #[must_use]
    pub fn is_false(&self) -> bool {
        matches!(self, JsValue::Bool(false))
    }

    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, JsValue>> {
        match self {
            JsValue::Object(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric literal as f64
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(raw) => raw.replace('_', "").parse().ok(),
            _ => None,
        }
    }

    /// Short name of the value's type, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "null",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Array(_) => "array",
            JsValue::Object(_) => "object",
            JsValue::Expr(_) => "expression",
        }
    }

    /// JSON view; expressions become `"<expr>"` strings
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            JsValue::Undefined | JsValue::Null => Value::Null,
            JsValue::Bool(b) => Value::Bool(*b),
            JsValue::Number(raw) => {
                serde_json::from_str::<serde_json::Number>(&raw.replace('_', ""))
                    .map_or_else(|_| Value::String(raw.clone()), Value::Number)
            }
            JsValue::String(s) => Value::String(s.clone()),
            JsValue::Array(items) => Value::Array(items.iter().map(JsValue::to_json).collect()),
            JsValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            JsValue::Expr(text) => Value::String(format!("<{text}>")),
        }
    }

    /// Render back to JavaScript source (single line)
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            JsValue::Undefined => out.push_str("undefined"),
            JsValue::Null => out.push_str("null"),
            JsValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsValue::Number(raw) | JsValue::Expr(raw) => out.push_str(raw),
            JsValue::String(s) => out.push_str(&quote(s)),
            JsValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out);
                }
                out.push(']');
            }
            JsValue::Object(map) if map.is_empty() => out.push_str("{}"),
            JsValue::Object(map) => {
                out.push_str("{ ");
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&property_key(key));
                    out.push_str(": ");
                    value.render_into(out);
                }
                out.push_str(" }");
            }
        }
    }

    /// Lift a syntax node into a value
    #[must_use]
    pub fn from_node(node: Node<'_>, source: &str) -> JsValue {
        let text = node_text(node, source);
        match node.kind() {
            "true" => JsValue::Bool(true),
            "false" => JsValue::Bool(false),
            "null" => JsValue::Null,
            "undefined" => JsValue::Undefined,
            "identifier" if text == "undefined" => JsValue::Undefined,
            "number" => JsValue::Number(text.to_string()),
            "string" => JsValue::String(string_value(node, source)),
            "template_string" => template_value(node, source)
                .map_or_else(|| JsValue::Expr(text.to_string()), JsValue::String),
            "unary_expression" => unary_value(node, source),
            "parenthesized_expression" | "as_expression" | "satisfies_expression" => {
                named_children(node)
                    .into_iter()
                    .next()
                    .map_or_else(
                        || JsValue::Expr(text.to_string()),
                        |inner| JsValue::from_node(inner, source),
                    )
            }
            "array" => array_value(node, source),
            "object" => object_value(node, source),
            _ => JsValue::Expr(text.to_string()),
        }
    }
}

impl Serialize for JsValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl std::fmt::Display for JsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Source text of a node (empty on invalid UTF-8 boundaries)
#[inline]
#[must_use]
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Named children of a node, comments excluded
#[must_use]
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Value of a string literal node, escapes resolved
#[must_use]
pub fn string_value(node: Node<'_>, source: &str) -> String {
    let raw = node_text(node, source);
    let inner = raw
        .strip_prefix(['"', '\''])
        .and_then(|s| s.strip_suffix(['"', '\'']))
        .unwrap_or(raw);
    unescape(inner)
}

/// Double-quoted JavaScript string literal
#[must_use]
pub fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// Single-quoted JavaScript string literal
#[must_use]
pub fn single_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// True for names usable as bare identifiers / property keys
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn property_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn template_value(node: Node<'_>, source: &str) -> Option<String> {
    if named_children(node)
        .iter()
        .any(|child| child.kind() == "template_substitution")
    {
        return None;
    }
    let raw = node_text(node, source);
    raw.strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .map(unescape)
}

fn unary_value(node: Node<'_>, source: &str) -> JsValue {
    let text = node_text(node, source);
    let operand = node.child_by_field_name("argument");
    let operator = node
        .child_by_field_name("operator")
        .map(|op| node_text(op, source));
    match (operator, operand) {
        (Some("-"), Some(arg)) if arg.kind() == "number" => {
            JsValue::Number(format!("-{}", node_text(arg, source)))
        }
        _ => JsValue::Expr(text.to_string()),
    }
}

fn array_value(node: Node<'_>, source: &str) -> JsValue {
    let mut items = Vec::new();
    for child in named_children(node) {
        if child.kind() == "spread_element" {
            return JsValue::Expr(node_text(node, source).to_string());
        }
        items.push(JsValue::from_node(child, source));
    }
    JsValue::Array(items)
}

fn object_value(node: Node<'_>, source: &str) -> JsValue {
    let mut map = IndexMap::new();
    for child in named_children(node) {
        match child.kind() {
            "pair" => {
                let key = child.child_by_field_name("key");
                let value = child.child_by_field_name("value");
                let (Some(key), Some(value)) = (key, value) else {
                    return JsValue::Expr(node_text(node, source).to_string());
                };
                let key = match key.kind() {
                    "property_identifier" | "number" => node_text(key, source).to_string(),
                    "string" => string_value(key, source),
                    _ => return JsValue::Expr(node_text(node, source).to_string()),
                };
                map.insert(key, JsValue::from_node(value, source));
            }
            "shorthand_property_identifier" => {
                let name = node_text(child, source).to_string();
                map.insert(name.clone(), JsValue::Expr(name));
            }
            _ => return JsValue::Expr(node_text(node, source).to_string()),
        }
    }
    JsValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(expr: &str) -> JsValue {
        let source = format!("x = {expr};");
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .unwrap();
        let tree = parser.parse(&source, None).unwrap();
        let root = tree.root_node();
        let statement = root.named_child(0).unwrap();
        let assignment = statement.named_child(0).unwrap();
        let right = assignment.child_by_field_name("right").unwrap();
        JsValue::from_node(right, &source)
    }

    #[test]
    fn scalars_are_lifted() {
        assert_eq!(parse_expr("true"), JsValue::Bool(true));
        assert_eq!(parse_expr("null"), JsValue::Null);
        assert_eq!(parse_expr("undefined"), JsValue::Undefined);
        assert_eq!(parse_expr("'it\\'s'"), JsValue::string("it's"));
        assert_eq!(parse_expr("-3"), JsValue::Number("-3".into()));
        assert_eq!(parse_expr("`plain`"), JsValue::string("plain"));
    }

    #[test]
    fn objects_keep_key_order() {
        let value = parse_expr("{ title: 'Default', \"max-items\": 10, nested: { on: false } }");
        let map = value.as_object().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "max-items", "nested"]);
        assert_eq!(
            value.render(),
            "{ title: \"Default\", \"max-items\": 10, nested: { on: false } }"
        );
    }

    #[test]
    fn non_literals_stay_verbatim() {
        assert_eq!(parse_expr("user.id"), JsValue::Expr("user.id".into()));
        assert_eq!(parse_expr("{ ...base }"), JsValue::Expr("{ ...base }".into()));
        assert_eq!(parse_expr("`a${b}`"), JsValue::Expr("`a${b}`".into()));
    }

    #[test]
    fn json_view_of_numbers_and_expressions() {
        let value = JsValue::object([
            ("count", JsValue::Number("10".into())),
            ("who", JsValue::Expr("user.name".into())),
        ]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({ "count": 10, "who": "<user.name>" })
        );
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("adminPanelAccess"));
        assert!(is_identifier("_meta"));
        assert!(!is_identifier("admin-panel"));
        assert!(!is_identifier("1st"));
        assert_eq!(single_quote("it's"), "'it\\'s'");
    }
}
