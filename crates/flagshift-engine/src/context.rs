//! Context transformer
//!
//! Converts a Statsig user object literal into a LaunchDarkly evaluation
//! context. Pure and deterministic: output key order depends only on the
//! input's key order.

use indexmap::IndexMap;

use flagshift_catalog::JsValue;

use crate::error::ContextError;
use crate::warning::{Warning, WarningCode};

const RESERVED: &[&str] = &["kind", "key", "_meta"];

const PASS_THROUGH: &[&str] = &[
    "email",
    "country",
    "locale",
    "appVersion",
    "systemName",
    "systemVersion",
    "browserName",
    "browserVersion",
];

const DROPPED: &[&str] = &["ip", "userAgent"];

/// Transformed context plus the non-fatal notes produced on the way
#[derive(Debug, Clone, PartialEq)]
pub struct TargetContext {
    pub value: JsValue,
    pub warnings: Vec<Warning>,
}

impl TargetContext {
    /// `kind` of the produced context
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.value.as_object()?.get("kind")?.as_str()
    }
}

/// Transform a user shape into a context
///
/// # Errors
///
/// Returns [`ContextError`] when the user is not an object literal, lacks a
/// `userID`, or flattening would overwrite an attribute.
pub fn transform(user: &JsValue) -> Result<TargetContext, ContextError> {
    let JsValue::Object(fields) = user else {
        return Err(ContextError::NotAnObject(user.render()));
    };

    let mut warnings = Vec::new();
    let entities: Vec<(&String, &IndexMap<String, JsValue>)> = fields
        .iter()
        .filter_map(|(name, value)| match value {
            JsValue::Object(entity)
                if entity.contains_key("userID") || entity.contains_key("key") =>
            {
                Some((name, entity))
            }
            _ => None,
        })
        .collect();

    if entities.len() < 2 {
        let value = transform_entity(fields, true, &mut warnings)?;
        return Ok(TargetContext { value, warnings });
    }

    let mut out = IndexMap::new();
    out.insert("kind".to_string(), JsValue::string("multi"));
    for (name, value) in fields {
        if entities.iter().any(|(entity, _)| *entity == name) {
            let JsValue::Object(entity) = value else {
                continue;
            };
            if RESERVED.contains(&name.as_str()) {
                return Err(ContextError::ReservedAttribute(name.clone()));
            }
            let nested = transform_entity(entity, false, &mut warnings)?;
            out.insert(name.clone(), nested);
        } else {
            warnings.push(Warning::new(
                WarningCode::DroppedAttribute,
                format!(
                    "field '{name}' is not a context entity and was dropped from the multi-context"
                ),
            ));
        }
    }
    Ok(TargetContext {
        value: JsValue::Object(out),
        warnings,
    })
}

struct Attributes {
    map: IndexMap<String, JsValue>,
}

impl Attributes {
    fn insert(&mut self, name: &str, value: JsValue) -> Result<(), ContextError> {
        if RESERVED.contains(&name) {
            return Err(ContextError::ReservedAttribute(name.to_string()));
        }
        if self.map.contains_key(name) {
            return Err(ContextError::DuplicateAttribute(name.to_string()));
        }
        self.map.insert(name.to_string(), value);
        Ok(())
    }
}

fn transform_entity(
    fields: &IndexMap<String, JsValue>,
    with_kind: bool,
    warnings: &mut Vec<Warning>,
) -> Result<JsValue, ContextError> {
    let mut head = IndexMap::new();
    if with_kind {
        head.insert("kind".to_string(), JsValue::string("user"));
    }

    let (key_field, key) = match (fields.get("userID"), fields.get("key")) {
        (Some(user_id), _) => ("userID", user_id),
        (None, Some(key)) => ("key", key),
        (None, None) => return Err(ContextError::MissingRequiredField("userID".to_string())),
    };
    head.insert("key".to_string(), key.clone());

    let mut attributes = Attributes { map: IndexMap::new() };
    let mut private: Vec<String> = Vec::new();

    if let Some(custom) = fields.get("custom") {
        match custom {
            JsValue::Object(entries) => {
                for (name, value) in entries {
                    attributes.insert(name, value.clone())?;
                }
            }
            other => {
                warnings.push(Warning::new(
                    WarningCode::UnknownAttribute,
                    "custom is not an object literal and was kept as an attribute",
                ));
                attributes.insert("custom", other.clone())?;
            }
        }
    }

    if let Some(custom_ids) = fields.get("customIDs") {
        match custom_ids {
            JsValue::Object(entries) => {
                for (name, value) in entries {
                    warnings.push(Warning::new(
                        WarningCode::BucketingChange,
                        format!(
                            "customID '{name}' became a context attribute; \
                             it affects bucketing differently"
                        ),
                    ));
                    attributes.insert(name, value.clone())?;
                }
            }
            other => {
                warnings.push(Warning::new(
                    WarningCode::UnknownAttribute,
                    "customIDs is not an object literal and was kept as an attribute",
                ));
                attributes.insert("customIDs", other.clone())?;
            }
        }
    }

    if let Some(private_attributes) = fields.get("privateAttributes") {
        match private_attributes {
            JsValue::Object(entries) => {
                for (name, value) in entries {
                    attributes.insert(name, value.clone())?;
                    if !private.contains(name) {
                        private.push(name.clone());
                    }
                }
            }
            other => {
                warnings.push(Warning::new(
                    WarningCode::UnknownAttribute,
                    "privateAttributes is not an object literal and was kept as an attribute",
                ));
                attributes.insert("privateAttributes", other.clone())?;
            }
        }
    }

    for name in PASS_THROUGH {
        if let Some(value) = fields.get(*name) {
            attributes.insert(name, value.clone())?;
        }
    }

    for (name, value) in fields {
        let name = name.as_str();
        if name == key_field
            || (name == "key" && key_field == "userID")
            || matches!(name, "custom" | "customIDs" | "privateAttributes")
            || PASS_THROUGH.contains(&name)
        {
            if name == "key" && key_field == "userID" {
                warnings.push(Warning::new(
                    WarningCode::DroppedAttribute,
                    "'key' ignored in favour of 'userID'",
                ));
            }
            continue;
        }
        if DROPPED.contains(&name) {
            warnings.push(Warning::new(
                WarningCode::DroppedAttribute,
                format!("'{name}' is not supported in contexts and was dropped"),
            ));
            continue;
        }
        warnings.push(Warning::new(
            WarningCode::UnknownAttribute,
            format!("unknown user field '{name}' passed through as an attribute"),
        ));
        attributes.insert(name, value.clone())?;
    }

    let mut out = head;
    out.extend(attributes.map);
    if !private.is_empty() {
        out.insert(
            "_meta".to_string(),
            JsValue::object([(
                "privateAttributes",
                JsValue::Array(private.into_iter().map(JsValue::String).collect()),
            )]),
        );
    }
    Ok(JsValue::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn num(n: &str) -> JsValue {
        JsValue::Number(n.to_string())
    }

    #[test]
    fn user_with_custom_and_private_attributes() {
        let user = JsValue::object([
            ("userID", JsValue::string("u1")),
            ("custom", JsValue::object([("tier", JsValue::string("gold"))])),
            ("privateAttributes", JsValue::object([("salary", num("1"))])),
        ]);
        let context = transform(&user).unwrap();

        let expected = JsValue::object([
            ("kind", JsValue::string("user")),
            ("key", JsValue::string("u1")),
            ("tier", JsValue::string("gold")),
            ("salary", num("1")),
            (
                "_meta",
                JsValue::object([(
                    "privateAttributes",
                    JsValue::Array(vec![JsValue::string("salary")]),
                )]),
            ),
        ]);
        assert_eq!(context.value, expected);
        assert!(context.warnings.is_empty());
        assert_eq!(context.kind(), Some("user"));
    }

    #[test]
    fn missing_user_id() {
        let user = JsValue::object([("email", JsValue::string("a@b.c"))]);
        assert_eq!(
            transform(&user),
            Err(ContextError::MissingRequiredField("userID".to_string()))
        );
    }

    #[test]
    fn reserved_and_duplicate_attributes() {
        let reserved = JsValue::object([
            ("userID", JsValue::string("u1")),
            ("custom", JsValue::object([("kind", JsValue::string("org"))])),
        ]);
        assert_eq!(
            transform(&reserved),
            Err(ContextError::ReservedAttribute("kind".to_string()))
        );

        let duplicate = JsValue::object([
            ("userID", JsValue::string("u1")),
            ("email", JsValue::string("a@b.c")),
            ("custom", JsValue::object([("email", JsValue::string("x@y.z"))])),
        ]);
        assert_eq!(
            transform(&duplicate),
            Err(ContextError::DuplicateAttribute("email".to_string()))
        );
    }

    #[test]
    fn custom_ids_flattened_and_unknown_fields_warn() {
        let user = JsValue::object([
            ("userID", JsValue::string("u1")),
            ("customIDs", JsValue::object([("stableID", JsValue::string("s1"))])),
            ("ip", JsValue::string("1.2.3.4")),
            ("userAgent", JsValue::Expr("navigator.userAgent".into())),
            ("plan", JsValue::string("pro")),
            ("country", JsValue::string("NZ")),
        ]);
        let context = transform(&user).unwrap();
        assert_eq!(
            context.value.render(),
            "{ kind: \"user\", key: \"u1\", stableID: \"s1\", country: \"NZ\", plan: \"pro\" }"
        );
        assert_eq!(context.warnings.len(), 4);
        assert_eq!(context.warnings[0].code, WarningCode::BucketingChange);
    }

    #[test]
    fn multi_entity_user() {
        let user = JsValue::object([
            ("user", JsValue::object([("userID", JsValue::string("u1"))])),
            (
                "org",
                JsValue::object([
                    ("key", JsValue::string("o1")),
                    ("custom", JsValue::object([("plan", JsValue::string("team"))])),
                ]),
            ),
        ]);
        let context = transform(&user).unwrap();
        assert_eq!(context.kind(), Some("multi"));
        assert_eq!(
            context.value.render(),
            "{ kind: \"multi\", user: { key: \"u1\" }, org: { key: \"o1\", plan: \"team\" } }"
        );
    }

    #[test]
    fn expressions_are_rejected_as_whole_users() {
        assert!(matches!(
            transform(&JsValue::Expr("currentUser".into())),
            Err(ContextError::NotAnObject(_))
        ));
    }

    fn scalar() -> impl Strategy<Value = JsValue> {
        prop_oneof![
            Just(JsValue::Null),
            any::<bool>().prop_map(JsValue::Bool),
            (0u32..1000).prop_map(|n| JsValue::Number(n.to_string())),
            "[a-z]{0,6}".prop_map(JsValue::String),
            "[a-z]{1,6}".prop_map(JsValue::Expr),
        ]
    }

    fn user_shape() -> impl Strategy<Value = JsValue> {
        let field = prop_oneof![
            Just("userID".to_string()),
            Just("key".to_string()),
            Just("email".to_string()),
            Just("ip".to_string()),
            Just("kind".to_string()),
            "[a-z]{1,5}",
        ];
        let value = scalar().prop_recursive(2, 16, 4, |inner| {
            prop::collection::vec(("[a-zA-Z_]{1,5}", inner), 0..4)
                .prop_map(|entries| JsValue::object(entries))
        });
        let named = prop_oneof![
            field,
            Just("custom".to_string()),
            Just("customIDs".to_string()),
            Just("privateAttributes".to_string()),
        ];
        prop::collection::vec((named, value), 0..8).prop_map(|entries| JsValue::object(entries))
    }

    proptest! {
        #[test]
        fn transform_is_deterministic(user in user_shape()) {
            let first = transform(&user);
            let second = transform(&user);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn successful_contexts_carry_kind_and_key(user in user_shape()) {
            if let Ok(context) = transform(&user) {
                let map = context.value.as_object().unwrap();
                prop_assert!(map.contains_key("kind"));
                if context.kind() == Some("user") {
                    prop_assert!(map.contains_key("key"));
                    prop_assert_eq!(map.keys().next().map(String::as_str), Some("kind"));
                }
            }
        }
    }
}
