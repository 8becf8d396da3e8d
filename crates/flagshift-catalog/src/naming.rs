//! Flag naming policy
//!
//! The React SDK exposes flags through `useFlags()` with camelCased keys, so
//! snake_case and kebab-case Statsig names are converted for that variant.
//! The other SDKs keep flag keys exactly as written.

use crate::model::SdkVariant;

/// Maps a Statsig name to the name used in LaunchDarkly code
///
/// Idempotent: `target_name(target_name(x, v), v) == target_name(x, v)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingPolicy;

impl NamingPolicy {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Target name for `source_name` under `variant`
    #[must_use]
    pub fn target_name(&self, source_name: &str, variant: SdkVariant) -> String {
        match variant {
            SdkVariant::React => camel_case(source_name),
            SdkVariant::JavaScript | SdkVariant::Plain => source_name.to_string(),
        }
    }
}

fn is_separator(c: char) -> bool {
    c == '_' || c == '-' || c.is_whitespace()
}

/// Segment written entirely in capitals (`HTTP`, `V2`)
fn is_shouty(segment: &str) -> bool {
    segment.starts_with(|c: char| c.is_ascii_alphabetic())
        && !segment.chars().any(|c| c.is_ascii_lowercase())
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (index, segment) in name.split(is_separator).filter(|s| !s.is_empty()).enumerate() {
        let segment = if is_shouty(segment) {
            segment.to_ascii_lowercase()
        } else {
            segment.to_string()
        };
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            if index == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }

    if out.is_empty() {
        name.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn react_names_become_camel_case() {
        let policy = NamingPolicy::new();
        assert_eq!(
            policy.target_name("admin_panel_access", SdkVariant::React),
            "adminPanelAccess"
        );
        assert_eq!(policy.target_name("new-checkout", SdkVariant::React), "newCheckout");
        assert_eq!(policy.target_name("ENABLE_V2", SdkVariant::React), "enableV2");
        assert_eq!(policy.target_name("darkMode", SdkVariant::React), "darkMode");
    }

    #[test]
    fn other_variants_keep_names() {
        let policy = NamingPolicy::new();
        assert_eq!(
            policy.target_name("admin_panel_access", SdkVariant::JavaScript),
            "admin_panel_access"
        );
        assert_eq!(policy.target_name("new-checkout", SdkVariant::Plain), "new-checkout");
    }

    #[test]
    fn separator_only_names_are_untouched() {
        let policy = NamingPolicy::new();
        assert_eq!(policy.target_name("__", SdkVariant::React), "__");
        assert_eq!(policy.target_name("", SdkVariant::React), "");
    }

    proptest! {
        #[test]
        fn target_name_is_idempotent(name in "\\PC{0,24}") {
            let policy = NamingPolicy::new();
            for variant in [SdkVariant::JavaScript, SdkVariant::React, SdkVariant::Plain] {
                let once = policy.target_name(&name, variant);
                let twice = policy.target_name(&once, variant);
                prop_assert_eq!(once, twice);
            }
        }

        #[test]
        fn snake_case_idempotent(name in "[a-zA-Z0-9]{1,6}([_-][a-zA-Z0-9]{1,6}){0,4}") {
            let policy = NamingPolicy::new();
            let once = policy.target_name(&name, SdkVariant::React);
            prop_assert!(!once.contains('_') && !once.contains('-'));
            prop_assert_eq!(policy.target_name(&once, SdkVariant::React), once);
        }
    }
}
