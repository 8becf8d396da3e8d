//! Experiment classifier
//!
//! Runs once, single-threaded, after every file has been scanned. Experiments
//! and layers are never migrated; gates and configs that belong to them are
//! blocked so both systems never evaluate the same decision.
//!
//! Relatedness comes from comment pragmas when an experiment has any, and from
//! the parameter keys read off the experiment otherwise. Anything that cannot
//! be decided is marked ambiguous rather than guessed.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use flagshift_catalog::{Finding, FindingId, FindingKind, Location, PackageRole};

use crate::warning::{Warning, WarningCode};

/// Everything known about one experiment or layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentBinding {
    pub name: String,
    pub kind: FindingKind,
    /// Names declared related by pragmas
    pub related: Vec<String>,
    /// Literal parameter keys read from the experiment
    pub param_names: Vec<String>,
    /// Fetch sites of the experiment itself
    pub sites: Vec<FindingId>,
    /// Gate and config findings it blocks
    pub blocked: Vec<FindingId>,
}

impl ExperimentBinding {
    fn new(name: &str, kind: FindingKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            related: Vec::new(),
            param_names: Vec::new(),
            sites: Vec::new(),
            blocked: Vec::new(),
        }
    }

    /// Does this experiment claim a gate or config name
    #[must_use]
    pub fn relates_to(&self, name: &str) -> bool {
        if self.related.is_empty() {
            self.param_names.iter().any(|p| p == name)
        } else {
            self.related.iter().any(|r| r == name)
        }
    }
}

/// Classifier output
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub bindings: Vec<ExperimentBinding>,
    pub warnings: Vec<Warning>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Annotate findings with block status and ambiguity
///
/// Findings are addressed by their index in `findings`.
pub fn classify(findings: &mut [Finding]) -> Classification {
    let mut bindings: IndexMap<String, ExperimentBinding> = IndexMap::new();
    let mut dynamic_experiments: Vec<Location> = Vec::new();

    for (index, finding) in findings.iter_mut().enumerate() {
        if !finding.kind.is_experiment_like() {
            continue;
        }
        let name = finding.source_name.clone();
        finding.block(&name);
        if !finding.name_is_literal {
            dynamic_experiments.push(finding.location.clone());
            continue;
        }

        let binding = bindings
            .entry(name.clone())
            .or_insert_with(|| ExperimentBinding::new(&name, finding.kind));
        binding.sites.push(FindingId(index));
        if let Some(call) = finding.call() {
            for related in &call.related_names {
                push_unique(&mut binding.related, related);
            }
            for read in call.param_reads.iter().filter(|r| r.key_is_literal) {
                push_unique(&mut binding.param_names, &read.key);
            }
        }
    }

    let mut warnings = Vec::new();
    let mut flag_names: HashSet<String> = HashSet::new();

    for (index, finding) in findings.iter_mut().enumerate() {
        if !finding.kind.is_flag() {
            continue;
        }
        if finding.name_is_literal {
            flag_names.insert(finding.source_name.clone());
        }

        let mut claimed = false;
        for binding in bindings.values_mut() {
            if finding.name_is_literal && binding.relates_to(&finding.source_name) {
                finding.block(&binding.name);
                binding.blocked.push(FindingId(index));
                claimed = true;
            }
        }
        if claimed {
            continue;
        }

        let ambiguity = if finding.name_is_literal && bindings.contains_key(&finding.source_name) {
            Some(format!(
                "'{}' shares its name with an experiment but is not declared related to it",
                finding.source_name
            ))
        } else {
            dynamic_experiments.first().map(|location| {
                format!("the project fetches an experiment by a dynamic name at {location}")
            })
        };

        if let Some(reason) = ambiguity {
            warnings.push(
                Warning::new(
                    WarningCode::AmbiguousRelation,
                    format!("{} '{}': {reason}", finding.kind, finding.source_name),
                )
                .at(&finding.location),
            );
            finding.ambiguity = Some(reason);
        }
    }

    for binding in bindings.values() {
        for name in &binding.related {
            if !flag_names.contains(name) {
                warnings.push(Warning::new(
                    WarningCode::UnmatchedPragmaName,
                    format!(
                        "'{name}' is declared related to {} '{}' but no gate or config uses it",
                        binding.kind, binding.name
                    ),
                ));
            }
        }
    }

    block_imports(findings);

    tracing::info!(
        "classified {} findings: {} experiments, {} blocked",
        findings.len(),
        bindings.len(),
        findings.iter().filter(|f| f.blocked).count()
    );

    Classification {
        bindings: bindings.into_values().collect(),
        warnings,
    }
}

/// Block SDK imports whose every call site in the file is blocked
fn block_imports(findings: &mut [Finding]) {
    let mut updates: Vec<(usize, Vec<String>)> = Vec::new();

    for (index, finding) in findings.iter().enumerate() {
        let Some(import) = finding.import() else {
            continue;
        };
        if !matches!(import.role, PackageRole::Sdk(_)) {
            continue;
        }
        let sites: Vec<&Finding> = call_sites(findings, &finding.location.file).collect();
        if sites.is_empty() || !sites.iter().all(|site| site.blocked) {
            continue;
        }
        let mut reasons = Vec::new();
        for site in sites {
            for reason in &site.block_reasons {
                push_unique(&mut reasons, reason);
            }
        }
        updates.push((index, reasons));
    }

    for (index, reasons) in updates {
        for reason in reasons {
            findings[index].block(&reason);
        }
    }
}

/// Non-import findings of a file
pub fn call_sites<'a>(
    findings: &'a [Finding],
    file: &'a Path,
) -> impl Iterator<Item = &'a Finding> + 'a {
    findings
        .iter()
        .filter(move |f| f.kind != FindingKind::Import && f.location.file == file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagshift_catalog::{
        CallDetail, CallStyle, FindingDetail, ImportDetail, NameArg, ParamRead, SdkVariant,
    };
    use pretty_assertions::assert_eq;

    fn loc(line: usize) -> Location {
        Location::new("src/checkout.js", line * 100..line * 100 + 10, line, 1)
    }

    fn call(kind: FindingKind, name: &str, line: usize) -> Finding {
        Finding::new(kind, NameArg::literal(name), loc(line), SdkVariant::JavaScript).with_detail(
            FindingDetail::Call(CallDetail::new(CallStyle::Method {
                receiver: "Statsig".into(),
                method: "m".into(),
                namespace_receiver: true,
            })),
        )
    }

    fn experiment(name: &str, line: usize, related: &[&str], params: &[&str]) -> Finding {
        let mut detail = CallDetail::new(CallStyle::Method {
            receiver: "Statsig".into(),
            method: "getExperiment".into(),
            namespace_receiver: true,
        });
        detail.related_names = related.iter().map(ToString::to_string).collect();
        detail.param_reads = params
            .iter()
            .map(|key| ParamRead {
                accessor: "exp".into(),
                key: (*key).to_string(),
                key_is_literal: true,
                default: None,
                location: loc(line),
            })
            .collect();
        Finding::new(
            FindingKind::ExperimentFetch,
            NameArg::literal(name),
            loc(line),
            SdkVariant::JavaScript,
        )
        .with_detail(FindingDetail::Call(detail))
    }

    fn import() -> Finding {
        Finding::new(
            FindingKind::Import,
            NameArg::literal("statsig-js"),
            loc(0),
            SdkVariant::JavaScript,
        )
        .with_detail(FindingDetail::Import(ImportDetail {
                package: "statsig-js".into(),
                role: PackageRole::Sdk(SdkVariant::JavaScript),
                locals: vec!["Statsig".into()],
                commonjs: false,
                semicolon: true,
            }))
    }

    #[test]
    fn pragma_related_gate_is_blocked() {
        let mut findings = vec![
            import(),
            experiment("checkout_flow_test", 2, &["express_checkout"], &[]),
            call(FindingKind::GateCheck, "express_checkout", 3),
            call(FindingKind::GateCheck, "dark_mode", 4),
        ];
        let result = classify(&mut findings);

        assert!(findings[1].blocked);
        assert_eq!(findings[2].block_reasons, vec!["checkout_flow_test"]);
        assert!(!findings[3].blocked);
        assert!(!findings[0].blocked);
        assert_eq!(result.bindings.len(), 1);
        assert_eq!(result.bindings[0].blocked, vec![FindingId(2)]);
    }

    #[test]
    fn param_keys_relate_without_pragmas() {
        let mut findings = vec![
            experiment("pricing_test", 1, &[], &["show_discount"]),
            call(FindingKind::ConfigFetch, "show_discount", 2),
        ];
        classify(&mut findings);
        assert_eq!(findings[1].block_reasons, vec!["pricing_test"]);
    }

    #[test]
    fn pragmas_override_param_keys() {
        let mut findings = vec![
            experiment("pricing_test", 1, &["banner"], &["show_discount"]),
            call(FindingKind::ConfigFetch, "show_discount", 2),
            call(FindingKind::ConfigFetch, "banner", 3),
        ];
        classify(&mut findings);
        assert!(!findings[1].blocked);
        assert!(findings[2].blocked);
    }

    #[test]
    fn name_claimed_by_several_experiments() {
        let mut findings = vec![
            experiment("a_test", 1, &["shared_gate"], &[]),
            experiment("b_test", 2, &[], &["shared_gate"]),
            call(FindingKind::GateCheck, "shared_gate", 3),
        ];
        classify(&mut findings);
        assert_eq!(findings[2].block_reasons, vec!["a_test", "b_test"]);
    }

    #[test]
    fn same_name_as_experiment_is_ambiguous() {
        let mut findings = vec![
            experiment("onboarding", 1, &["other"], &[]),
            call(FindingKind::GateCheck, "onboarding", 2),
        ];
        let result = classify(&mut findings);
        assert!(!findings[1].blocked);
        assert!(findings[1].ambiguity.is_some());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::AmbiguousRelation));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::UnmatchedPragmaName && w.message.contains("'other'")));
    }

    #[test]
    fn dynamic_experiment_makes_flags_ambiguous() {
        let mut dynamic = experiment("x", 1, &[], &[]);
        dynamic.source_name = "`exp_${id}`".into();
        dynamic.name_is_literal = false;
        let mut findings = vec![dynamic, call(FindingKind::GateCheck, "beta", 2)];
        classify(&mut findings);
        assert!(findings[0].blocked);
        assert!(findings[1].ambiguity.as_deref().unwrap().contains("dynamic name"));
    }

    #[test]
    fn import_with_only_blocked_sites_is_blocked() {
        let mut findings = vec![
            import(),
            experiment("checkout_flow_test", 2, &["express_checkout"], &[]),
            call(FindingKind::GateCheck, "express_checkout", 3),
        ];
        classify(&mut findings);
        assert!(findings[0].blocked);
        assert_eq!(findings[0].block_reasons, vec!["checkout_flow_test"]);
    }
}
