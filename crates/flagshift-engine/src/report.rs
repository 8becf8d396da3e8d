//! Report builder
//!
//! Folds findings, outcomes and warnings into a [`MigrationReport`] and
//! renders the `migration-summary` artifact. Every item is accounted for
//! exactly once: `total == migrated + blocked + failed`.

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use flagshift_catalog::{Finding, FindingId, FindingKind, JsValue, Location, SdkVariant};

use crate::classifier::ExperimentBinding;
use crate::rewrite::{FindingOutcome, MigratedItem, Outcome};
use crate::warning::{Warning, WarningCode};

/// A file that failed as a whole (parse error, timeout)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Identity of a report item; file failures have no kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ItemKey {
    pub kind: Option<FindingKind>,
    pub source_name: String,
    pub location: Location,
}

impl ItemKey {
    fn of(finding: &Finding) -> Self {
        Self {
            kind: Some(finding.kind),
            source_name: finding.source_name.clone(),
            location: finding.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigratedEntry {
    pub key: ItemKey,
    pub variant: SdkVariant,
    pub item: MigratedItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedEntry {
    pub key: ItemKey,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub key: ItemKey,
    pub reason: String,
}

/// Everything a pass did, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: Vec<MigratedEntry>,
    pub blocked: Vec<BlockedEntry>,
    pub failed: Vec<FailedEntry>,
    pub experiments: Vec<ExperimentBinding>,
    pub warnings: Vec<Warning>,
    pub next_steps: Vec<String>,
}

/// Build the report of a pass
///
/// Findings without an outcome count as blocked when the classifier blocked
/// them and as failed otherwise.
#[must_use]
pub fn build(
    findings: &[Finding],
    outcomes: &[FindingOutcome],
    file_failures: &[FileFailure],
    bindings: &[ExperimentBinding],
    warnings: Vec<Warning>,
) -> MigrationReport {
    let by_id: HashMap<FindingId, &FindingOutcome> = outcomes.iter().map(|o| (o.id, o)).collect();
    let mut report = MigrationReport {
        total: findings.len() + file_failures.len(),
        experiments: bindings.to_vec(),
        warnings,
        ..MigrationReport::default()
    };

    for (index, finding) in findings.iter().enumerate() {
        let key = ItemKey::of(finding);
        match by_id.get(&FindingId(index)).map(|o| &o.outcome) {
            Some(Outcome::Migrated(item)) => report.migrated.push(MigratedEntry {
                key,
                variant: finding.sdk_variant,
                item: item.clone(),
            }),
            Some(Outcome::Blocked { reasons }) => report.blocked.push(BlockedEntry {
                key,
                reasons: reasons.clone(),
            }),
            Some(Outcome::Failed { reason }) => report.failed.push(FailedEntry {
                key,
                reason: reason.clone(),
            }),
            None if finding.blocked => report.blocked.push(BlockedEntry {
                key,
                reasons: finding.block_reasons.clone(),
            }),
            None => report.failed.push(FailedEntry {
                key,
                reason: "not rewritten".to_string(),
            }),
        }
    }

    for failure in file_failures {
        report.failed.push(FailedEntry {
            key: ItemKey {
                kind: None,
                source_name: failure.path.display().to_string(),
                location: Location::new(failure.path.clone(), 0..0, 1, 1),
            },
            reason: failure.reason.clone(),
        });
    }

    report.next_steps = next_steps(&report);
    tracing::info!(
        "report: {} items, {} migrated, {} blocked, {} failed",
        report.total,
        report.migrated.len(),
        report.blocked.len(),
        report.failed.len()
    );
    report
}

fn next_steps(report: &MigrationReport) -> Vec<String> {
    let mut steps = Vec::new();
    let migrated = |kind: FindingKind| {
        report
            .migrated
            .iter()
            .filter(move |e| e.key.kind == Some(kind))
    };
    let warned = |code: WarningCode| report.warnings.iter().filter(move |w| w.code == code).count();

    if migrated(FindingKind::ProviderInit).next().is_some() {
        steps.push(
            "Replace the credential placeholder in rewritten initializers \
             with your LaunchDarkly client-side ID or SDK key"
                .to_string(),
        );
    }

    let mut flags: Vec<&str> = migrated(FindingKind::GateCheck)
        .chain(migrated(FindingKind::ConfigFetch))
        .map(|e| e.key.source_name.as_str())
        .collect();
    flags.sort_unstable();
    flags.dedup();
    if !flags.is_empty() {
        steps.push(format!(
            "Create {} flag(s) in LaunchDarkly before deploying: {}",
            flags.len(),
            flags.join(", ")
        ));
    }

    if migrated(FindingKind::ConfigFetch).next().is_some() {
        steps.push(
            "Review rewritten config reads: values now come from JSON flag variations \
             read as plain properties"
                .to_string(),
        );
    }

    let retained = warned(WarningCode::RetainedImport);
    if retained > 0 {
        steps.push(format!(
            "Finish migrating the Statsig calls left next to {retained} retained import(s), \
             then remove those imports"
        ));
    }

    if warned(WarningCode::ClientNotInScope) > 0 {
        steps.push(
            "Make the initialized LaunchDarkly client available in files that use it \
             without creating it"
                .to_string(),
        );
    }

    if !report.experiments.is_empty() {
        let blocked = report
            .blocked
            .iter()
            .filter(|b| b.key.kind.is_some_and(|k| k.is_flag()))
            .count();
        steps.push(format!(
            "Recreate {} experiment(s) in LaunchDarkly; \
             {blocked} related gate/config site(s) were left on Statsig",
            report.experiments.len()
        ));
    }

    if !report.failed.is_empty() {
        steps.push(format!(
            "Resolve {} failed item(s) by hand (see not_migrated.failed_items)",
            report.failed.len()
        ));
    }
    steps
}

/// `summary` section of the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub total_items: usize,
    pub successfully_migrated: usize,
    pub blocked_by_experiments: usize,
    pub failed: usize,
}

/// A gate or config grouped over all its sites
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagEntry {
    pub source_name: String,
    pub target_names: IndexMap<SdkVariant, String>,
    #[serde(rename = "type")]
    pub flag_type: &'static str,
    pub fallback: Option<JsValue>,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteEntry {
    pub kind: FindingKind,
    pub source_name: String,
    pub target: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigratedSection {
    pub feature_gates: Vec<FlagEntry>,
    pub dynamic_configs: Vec<FlagEntry>,
    pub initialization: Vec<SiteEntry>,
    pub other: Vec<SiteEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentEntry {
    pub name: String,
    pub kind: FindingKind,
    pub related: Vec<String>,
    pub parameters: Vec<String>,
    pub blocked_sites: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedSite {
    pub kind: FindingKind,
    pub source_name: String,
    pub blocked_by: Vec<String>,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSite {
    pub kind: Option<FindingKind>,
    pub source_name: String,
    pub reason: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotMigratedSection {
    pub experiments: Vec<ExperimentEntry>,
    pub blocked_gates: Vec<BlockedSite>,
    pub failed_items: Vec<FailedSite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningEntry {
    pub code: WarningCode,
    pub message: String,
    pub location: Option<String>,
}

/// The `migration-summary` artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationSummary {
    pub summary: SummaryCounts,
    pub migrated: MigratedSection,
    pub not_migrated: NotMigratedSection,
    pub warnings: Vec<WarningEntry>,
    pub next_steps: Vec<String>,
}

impl MigrationReport {
    /// Items accounted for; always equals `total`
    #[must_use]
    pub fn accounted(&self) -> usize {
        self.migrated.len() + self.blocked.len() + self.failed.len()
    }

    /// Render the summary artifact
    #[must_use]
    pub fn to_summary(&self) -> MigrationSummary {
        MigrationSummary {
            summary: SummaryCounts {
                total_items: self.total,
                successfully_migrated: self.migrated.len(),
                blocked_by_experiments: self.blocked.len(),
                failed: self.failed.len(),
            },
            migrated: MigratedSection {
                feature_gates: self.flag_entries(FindingKind::GateCheck, "boolean"),
                dynamic_configs: self.flag_entries(FindingKind::ConfigFetch, "json"),
                initialization: self.site_entries(|k| k == FindingKind::ProviderInit),
                other: self.site_entries(|k| !k.is_flag() && k != FindingKind::ProviderInit),
            },
            not_migrated: NotMigratedSection {
                experiments: self
                    .experiments
                    .iter()
                    .map(|b| ExperimentEntry {
                        name: b.name.clone(),
                        kind: b.kind,
                        related: b.related.clone(),
                        parameters: b.param_names.clone(),
                        blocked_sites: b.blocked.len(),
                    })
                    .collect(),
                blocked_gates: self
                    .blocked
                    .iter()
                    .filter_map(|b| {
                        let kind = b.key.kind.filter(|k| !k.is_experiment_like())?;
                        Some(BlockedSite {
                            kind,
                            source_name: b.key.source_name.clone(),
                            blocked_by: b.reasons.clone(),
                            location: b.key.location.to_string(),
                        })
                    })
                    .collect(),
                failed_items: self
                    .failed
                    .iter()
                    .map(|f| FailedSite {
                        kind: f.key.kind,
                        source_name: f.key.source_name.clone(),
                        reason: f.reason.clone(),
                        location: f.key.location.to_string(),
                    })
                    .collect(),
            },
            warnings: self
                .warnings
                .iter()
                .map(|w| WarningEntry {
                    code: w.code,
                    message: w.message.clone(),
                    location: w.location.as_ref().map(ToString::to_string),
                })
                .collect(),
            next_steps: self.next_steps.clone(),
        }
    }

    /// Summary artifact as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns a serialization error (not expected for well-formed reports).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_summary())
    }

    fn flag_entries(&self, kind: FindingKind, flag_type: &'static str) -> Vec<FlagEntry> {
        let mut grouped: IndexMap<&str, FlagEntry> = IndexMap::new();
        for entry in self.migrated.iter().filter(|e| e.key.kind == Some(kind)) {
            let flag = grouped.entry(entry.key.source_name.as_str()).or_insert_with(|| FlagEntry {
                source_name: entry.key.source_name.clone(),
                target_names: IndexMap::new(),
                flag_type,
                fallback: entry.item.fallback.clone(),
                locations: Vec::new(),
            });
            flag.target_names
                .entry(entry.variant)
                .or_insert_with(|| entry.item.target_name.clone());
            flag.locations.push(entry.key.location.to_string());
        }
        grouped.into_values().collect()
    }

    fn site_entries(&self, keep: impl Fn(FindingKind) -> bool) -> Vec<SiteEntry> {
        self.migrated
            .iter()
            .filter_map(|e| {
                let kind = e.key.kind.filter(|k| keep(*k))?;
                Some(SiteEntry {
                    kind,
                    source_name: e.key.source_name.clone(),
                    target: e.item.target_name.clone(),
                    location: e.key.location.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteFailure;
    use flagshift_catalog::NameArg;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn finding(kind: FindingKind, name: &str, line: usize) -> Finding {
        Finding::new(
            kind,
            NameArg::literal(name),
            Location::new("src/app.js", line * 10..line * 10 + 5, line, 1),
            SdkVariant::React,
        )
    }

    fn migrated(id: usize, target: &str, fallback: Option<JsValue>) -> FindingOutcome {
        FindingOutcome {
            id: FindingId(id),
            outcome: Outcome::Migrated(MigratedItem {
                target_name: target.to_string(),
                fallback,
                replacement: String::new(),
            }),
            failure: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn gates_group_by_name() {
        let findings = vec![
            finding(FindingKind::GateCheck, "admin_panel_access", 1),
            finding(FindingKind::GateCheck, "admin_panel_access", 2),
            finding(FindingKind::ProviderInit, "StatsigProvider", 3),
        ];
        let outcomes = vec![
            migrated(0, "adminPanelAccess", Some(JsValue::Bool(false))),
            migrated(1, "adminPanelAccess", Some(JsValue::Bool(false))),
            migrated(2, "LDProvider", None),
        ];
        let report = build(&findings, &outcomes, &[], &[], Vec::new());
        let summary = report.to_summary();

        assert_eq!(summary.summary.total_items, 3);
        assert_eq!(summary.migrated.feature_gates.len(), 1);
        let gate = &summary.migrated.feature_gates[0];
        assert_eq!(
            gate.target_names.get(&SdkVariant::React).map(String::as_str),
            Some("adminPanelAccess")
        );
        assert_eq!(gate.locations, vec!["src/app.js:1:1", "src/app.js:2:1"]);
        assert_eq!(summary.migrated.initialization[0].target, "LDProvider");
        assert!(report.next_steps.iter().any(|s| s.contains("credential placeholder")));
        assert!(report.next_steps.iter().any(|s| s.contains("admin_panel_access")));
    }

    #[test]
    fn blocked_and_failed_items_are_listed() {
        let mut gate = finding(FindingKind::GateCheck, "express_checkout", 2);
        gate.block("checkout_flow_test");
        let mut experiment = finding(FindingKind::ExperimentFetch, "checkout_flow_test", 1);
        experiment.block("checkout_flow_test");
        let findings = vec![experiment, gate, finding(FindingKind::Override, "forced", 3)];
        let outcomes = vec![
            FindingOutcome::failed(
                FindingId(2),
                RewriteFailure::unsupported("local override", "by hand"),
                Vec::new(),
            ),
        ];
        let failures = vec![FileFailure::new("src/broken.ts", "syntax error")];
        let report = build(&findings, &outcomes, &failures, &[], Vec::new());

        assert_eq!(report.total, 4);
        assert_eq!(report.blocked.len(), 2);
        assert_eq!(report.failed.len(), 2);
        let summary = report.to_summary();
        assert_eq!(summary.not_migrated.blocked_gates.len(), 1);
        assert_eq!(summary.not_migrated.blocked_gates[0].blocked_by, vec!["checkout_flow_test"]);
        assert_eq!(summary.not_migrated.failed_items[1].kind, None);
        assert_eq!(summary.not_migrated.failed_items[1].location, "src/broken.ts:1:1");
    }

    #[test]
    fn summary_json_shape() {
        let findings = vec![finding(FindingKind::ConfigFetch, "x", 1)];
        let fallback = JsValue::object([
            ("title", JsValue::string("Default")),
            ("enabled", JsValue::Bool(false)),
        ]);
        let report = build(&findings, &[migrated(0, "x", Some(fallback))], &[], &[], Vec::new());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["summary"]["successfully_migrated"], 1);
        assert_eq!(json["migrated"]["dynamic_configs"][0]["type"], "json");
        assert_eq!(
            json["migrated"]["dynamic_configs"][0]["fallback"],
            serde_json::json!({"title": "Default", "enabled": false})
        );
        assert_eq!(json["migrated"]["dynamic_configs"][0]["target_names"]["react"], "x");
        assert!(json["not_migrated"]["experiments"].as_array().unwrap().is_empty());
    }

    fn outcome_strategy() -> impl Strategy<Value = (FindingKind, bool, u8)> {
        let kind = prop_oneof![
            Just(FindingKind::GateCheck),
            Just(FindingKind::ConfigFetch),
            Just(FindingKind::ExperimentFetch),
            Just(FindingKind::ProviderInit),
            Just(FindingKind::Import),
        ];
        (kind, any::<bool>(), 0u8..4)
    }

    proptest! {
        #[test]
        fn every_item_is_counted_once(
            items in prop::collection::vec(outcome_strategy(), 0..30),
            file_failures in 0usize..4,
        ) {
            let mut findings = Vec::new();
            let mut outcomes = Vec::new();
            for (index, (kind, blocked, outcome)) in items.iter().enumerate() {
                let mut f = finding(*kind, "n", index + 1);
                if *blocked {
                    f.block("exp");
                }
                findings.push(f);
                match outcome {
                    0 => outcomes.push(migrated(index, "n", None)),
                    1 => outcomes.push(FindingOutcome::failed(
                        FindingId(index),
                        RewriteFailure::LowConfidence,
                        Vec::new(),
                    )),
                    2 => outcomes.push(FindingOutcome {
                        id: FindingId(index),
                        outcome: Outcome::Blocked { reasons: vec!["exp".into()] },
                        failure: None,
                        warnings: Vec::new(),
                    }),
                    _ => {}
                }
            }
            let failures: Vec<FileFailure> = (0..file_failures)
                .map(|i| FileFailure::new(format!("src/f{i}.ts"), "timeout"))
                .collect();

            let report = build(&findings, &outcomes, &failures, &[], Vec::new());
            let summary = report.to_summary().summary;
            prop_assert_eq!(report.total, report.accounted());
            prop_assert_eq!(
                summary.total_items,
                summary.successfully_migrated + summary.blocked_by_experiments + summary.failed
            );
        }
    }
}
