//! Rewrite engine
//!
//! Produces a [`RewritePatch`] for every migratable finding. Files are
//! independent: [`rewrite_project`] fans out over files with rayon and each
//! file is rewritten sequentially in discovery order, imports last, since an
//! import's fate depends on how its call sites went.

use std::collections::HashSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;

use flagshift_catalog::literal::{is_identifier, single_quote};
use flagshift_catalog::{
    CallDetail, CallStyle, Catalog, Confidence, EventArgs, Finding, FindingDetail, FindingId,
    FindingKind, HookShape, ImportDetail, JsValue, NamingPolicy, PackageRole, PluginKind,
    ProviderDetail, ProviderStyle, SdkVariant, TargetApi,
};

use crate::context::transform;
use crate::error::{ContextError, RewriteFailure};
use crate::patch::{PatchSet, RewritePatch};
use crate::project::{Project, ProjectFile};
use crate::warning::{Warning, WarningCode};

/// Identifier of the LaunchDarkly client introduced by rewritten initializers
pub const DEFAULT_CLIENT_IDENTIFIER: &str = "ldClient";

/// Credential written into initializers until the user supplies one
pub const DEFAULT_CREDENTIAL_PLACEHOLDER: &str = "YOUR_CLIENT_SIDE_ID";

/// Knobs of the rewrite phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    pub client_identifier: String,
    pub credential_placeholder: String,
    /// Migrate matches whose receiver could not be tied to an import
    pub rewrite_low_confidence: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            client_identifier: DEFAULT_CLIENT_IDENTIFIER.to_string(),
            credential_placeholder: DEFAULT_CREDENTIAL_PLACEHOLDER.to_string(),
            rewrite_low_confidence: false,
        }
    }
}

impl RewriteOptions {
    #[inline]
    #[must_use]
    pub fn with_client_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.client_identifier = identifier.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_credential_placeholder(mut self, credential: impl Into<String>) -> Self {
        self.credential_placeholder = credential.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_rewrite_low_confidence(mut self, enabled: bool) -> Self {
        self.rewrite_low_confidence = enabled;
        self
    }
}

/// What a migrated finding became
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigratedItem {
    /// Flag key, factory or package the site now refers to
    pub target_name: String,
    /// Fallback written into the evaluation call
    pub fallback: Option<JsValue>,
    pub replacement: String,
}

/// Result of one rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub patch: RewritePatch,
    pub item: MigratedItem,
    pub warnings: Vec<Warning>,
    /// The replacement refers to the default client identifier
    pub uses_default_client: bool,
}

/// Final state of a finding after the rewrite phase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Migrated(MigratedItem),
    Blocked { reasons: Vec<String> },
    Failed { reason: String },
}

/// Outcome of one finding plus the warnings it produced
#[derive(Debug, Clone, PartialEq)]
pub struct FindingOutcome {
    pub id: FindingId,
    pub outcome: Outcome,
    /// Kept typed for callers that branch on the failure
    pub failure: Option<RewriteFailure>,
    pub warnings: Vec<Warning>,
}

impl FindingOutcome {
    fn migrated(id: FindingId, rewrite: Rewrite) -> Self {
        Self {
            id,
            outcome: Outcome::Migrated(rewrite.item),
            failure: None,
            warnings: rewrite.warnings,
        }
    }

    fn blocked(id: FindingId, reasons: Vec<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Blocked { reasons },
            failure: None,
            warnings: Vec::new(),
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failed(id: FindingId, failure: RewriteFailure, warnings: Vec<Warning>) -> Self {
        Self {
            id,
            outcome: Outcome::Failed {
                reason: failure.to_string(),
            },
            failure: Some(failure),
            warnings,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_migrated(&self) -> bool {
        matches!(self.outcome, Outcome::Migrated(_))
    }
}

/// Rewrite result of one file
#[derive(Debug, Clone)]
pub struct FileRewrite {
    pub path: PathBuf,
    pub patches: PatchSet,
    /// One outcome per finding of the file, in discovery order
    pub outcomes: Vec<FindingOutcome>,
    /// File-level warnings
    pub warnings: Vec<Warning>,
}

impl FileRewrite {
    /// Patched source text
    #[must_use]
    pub fn apply(&self, source: &str) -> String {
        self.patches.apply(source)
    }

    /// Turn every migrated outcome into a failure, dropping the patches
    pub fn fail_all(&mut self, failure: &RewriteFailure) {
        for outcome in &mut self.outcomes {
            if outcome.is_migrated() {
                self.patches.remove(outcome.id);
                outcome.outcome = Outcome::Failed {
                    reason: failure.to_string(),
                };
                outcome.failure = Some(failure.clone());
            }
        }
    }
}

/// Inputs shared by every rewrite in one file
pub struct RewriteContext<'a> {
    catalog: &'a Catalog,
    options: &'a RewriteOptions,
    naming: NamingPolicy,
    file: &'a ProjectFile,
    findings: &'a [Finding],
    /// Call sites already migrated; consulted by import rewrites
    migrated: HashSet<FindingId>,
}

impl<'a> RewriteContext<'a> {
    #[must_use]
    pub fn new(
        catalog: &'a Catalog,
        options: &'a RewriteOptions,
        file: &'a ProjectFile,
        findings: &'a [Finding],
    ) -> Self {
        Self {
            catalog,
            options,
            naming: NamingPolicy::new(),
            file,
            findings,
            migrated: HashSet::new(),
        }
    }

    /// Record call sites that were migrated before imports are rewritten
    #[must_use]
    pub fn with_migrated(mut self, ids: impl IntoIterator<Item = FindingId>) -> Self {
        self.migrated.extend(ids);
        self
    }

    fn source(&self) -> &'a str {
        &self.file.source
    }

    fn finding(&self, id: FindingId) -> &'a Finding {
        &self.findings[id.0]
    }

    /// Findings of this file
    fn file_findings(&self) -> impl Iterator<Item = (FindingId, &'a Finding)> + '_ {
        self.file.finding_ids().map(|id| (id, &self.findings[id.0]))
    }
}

/// Rewrite one finding
///
/// Returns `Ok(None)` for blocked findings.
///
/// # Errors
///
/// Returns [`RewriteFailure`] when the finding cannot be migrated safely.
pub fn rewrite(id: FindingId, ctx: &RewriteContext<'_>) -> Result<Option<Rewrite>, RewriteFailure> {
    let finding = ctx.finding(id);
    if finding.blocked {
        return Ok(None);
    }
    if finding.confidence == Confidence::Low && !ctx.options.rewrite_low_confidence {
        return Err(RewriteFailure::LowConfidence);
    }
    if let Some(ambiguity) = &finding.ambiguity {
        return Err(RewriteFailure::Ambiguous(ambiguity.clone()));
    }
    if !finding.name_is_literal {
        return Err(RewriteFailure::DynamicName(finding.source_name.clone()));
    }

    let mut builder = Builder::new(id, ctx);
    match finding.kind {
        FindingKind::GateCheck => builder.gate()?,
        FindingKind::ConfigFetch => builder.config()?,
        FindingKind::ProviderInit => builder.provider()?,
        FindingKind::EventLog => builder.event()?,
        FindingKind::HookUsage => builder.hook_usage()?,
        FindingKind::Import => builder.import()?,
        FindingKind::ManualExposure => {
            return Err(RewriteFailure::unsupported(
                "manual exposure logging",
                "LaunchDarkly records evaluations automatically; \
                 remove the call or replace it with track()",
            ));
        }
        FindingKind::Override => {
            return Err(RewriteFailure::unsupported(
                "local override",
                "use a LaunchDarkly test data source or targeting rules instead",
            ));
        }
        FindingKind::ExperimentFetch | FindingKind::LayerFetch => {
            return Err(RewriteFailure::unsupported(
                finding.kind.as_str(),
                "experiments are recreated in LaunchDarkly by hand",
            ));
        }
    }
    Ok(builder.finish())
}

/// Rewrite every finding of one file
#[must_use]
pub fn rewrite_file(
    file: &ProjectFile,
    findings: &[Finding],
    catalog: &Catalog,
    options: &RewriteOptions,
) -> FileRewrite {
    let ctx = RewriteContext::new(catalog, options, file, findings);
    let mut patches = PatchSet::new(&file.path);
    let mut outcomes = Vec::new();
    let mut default_client = false;
    let mut client_declared = false;

    let (imports, sites): (Vec<FindingId>, Vec<FindingId>) = file
        .finding_ids()
        .partition(|id| findings[id.0].kind == FindingKind::Import);

    for id in &sites {
        let outcome = settle(*id, &ctx, &mut patches, &mut default_client);
        if outcome.is_migrated() && declares_client(&findings[id.0]) {
            client_declared = true;
        }
        outcomes.push(outcome);
    }

    let migrated: Vec<FindingId> = outcomes
        .iter()
        .filter(|o| o.is_migrated())
        .map(|o| o.id)
        .collect();
    let ctx = ctx.with_migrated(migrated);
    for id in &imports {
        outcomes.push(settle(*id, &ctx, &mut patches, &mut default_client));
    }
    outcomes.sort_by_key(|o| o.id);

    let mut warnings = Vec::new();
    if default_client && !client_declared {
        warnings.push(Warning::new(
            WarningCode::ClientNotInScope,
            format!(
                "{}: rewritten calls use '{}' but the file does not create it; \
                 import the initialized client here",
                file.path.display(),
                options.client_identifier
            ),
        ));
    }

    tracing::debug!(
        "rewrote {}: {} patches, {} outcomes",
        file.path.display(),
        patches.len(),
        outcomes.len()
    );

    FileRewrite {
        path: file.path.clone(),
        patches,
        outcomes,
        warnings,
    }
}

fn settle(
    id: FindingId,
    ctx: &RewriteContext<'_>,
    patches: &mut PatchSet,
    default_client: &mut bool,
) -> FindingOutcome {
    let finding = ctx.finding(id);
    match rewrite(id, ctx) {
        Ok(None) => FindingOutcome::blocked(id, finding.block_reasons.clone()),
        Ok(Some(rewrite)) => {
            let uses_default_client = rewrite.uses_default_client;
            match patches.insert(rewrite.patch.clone(), ctx.source()) {
                Ok(()) => {
                    *default_client |= uses_default_client;
                    FindingOutcome::migrated(id, rewrite)
                }
                Err(failure) => FindingOutcome::failed(id, failure, rewrite.warnings),
            }
        }
        Err(RewriteFailure::LowConfidence) => {
            let warning = Warning::new(
                WarningCode::LowConfidenceMatch,
                format!(
                    "{} '{}' could not be tied to a Statsig import",
                    finding.kind, finding.source_name
                ),
            )
            .at(&finding.location);
            FindingOutcome::failed(id, RewriteFailure::LowConfidence, vec![warning])
        }
        Err(failure) => FindingOutcome::failed(id, failure, Vec::new()),
    }
}

/// Migrated provider that declares the default client
fn declares_client(finding: &Finding) -> bool {
    matches!(
        &finding.detail,
        FindingDetail::Provider(ProviderDetail {
            style: ProviderStyle::StaticInitialize { .. },
            statement_level: true,
            ..
        })
    )
}

/// Rewrite every file of a project in parallel
#[must_use]
pub fn rewrite_project(
    project: &Project,
    catalog: &Catalog,
    options: &RewriteOptions,
) -> Vec<FileRewrite> {
    let rewrites: Vec<FileRewrite> = project
        .files()
        .par_iter()
        .map(|file| rewrite_file(file, project.findings(), catalog, options))
        .collect();

    let migrated: usize = rewrites
        .iter()
        .map(|r| r.outcomes.iter().filter(|o| o.is_migrated()).count())
        .sum();
    tracing::info!(
        "rewrite produced {} patches over {} files",
        migrated,
        rewrites.iter().filter(|r| !r.patches.is_empty()).count()
    );
    rewrites
}

/// Accumulates the patch of one finding
struct Builder<'c, 'a> {
    id: FindingId,
    ctx: &'c RewriteContext<'a>,
    finding: &'a Finding,
    warnings: Vec<Warning>,
    uses_default_client: bool,
    result: Option<(RewritePatch, MigratedItem)>,
}

impl<'c, 'a> Builder<'c, 'a> {
    fn new(id: FindingId, ctx: &'c RewriteContext<'a>) -> Self {
        Self {
            id,
            ctx,
            finding: ctx.finding(id),
            warnings: Vec::new(),
            uses_default_client: false,
            result: None,
        }
    }

    fn finish(self) -> Option<Rewrite> {
        let (patch, item) = self.result?;
        Some(Rewrite {
            patch,
            item,
            warnings: self.warnings,
            uses_default_client: self.uses_default_client,
        })
    }

    fn warn(&mut self, code: WarningCode, message: impl Into<String>) {
        self.warnings.push(Warning::new(code, message).at(&self.finding.location));
    }

    fn target(&self) -> &'static TargetApi {
        self.ctx.catalog.target(self.finding.sdk_variant)
    }

    fn replace(&mut self, replacement: String, target_name: String, fallback: Option<JsValue>) {
        let patch = RewritePatch::new(
            self.id,
            self.finding.location.clone(),
            self.ctx.source(),
            replacement.clone(),
        );
        self.result = Some((
            patch,
            MigratedItem {
                target_name,
                fallback,
                replacement,
            },
        ));
    }

    fn call(&self) -> Result<&'a CallDetail, RewriteFailure> {
        self.finding.call().ok_or_else(|| {
            RewriteFailure::unsupported(self.finding.kind.as_str(), "unrecognized call shape")
        })
    }

    /// Receiver text of a method call, swapping SDK namespaces for the client
    fn receiver(&mut self, call: &CallDetail) -> String {
        match &call.style {
            CallStyle::Method {
                receiver,
                namespace_receiver,
                ..
            } if !namespace_receiver && !receiver.is_empty() => receiver.clone(),
            _ => {
                self.uses_default_client = true;
                self.ctx.options.client_identifier.clone()
            }
        }
    }

    fn server_user(&mut self, call: &CallDetail, what: &str) -> Result<String, RewriteFailure> {
        let user = call.server_user.clone().ok_or_else(|| {
            RewriteFailure::unsupported(
                format!("server-side {what} without a user argument"),
                "pass the evaluation context explicitly",
            )
        })?;
        self.warn(
            WarningCode::PassThroughUser,
            format!(
                "server user '{user}' passed through unchanged; \
                 convert it to a LaunchDarkly context"
            ),
        );
        Ok(user)
    }

    fn target_name(&self) -> String {
        self.ctx
            .naming
            .target_name(&self.finding.source_name, self.finding.sdk_variant)
    }

    /// `useFlags().<name>` for hooks
    fn flag_hook(&self) -> (String, String) {
        let target_name = self.target_name();
        (format!("useFlags(){}", member(&target_name)), target_name)
    }

    fn gate(&mut self) -> Result<(), RewriteFailure> {
        let call = self.call()?;
        if let Some(fallback) = &self.finding.fallback_literal {
            if !fallback.is_false() {
                self.warn(
                    WarningCode::NonFalseFallback,
                    format!(
                        "gate '{}': non-false fallback {} discarded \
                         to preserve Statsig-default parity",
                        self.finding.source_name,
                        fallback.render()
                    ),
                );
            }
        }
        let target_name = self.target_name();
        let key = single_quote(&target_name);

        match &call.style {
            CallStyle::Method { method, .. } => {
                let receiver = self.receiver(call);
                let target = self.target();
                let evaluation = if target.context_argument {
                    let user = self.server_user(call, "gate check")?;
                    format!("{receiver}.{}({key}, {user}, false)", target.bool_method)
                } else {
                    format!("{receiver}.{}({key}, false)", target.bool_method)
                };
                let replacement = if method == "getFeatureGate" {
                    format!("{{ value: {evaluation} }}")
                } else {
                    evaluation
                };
                self.replace(replacement, target_name, Some(JsValue::Bool(false)));
            }
            CallStyle::Hook { hook, shape } => {
                let (flag, target_name) = self.flag_hook();
                let replacement = match shape {
                    HookShape::Value => format!("({flag} ?? false)"),
                    HookShape::ValueField => format!("{{ value: {flag} ?? false }}"),
                    HookShape::ConfigField | HookShape::ClientField | HookShape::Opaque => {
                        return Err(RewriteFailure::unsupported(
                            hook.as_str(),
                            "read the flag from useFlags() by hand",
                        ));
                    }
                };
                self.replace(replacement, target_name, Some(JsValue::Bool(false)));
            }
        }
        Ok(())
    }

    /// Union of literal `.get` defaults over every fetch of this config in the file
    fn config_fallback(&mut self) -> Result<JsValue, RewriteFailure> {
        let name = &self.finding.source_name;
        let mut union: IndexMap<String, JsValue> = IndexMap::new();
        let mut any = false;

        let fetches = self
            .ctx
            .file_findings()
            .filter(|(_, f)| {
                f.kind == FindingKind::ConfigFetch && f.name_is_literal && &f.source_name == name
            });
        for (_, fetch) in fetches {
            for read in fetch.param_reads() {
                any = true;
                if !read.key_is_literal {
                    return Err(RewriteFailure::ambiguous_fallback(
                        name,
                        format!(
                            "parameter key {} is computed at runtime ({})",
                            read.key, read.location
                        ),
                    ));
                }
                let default = match &read.default {
                    Some(value) if !value.is_nullish() => value,
                    _ => {
                        return Err(RewriteFailure::ambiguous_fallback(
                            name,
                            format!("no usable default for '{}' at {}", read.key, read.location),
                        ));
                    }
                };
                match union.get(&read.key) {
                    Some(existing) if existing != default => {
                        return Err(RewriteFailure::ambiguous_fallback(
                            name,
                            format!(
                                "conflicting defaults for '{}': {} and {} ({})",
                                read.key,
                                existing.render(),
                                default.render(),
                                read.location
                            ),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        union.insert(read.key.clone(), default.clone());
                    }
                }
            }
        }

        if !any {
            self.warn(
                WarningCode::EmptyConfigFallback,
                format!("config '{name}': no parameter reads found, fallback is an empty object"),
            );
        }
        Ok(JsValue::Object(union))
    }

    fn config(&mut self) -> Result<(), RewriteFailure> {
        let call = self.call()?;
        let fallback = self.config_fallback()?;
        let rendered = fallback.render();
        let method_target = self.target_name();
        let key = single_quote(&method_target);

        // raw: expression evaluating to the config object
        let (raw, wrapped, target_name, hook_shape) = match &call.style {
            CallStyle::Method { .. } => {
                let receiver = self.receiver(call);
                let target = self.target();
                let raw = if target.context_argument {
                    let user = self.server_user(call, "config fetch")?;
                    format!("{receiver}.{}({key}, {user}, {rendered})", target.json_method)
                } else {
                    format!("{receiver}.{}({key}, {rendered})", target.json_method)
                };
                (raw.clone(), raw, method_target, None)
            }
            CallStyle::Hook { hook, shape } => {
                let (flag, target_name) = self.flag_hook();
                let value = format!("{flag} ?? {rendered}");
                let wrapped = match shape {
                    HookShape::Value => format!("({value})"),
                    HookShape::ValueField => format!("{{ value: {value} }}"),
                    HookShape::ConfigField => format!("{{ config: {value} }}"),
                    HookShape::ClientField | HookShape::Opaque => {
                        return Err(RewriteFailure::unsupported(
                            hook.as_str(),
                            "read the flag from useFlags() by hand",
                        ));
                    }
                };
                (format!("({value})"), wrapped, target_name, Some(*shape))
            }
        };

        let span = self.finding.location.span.clone();
        let chained = call
            .param_reads
            .iter()
            .find(|read| {
                read.location.span.start <= span.start && span.end <= read.location.span.end
            });

        let mut patch = match chained {
            Some(read) => {
                let mut location = self.finding.location.clone();
                location.span = read.location.span.clone();
                let replacement = format!(
                    "({raw}{} ?? {})",
                    member(&read.key),
                    default_of(read.default.as_ref())
                );
                RewritePatch::new(self.id, location, self.ctx.source(), replacement)
            }
            None => RewritePatch::new(
                self.id,
                self.finding.location.clone(),
                self.ctx.source(),
                wrapped.clone(),
            ),
        };

        for read in &call.param_reads {
            if chained.is_some_and(|c| c.location.span == read.location.span) {
                continue;
            }
            let accessor = if hook_shape == Some(HookShape::ValueField)
                && is_identifier(&read.accessor)
            {
                format!("{}.value", read.accessor)
            } else {
                read.accessor.clone()
            };
            patch = patch.with_edit(
                read.location.span.clone(),
                format!(
                    "({accessor}{} ?? {})",
                    member(&read.key),
                    default_of(read.default.as_ref())
                ),
            );
        }

        let replacement = patch.replacement_text.clone();
        self.result = Some((
            patch,
            MigratedItem {
                target_name,
                fallback: Some(fallback),
                replacement,
            },
        ));
        Ok(())
    }

    fn event(&mut self) -> Result<(), RewriteFailure> {
        let call = self.call()?;
        let event = call.event.clone().unwrap_or(EventArgs {
            value: None,
            metadata: None,
        });
        let value = match event.value {
            Some(value) if value.is_nullish() => None,
            Some(JsValue::Number(raw)) => Some(raw),
            Some(other) => {
                return Err(RewriteFailure::unsupported(
                    format!("event value of type {}", other.type_name()),
                    "LaunchDarkly metric values are numbers; move the value into the event data",
                ));
            }
            None => None,
        };
        let data = event.metadata.map(|m| m.render());

        let receiver = self.receiver(call);
        let mut arguments = vec![single_quote(&self.finding.source_name)];
        if self.target().context_argument {
            arguments.push(self.server_user(call, "event")?);
            arguments.push(data.unwrap_or_else(|| "undefined".to_string()));
            if let Some(value) = value {
                arguments.push(value);
            }
        } else {
            match (data, value) {
                (Some(data), Some(value)) => arguments.extend([data, value]),
                (Some(data), None) => arguments.push(data),
                (None, Some(value)) => arguments.extend(["undefined".to_string(), value]),
                (None, None) => {}
            }
        }
        let replacement = format!("{receiver}.track({})", arguments.join(", "));
        self.replace(replacement, self.finding.source_name.clone(), None);
        Ok(())
    }

    fn hook_usage(&mut self) -> Result<(), RewriteFailure> {
        let call = self.call()?;
        match &call.style {
            CallStyle::Hook { hook, .. } if hook == "useStatsigClient" => {
                self.replace(
                    "{ client: useLDClient() }".to_string(),
                    "useLDClient".to_string(),
                    None,
                );
                Ok(())
            }
            CallStyle::Hook { hook, .. } if hook.starts_with("useClient") => {
                Err(RewriteFailure::unsupported(
                    hook.as_str(),
                    "create the client with <LDProvider> or asyncWithLDProvider \
                     at the root of the tree",
                ))
            }
            CallStyle::Hook { hook, .. } => Err(RewriteFailure::unsupported(
                hook.as_str(),
                "use useLDClient() and the LaunchDarkly context APIs by hand",
            )),
            CallStyle::Method { method, .. } => Err(RewriteFailure::unsupported(
                method.as_str(),
                "no automatic equivalent",
            )),
        }
    }

    /// Context literal for an initializer
    fn context(&mut self, user: Option<&JsValue>) -> Result<String, RewriteFailure> {
        match user {
            None | Some(JsValue::Undefined | JsValue::Null) => {
                self.warn(
                    WarningCode::AnonymousContext,
                    "no user supplied; initializing with an anonymous context",
                );
                Ok(JsValue::object([
                    ("kind", JsValue::string("user")),
                    ("anonymous", JsValue::Bool(true)),
                ])
                .render())
            }
            Some(JsValue::Expr(text)) => {
                self.warn(
                    WarningCode::PassThroughUser,
                    format!(
                        "user '{text}' is not a literal and was passed through; \
                         convert it to a LaunchDarkly context"
                    ),
                );
                Ok(text.clone())
            }
            Some(user) => match transform(user) {
                Ok(context) => {
                    let location = self.finding.location.clone();
                    self.warnings
                        .extend(context.warnings.into_iter().map(|w| w.at(&location)));
                    Ok(context.value.render())
                }
                Err(ContextError::NotAnObject(text)) => {
                    self.warn(
                        WarningCode::PassThroughUser,
                        format!("user {text} is not an object literal and was passed through"),
                    );
                    Ok(text)
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Warn about Statsig options with no LaunchDarkly counterpart
    fn drop_options(&mut self, options: Option<&JsValue>, plugins: bool) {
        match options {
            None | Some(JsValue::Undefined | JsValue::Null) => {}
            Some(JsValue::Object(entries)) => {
                for key in entries.keys() {
                    if plugins && key == "plugins" {
                        continue;
                    }
                    self.warn(
                        WarningCode::DroppedOption,
                        format!(
                            "initialization option '{key}' has no LaunchDarkly equivalent \
                             and was dropped"
                        ),
                    );
                }
            }
            Some(other) => self.warn(
                WarningCode::DroppedOption,
                format!("initialization options {} were dropped", other.render()),
            ),
        }
    }

    /// `{ plugins: [...] }` for the observability add-ons imported by the file
    fn plugin_options(&mut self) -> Option<String> {
        if !self.target().plugins {
            return None;
        }
        let kinds = self.ctx.file.observability_imports(self.ctx.findings);
        if kinds.is_empty() {
            return None;
        }
        let mut plugins = Vec::new();
        for kind in kinds {
            let export = self.ctx.catalog.observability_target(kind).export;
            match kind {
                PluginKind::SessionReplay => {
                    let options = self
                        .ctx
                        .file
                        .plugins
                        .iter()
                        .filter(|p| p.kind == kind)
                        .find_map(|p| p.options.clone());
                    let settings = self.session_replay_settings(options.as_ref());
                    if settings.as_object().is_some_and(|s| !s.is_empty()) {
                        plugins.push(JsValue::Expr(format!("new {export}({})", settings.render())));
                    } else {
                        plugins.push(JsValue::Expr(format!("new {export}()")));
                    }
                }
                PluginKind::WebAnalytics => plugins.push(JsValue::Expr(format!("new {export}()"))),
            }
        }
        Some(JsValue::object([("plugins", JsValue::Array(plugins))]).render())
    }

    fn session_replay_settings(&mut self, options: Option<&JsValue>) -> JsValue {
        let mut settings = IndexMap::new();
        let Some(JsValue::Object(entries)) = options else {
            return JsValue::Object(settings);
        };
        for (key, value) in entries {
            match key.as_str() {
                "privacyMask" => {
                    let setting = match value {
                        JsValue::Bool(true) => "default",
                        JsValue::Bool(false) => "none",
                        other => {
                            self.warn(
                                WarningCode::DroppedOption,
                                format!(
                                    "privacyMask {} is not a boolean and was dropped",
                                    other.render()
                                ),
                            );
                            continue;
                        }
                    };
                    settings.insert("privacySetting".to_string(), JsValue::string(setting));
                }
                "maxSessionDurationMs" | "recordConsoleErrors" => self.warn(
                    WarningCode::LostFeature,
                    format!(
                        "session replay option '{key}' is not supported by LaunchDarkly \
                         and was dropped"
                    ),
                ),
                _ => self.warn(
                    WarningCode::DroppedOption,
                    format!("session replay option '{key}' was dropped"),
                ),
            }
        }
        JsValue::Object(settings)
    }

    fn provider(&mut self) -> Result<(), RewriteFailure> {
        let FindingDetail::Provider(detail) = &self.finding.detail else {
            return Err(RewriteFailure::unsupported(
                "initialization",
                "unrecognized initialization shape",
            ));
        };
        let variant = self.finding.sdk_variant;
        let target = self.target();
        let credential = single_quote(&self.ctx.options.credential_placeholder);
        let client = self.ctx.options.client_identifier.clone();

        match &detail.style {
            ProviderStyle::StaticInitialize { .. } | ProviderStyle::Constructor { .. }
                if variant == SdkVariant::React =>
            {
                Err(RewriteFailure::unsupported(
                    "imperative initialization in a React file",
                    "wrap the component tree in <LDProvider> instead",
                ))
            }
            ProviderStyle::StaticInitialize { .. } => {
                let call = self.init_call(detail, &credential)?;
                let replacement = if detail.statement_level {
                    let mut text = format!("const {client} = {call};");
                    if detail.awaited {
                        text.push_str(&format!(
                            "\n{}await {client}.waitForInitialization();",
                            detail.indent
                        ));
                    }
                    text
                } else {
                    call
                };
                self.replace(replacement, target.init_function.to_string(), None);
                Ok(())
            }
            ProviderStyle::Constructor { .. } => {
                let call = self.init_call(detail, &credential)?;
                self.replace(call, target.init_function.to_string(), None);
                Ok(())
            }
            ProviderStyle::ClientStart { receiver, method } => {
                if method == "initializeSync" {
                    self.warn(
                        WarningCode::BehaviorChange,
                        "initializeSync became waitForInitialization(), which is asynchronous",
                    );
                }
                self.replace(
                    format!("{receiver}.waitForInitialization()"),
                    "waitForInitialization".to_string(),
                    None,
                );
                Ok(())
            }
            ProviderStyle::Jsx {
                component,
                closing_tag,
            } => self.jsx(detail, component, closing_tag.clone()),
        }
    }

    /// `initialize('KEY', context, options)` or `init('KEY')`
    fn init_call(
        &mut self,
        detail: &ProviderDetail,
        credential: &str,
    ) -> Result<String, RewriteFailure> {
        let target = self.target();
        if target.context_argument {
            self.drop_options(detail.options.as_ref(), false);
            return Ok(format!("{}({credential})", target.init_function));
        }
        let context = self.context(detail.user.as_ref())?;
        let plugins = self.plugin_options();
        self.drop_options(detail.options.as_ref(), plugins.is_some());
        Ok(match plugins {
            Some(options) => {
                format!("{}({credential}, {context}, {options})", target.init_function)
            }
            None => format!("{}({credential}, {context})", target.init_function),
        })
    }

    fn jsx(
        &mut self,
        detail: &ProviderDetail,
        component: &str,
        closing_tag: Option<std::ops::Range<usize>>,
    ) -> Result<(), RewriteFailure> {
        if self.finding.sdk_variant != SdkVariant::React {
            return Err(RewriteFailure::unsupported(
                format!("<{component}> outside a React SDK file"),
                "wrap the component tree in <LDProvider> by hand",
            ));
        }
        if detail.dropped.iter().any(|prop| prop == "client") {
            return Err(RewriteFailure::unsupported(
                format!("<{component} client={{...}}>"),
                "pass the context to <LDProvider> and remove the separately constructed client",
            ));
        }
        for prop in &detail.dropped {
            self.warn(
                WarningCode::DroppedOption,
                format!(
                    "prop '{prop}' of <{component}> has no LaunchDarkly equivalent and was dropped"
                ),
            );
        }

        let context = self.context(detail.user.as_ref())?;
        let plugins = self.plugin_options();
        self.drop_options(detail.options.as_ref(), plugins.is_some());

        let opening = self.ctx.source().get(self.finding.location.span.clone()).unwrap_or_default();
        if opening.contains("waitForInitialization") {
            self.warn(
                WarningCode::BehaviorChange,
                "<LDProvider> renders children before flags load; \
                 use asyncWithLDProvider to wait for initialization",
            );
        }

        let credential = jsx_string(&self.ctx.options.credential_placeholder);
        let mut tag = format!("<LDProvider clientSideID={credential} context={{{context}}}");
        if let Some(options) = plugins {
            tag.push_str(&format!(" options={{{options}}}"));
        }
        tag.push_str(if closing_tag.is_some() { ">" } else { " />" });

        let mut patch = RewritePatch::new(
            self.id,
            self.finding.location.clone(),
            self.ctx.source(),
            tag.clone(),
        );
        if let Some(closing) = closing_tag {
            patch = patch.with_edit(closing, "</LDProvider>");
        }
        self.result = Some((
            patch,
            MigratedItem {
                target_name: "LDProvider".to_string(),
                fallback: None,
                replacement: tag,
            },
        ));
        Ok(())
    }

    fn import(&mut self) -> Result<(), RewriteFailure> {
        let Some(import) = self.finding.import() else {
            return Err(RewriteFailure::unsupported("import", "unrecognized import shape"));
        };
        match import.role {
            PackageRole::Sdk(variant) => self.sdk_import(import, variant),
            PackageRole::Observability(kind) => self.observability_import(import, kind),
        }
    }

    fn sdk_import(
        &mut self,
        import: &ImportDetail,
        variant: SdkVariant,
    ) -> Result<(), RewriteFailure> {
        let target = self.ctx.catalog.target(variant);
        let sites: Vec<(FindingId, &Finding)> = self
            .ctx
            .file_findings()
            .filter(|(_, f)| f.kind != FindingKind::Import)
            .collect();
        let migrated: Vec<&Finding> = sites
            .iter()
            .filter(|(id, _)| self.ctx.migrated.contains(id))
            .map(|(_, f)| *f)
            .collect();
        if !sites.is_empty() && migrated.is_empty() {
            return Err(RewriteFailure::ImportInUse(sites.len()));
        }

        // an earlier import already maps to the same target package
        let duplicate = self.ctx.file_findings().any(|(id, f)| {
            let same_target = match f.import().map(|i| i.role) {
                Some(PackageRole::Sdk(v)) => self.ctx.catalog.target(v).package == target.package,
                _ => false,
            };
            id < self.id && !f.blocked && same_target
        });
        if duplicate {
            let mut patch =
                RewritePatch::new(self.id, self.finding.location.clone(), self.ctx.source(), "");
            let end = self.finding.location.span.end;
            if self.ctx.source()[end..].starts_with('\n') {
                patch = patch.with_edit(end..end + 1, "");
            }
            self.result = Some((
                patch,
                MigratedItem {
                    target_name: target.package.to_string(),
                    fallback: None,
                    replacement: String::new(),
                },
            ));
            return Ok(());
        }

        let catalog = self.ctx.catalog;
        let names = needed_imports(
            target,
            migrated
                .iter()
                .copied()
                .filter(|f| catalog.target(f.sdk_variant).package == target.package),
        );
        let line = named_import_line(&names, target.package, import.commonjs, import.semicolon);

        let replacement = if migrated.len() == sites.len() {
            line
        } else {
            self.warn(
                WarningCode::RetainedImport,
                format!(
                    "'{}' kept: {} of {} call sites were not migrated",
                    import.package,
                    sites.len() - migrated.len(),
                    sites.len()
                ),
            );
            format!("{}\n{line}", original_text(self.finding, self.ctx.source()))
        };
        self.replace(replacement, target.package.to_string(), None);
        Ok(())
    }

    fn observability_import(
        &mut self,
        import: &ImportDetail,
        kind: PluginKind,
    ) -> Result<(), RewriteFailure> {
        let target = self.ctx.catalog.observability_target(kind);
        let providers: Vec<&Finding> = self
            .ctx
            .file_findings()
            .filter(|(id, f)| f.kind == FindingKind::ProviderInit && self.ctx.migrated.contains(id))
            .map(|(_, f)| f)
            .filter(|f| self.ctx.catalog.target(f.sdk_variant).plugins)
            .collect();
        let uses: Vec<_> = self.ctx.file.plugins.iter().filter(|p| p.kind == kind).collect();

        let contained = uses.iter().all(|plugin| {
            providers.iter().any(|provider| {
                let span = &provider.location.span;
                span.start <= plugin.location.span.start && plugin.location.span.end <= span.end
            })
        });
        let line =
            default_import_line(target.export, target.package, import.commonjs, import.semicolon);

        let replacement = if contained && (!providers.is_empty() || uses.is_empty()) {
            line
        } else if !providers.is_empty() {
            self.warn(
                WarningCode::RetainedImport,
                format!(
                    "'{}' kept: the add-on is still started outside the rewritten initializer",
                    import.package
                ),
            );
            format!("{}\n{line}", original_text(self.finding, self.ctx.source()))
        } else {
            return Err(RewriteFailure::ImportInUse(uses.len()));
        };
        self.replace(replacement, target.package.to_string(), None);
        Ok(())
    }
}

/// Source text a finding spans
fn original_text<'s>(finding: &Finding, source: &'s str) -> &'s str {
    source.get(finding.location.span.clone()).unwrap_or_default()
}

/// Named exports the migrated sites of one target package rely on
fn needed_imports<'f>(
    target: &TargetApi,
    migrated: impl Iterator<Item = &'f Finding>,
) -> Vec<&'static str> {
    let mut needed: HashSet<&'static str> = HashSet::new();
    for finding in migrated {
        match &finding.detail {
            FindingDetail::Provider(detail) => match detail.style {
                ProviderStyle::StaticInitialize { .. } | ProviderStyle::Constructor { .. } => {
                    needed.insert(target.init_function);
                }
                ProviderStyle::Jsx { .. } => {
                    needed.insert("LDProvider");
                }
                ProviderStyle::ClientStart { .. } => {}
            },
            FindingDetail::Call(CallDetail {
                style: CallStyle::Hook { hook, .. },
                ..
            }) => {
                needed.insert(if hook == "useStatsigClient" { "useLDClient" } else { "useFlags" });
            }
            _ => {}
        }
    }
    let names: Vec<&'static str> = target
        .default_imports
        .iter()
        .copied()
        .filter(|name| needed.contains(name))
        .collect();
    if names.is_empty() {
        target.default_imports.to_vec()
    } else {
        names
    }
}

fn named_import_line(names: &[&str], package: &str, commonjs: bool, semicolon: bool) -> String {
    let names = names.join(", ");
    let package = single_quote(package);
    let mut line = if commonjs {
        format!("const {{ {names} }} = require({package})")
    } else {
        format!("import {{ {names} }} from {package}")
    };
    if semicolon {
        line.push(';');
    }
    line
}

fn default_import_line(name: &str, package: &str, commonjs: bool, semicolon: bool) -> String {
    let package = single_quote(package);
    let mut line = if commonjs {
        format!("const {name} = require({package})")
    } else {
        format!("import {name} from {package}")
    };
    if semicolon {
        line.push(';');
    }
    line
}

/// `.key` or `['key']`
fn member(key: &str) -> String {
    if is_identifier(key) {
        format!(".{key}")
    } else {
        format!("[{}]", single_quote(key))
    }
}

fn default_of(default: Option<&JsValue>) -> String {
    default.map_or_else(|| "undefined".to_string(), JsValue::render)
}

/// JSX attribute string
fn jsx_string(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "&quot;"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use flagshift_scanner::{default_parsers, Scanner};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    fn project(files: &[(&str, &str)]) -> Project {
        let catalog = Arc::new(Catalog::new().unwrap());
        let scanner = Scanner::new(catalog);
        let registry = default_parsers();
        let scanned = files
            .iter()
            .map(|(path, source)| scanner.scan_source(&registry, Path::new(path), source).unwrap());
        let mut project = Project::from_scanned(scanned);
        classify(project.findings_mut());
        project
    }

    fn run(path: &str, source: &str) -> (String, FileRewrite, Project) {
        run_with(path, source, &RewriteOptions::default())
    }

    fn run_with(
        path: &str,
        source: &str,
        options: &RewriteOptions,
    ) -> (String, FileRewrite, Project) {
        let project = project(&[(path, source)]);
        let catalog = Catalog::new().unwrap();
        let rewrites = rewrite_project(&project, &catalog, options);
        let rewrite = rewrites.into_iter().next().unwrap();
        (rewrite.apply(source), rewrite, project)
    }

    fn warning_codes(rewrite: &FileRewrite) -> Vec<WarningCode> {
        rewrite
            .outcomes
            .iter()
            .flat_map(|o| o.warnings.iter().map(|w| w.code))
            .chain(rewrite.warnings.iter().map(|w| w.code))
            .collect()
    }

    #[test]
    fn gate_fallback_is_forced_false() {
        let source = "import Statsig from 'statsig-js';\n\
                      await Statsig.initialize('client-key', { userID: 'u1' });\n\
                      const a = Statsig.checkGate('new_checkout', true);\n\
                      const b = Statsig.checkGate('dark_mode');\n";
        let (patched, rewrite, _) = run("src/app.js", source);

        assert_eq!(
            patched,
            "import { initialize } from 'launchdarkly-js-client-sdk';\n\
             const ldClient = initialize('YOUR_CLIENT_SIDE_ID', { kind: \"user\", key: \"u1\" });\n\
             await ldClient.waitForInitialization();\n\
             const a = ldClient.variation('new_checkout', false);\n\
             const b = ldClient.variation('dark_mode', false);\n"
        );
        let non_false: Vec<_> = rewrite
            .outcomes
            .iter()
            .flat_map(|o| &o.warnings)
            .filter(|w| w.code == WarningCode::NonFalseFallback)
            .collect();
        assert_eq!(non_false.len(), 1);
        assert!(non_false[0]
            .message
            .contains("non-false fallback true discarded to preserve Statsig-default parity"));
        assert!(rewrite.warnings.is_empty());
    }

    #[test]
    fn string_fallback_also_warns() {
        let source = "import Statsig from 'statsig-js';\nStatsig.checkGate('beta', \"yes\");\n";
        let (patched, rewrite, _) = run("src/a.js", source);
        assert!(patched.contains("ldClient.variation('beta', false)"));
        assert!(warning_codes(&rewrite).contains(&WarningCode::NonFalseFallback));
        assert!(warning_codes(&rewrite).contains(&WarningCode::ClientNotInScope));
    }

    #[test]
    fn config_fallback_is_union_of_reads() {
        let source = "import Statsig from 'statsig-js';\n\
                      const config = Statsig.getConfig('x');\n\
                      const title = config.get('title', 'Default');\n\
                      const enabled = config.get('enabled', false);\n";
        let (patched, rewrite, project) = run("src/config.js", source);

        let config_id = project
            .findings()
            .iter()
            .position(|f| f.kind == FindingKind::ConfigFetch)
            .unwrap();
        let outcome = &rewrite.outcomes[config_id];
        let Outcome::Migrated(item) = &outcome.outcome else {
            panic!("config not migrated: {outcome:?}");
        };
        assert_eq!(
            item.fallback,
            Some(JsValue::object([
                ("title", JsValue::string("Default")),
                ("enabled", JsValue::Bool(false)),
            ]))
        );
        assert!(patched.contains(
            "const config = ldClient.variation('x', { title: \"Default\", enabled: false });"
        ));
        assert!(patched.contains("const title = (config.title ?? \"Default\");"));
        assert!(patched.contains("const enabled = (config.enabled ?? false);"));
    }

    #[test]
    fn conflicting_or_missing_defaults_fail() {
        let conflicting = "import Statsig from 'statsig-js';\n\
                           const a = Statsig.getConfig('x').get('limit', 5);\n\
                           const b = Statsig.getConfig('x').get('limit', 10);\n";
        let (_, rewrite, _) = run("src/a.js", conflicting);
        let failures: Vec<_> = rewrite.outcomes.iter().filter_map(|o| o.failure.as_ref()).collect();
        assert!(failures
            .iter()
            .any(|f| matches!(
                f,
                RewriteFailure::AmbiguousFallback { detail, .. } if detail.contains("conflicting")
            )));

        let missing = "import Statsig from 'statsig-js';\n\
                       const c = Statsig.getConfig('y');\n\
                       c.get('limit');\n";
        let (patched, rewrite, _) = run("src/b.js", missing);
        assert!(rewrite
            .outcomes
            .iter()
            .any(|o| matches!(o.failure, Some(RewriteFailure::AmbiguousFallback { .. }))));
        assert!(patched.contains("Statsig.getConfig('y')"));
    }

    #[test]
    fn chained_config_read_is_rewritten_in_place() {
        let source = "import Statsig from 'statsig-js';\n\
                      const t = Statsig.getConfig('banner').get('text', 'Hi');\n";
        let (patched, _, _) = run("src/c.js", source);
        assert!(patched.contains(
            "const t = (ldClient.variation('banner', { text: \"Hi\" }).text ?? \"Hi\");"
        ));
    }

    #[test]
    fn config_without_reads_gets_empty_fallback() {
        let source = "import Statsig from 'statsig-js';\n\
                      const c = Statsig.getConfig('theme');\n\
                      render(c);\n";
        let (patched, rewrite, _) = run("src/d.js", source);
        assert!(patched.contains("ldClient.variation('theme', {})"));
        assert!(warning_codes(&rewrite).contains(&WarningCode::EmptyConfigFallback));
    }

    #[test]
    fn react_hooks_use_camel_case() {
        let source = "import { useGate, StatsigProvider } from 'statsig-react';\n\
                      function Admin() {\n\
                      \x20 const { value } = useGate('admin_panel_access');\n\
                      \x20 return value;\n\
                      }\n\
                      function App() {\n\
                      \x20 return <StatsigProvider sdkKey=\"k\" user={{ userID: 'u1' }}>\
                      <Admin /></StatsigProvider>;\n\
                      }\n";
        let (patched, rewrite, project) = run("src/App.jsx", source);

        assert!(
            patched.contains("const { value } = { value: useFlags().adminPanelAccess ?? false };")
        );
        assert!(patched.contains(
            "<LDProvider clientSideID=\"YOUR_CLIENT_SIDE_ID\" \
             context={{ kind: \"user\", key: \"u1\" }}><Admin /></LDProvider>"
        ));
        assert!(patched.starts_with(
            "import { LDProvider, useFlags } from 'launchdarkly-react-client-sdk';\n"
        ));

        let gate = project
            .findings()
            .iter()
            .position(|f| f.kind == FindingKind::GateCheck)
            .unwrap();
        match &rewrite.outcomes[gate].outcome {
            Outcome::Migrated(item) => assert_eq!(item.target_name, "adminPanelAccess"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn react_client_methods_use_camel_case() {
        let source = "import { useStatsigClient } from '@statsig/react-bindings';\n\
                      function Admin() {\n\
                      \x20 const { client } = useStatsigClient();\n\
                      \x20 const cfg = client.getConfig('promo_banner');\n\
                      \x20 return client.checkGate('admin_panel_access') && \
                      cfg.get('title', 'Hi');\n\
                      }\n";
        let (patched, rewrite, project) = run("src/Admin.jsx", source);

        assert!(patched.contains("client.variation('adminPanelAccess', false)"));
        assert!(
            patched.contains("const cfg = client.variation('promoBanner', { title: \"Hi\" });")
        );
        assert!(!patched.contains("admin_panel_access"));

        let target = |kind: FindingKind| {
            let id = project.findings().iter().position(|f| f.kind == kind).unwrap();
            match &rewrite.outcomes[id].outcome {
                Outcome::Migrated(item) => item.target_name.clone(),
                other => panic!("unexpected outcome {other:?}"),
            }
        };
        assert_eq!(target(FindingKind::GateCheck), "adminPanelAccess");
        assert_eq!(target(FindingKind::ConfigFetch), "promoBanner");
    }

    #[test]
    fn nested_rebinding_keeps_its_own_reads() {
        let source = "import Statsig from 'statsig-js';\n\
                      const config = Statsig.getConfig('banner');\n\
                      const title = config.get('title', 'hi');\n\
                      function f() {\n\
                      \x20 const config = Statsig.getExperiment('checkout_test');\n\
                      \x20 return config.get('discount', 0);\n\
                      }\n";
        let (patched, rewrite, project) = run("src/banner.js", source);

        assert!(
            patched.contains("const config = ldClient.variation('banner', { title: \"hi\" });")
        );
        assert!(patched.contains("const title = (config.title ?? \"hi\");"));
        assert!(patched.contains("  const config = Statsig.getExperiment('checkout_test');\n"));
        assert!(patched.contains("  return config.get('discount', 0);\n"));

        let config_id = project
            .findings()
            .iter()
            .position(|f| f.kind == FindingKind::ConfigFetch)
            .unwrap();
        let Outcome::Migrated(item) = &rewrite.outcomes[config_id].outcome else {
            panic!("config not migrated");
        };
        assert_eq!(item.fallback, Some(JsValue::object([("title", JsValue::string("hi"))])));
    }

    #[test]
    fn javascript_keys_are_not_renamed() {
        let source =
            "import Statsig from 'statsig-js';\nStatsig.checkGate('admin_panel_access');\n";
        let (patched, _, _) = run("src/a.js", source);
        assert!(patched.contains("ldClient.variation('admin_panel_access', false)"));
    }

    #[test]
    fn blocked_gate_gets_no_patch() {
        let source = "import Statsig from 'statsig-js';\n\
                      // flagshift:related express_checkout\n\
                      const exp = Statsig.getExperiment('checkout_flow_test');\n\
                      if (Statsig.checkGate('express_checkout')) {}\n";
        let (patched, rewrite, project) = run("src/checkout.js", source);

        assert_eq!(patched, source);
        assert!(rewrite.patches.is_empty());
        let gate = project
            .findings()
            .iter()
            .position(|f| f.source_name == "express_checkout")
            .unwrap();
        assert_eq!(
            rewrite.outcomes[gate].outcome,
            Outcome::Blocked {
                reasons: vec!["checkout_flow_test".to_string()]
            }
        );
        for patch in rewrite.patches.patches() {
            assert!(!patch.location.overlaps(&project.findings()[gate].location));
        }
    }

    #[test]
    fn partial_migration_retains_import() {
        let source = "import Statsig from 'statsig-js';\n\
                      Statsig.checkGate('ok');\n\
                      Statsig.overrideGate('forced', true);\n";
        let (patched, rewrite, _) = run("src/e.js", source);
        assert!(patched.starts_with(
            "import Statsig from 'statsig-js';\n\
             import { initialize } from 'launchdarkly-js-client-sdk';\n"
        ));
        assert!(warning_codes(&rewrite).contains(&WarningCode::RetainedImport));
        assert!(rewrite
            .outcomes
            .iter()
            .any(|o| matches!(o.failure, Some(RewriteFailure::Unsupported { .. }))));
    }

    #[test]
    fn import_with_no_migrated_sites_fails() {
        let source = "import Statsig from 'statsig-js';\nStatsig.overrideGate('forced', true);\n";
        let (patched, rewrite, _) = run("src/f.js", source);
        assert_eq!(patched, source);
        assert!(rewrite
            .outcomes
            .iter()
            .any(|o| o.failure == Some(RewriteFailure::ImportInUse(1))));
    }

    #[test]
    fn events_become_track_calls() {
        let source = "import Statsig from 'statsig-js';\n\
                      Statsig.logEvent('purchase', 9.99, { sku: 'a1' });\n\
                      Statsig.logEvent('view');\n\
                      Statsig.logEvent('label', 'big');\n";
        let (patched, rewrite, _) = run("src/g.js", source);
        assert!(patched.contains("ldClient.track('purchase', { sku: \"a1\" }, 9.99);"));
        assert!(patched.contains("ldClient.track('view');"));
        assert!(patched.contains("Statsig.logEvent('label', 'big');"));
        assert!(rewrite
            .outcomes
            .iter()
            .any(|o| matches!(
                &o.failure,
                Some(RewriteFailure::Unsupported { what, .. }) if what.contains("string")
            )));
    }

    #[test]
    fn server_calls_take_the_user() {
        let source = "const statsig = require('statsig-node');\n\
                      await statsig.initialize('secret');\n\
                      const on = await statsig.checkGate(user, 'beta');\n";
        let (patched, rewrite, _) = run("server/index.js", source);
        assert_eq!(
            patched,
            "const { init } = require('@launchdarkly/node-server-sdk');\n\
             const ldClient = init('YOUR_CLIENT_SIDE_ID');\n\
             await ldClient.waitForInitialization();\n\
             const on = await ldClient.boolVariation('beta', user, false);\n"
        );
        assert!(warning_codes(&rewrite).contains(&WarningCode::PassThroughUser));
    }

    #[test]
    fn low_confidence_needs_opt_in() {
        let source = "import Statsig from 'statsig-js';\nclient.checkGate('beta');\n";
        let (patched, rewrite, _) = run("src/h.js", source);
        assert_eq!(patched, source);
        let gate = &rewrite.outcomes[1];
        assert_eq!(gate.failure, Some(RewriteFailure::LowConfidence));
        assert_eq!(gate.warnings[0].code, WarningCode::LowConfidenceMatch);

        let options = RewriteOptions::default().with_rewrite_low_confidence(true);
        let (patched, _, _) = run_with("src/h.js", source, &options);
        assert_eq!(
            patched,
            "import { initialize } from 'launchdarkly-js-client-sdk';\n\
             client.variation('beta', false);\n"
        );
    }

    #[test]
    fn session_replay_plugin_is_carried_over() {
        let source = "import Statsig from 'statsig-js';\n\
                      import { StatsigSessionReplayPlugin } from '@statsig/session-replay';\n\
                      await Statsig.initialize('k', { userID: 'u1' }, { plugins: \
                      [new StatsigSessionReplayPlugin({ privacyMask: true, \
                      maxSessionDurationMs: 1000 })] \
                      });\n";
        let (patched, rewrite, _) = run("src/i.js", source);
        assert!(patched.contains(
            "initialize('YOUR_CLIENT_SIDE_ID', { kind: \"user\", key: \"u1\" }, \
             { plugins: [new SessionReplay({ privacySetting: \"default\" })] });"
        ));
        assert!(patched.contains("import SessionReplay from '@launchdarkly/session-replay';"));
        assert!(warning_codes(&rewrite).contains(&WarningCode::LostFeature));
    }

    #[test]
    fn custom_identifier_and_credential() {
        let options = RewriteOptions::default()
            .with_client_identifier("flags")
            .with_credential_placeholder("abc123");
        let source = "import Statsig from 'statsig-js';\n\
                      Statsig.initialize('k');\n\
                      Statsig.checkGate('x');\n";
        let (patched, rewrite, _) = run_with("src/j.js", source, &options);
        assert!(patched
            .contains("const flags = initialize('abc123', { kind: \"user\", anonymous: true });"));
        assert!(patched.contains("flags.variation('x', false)"));
        assert!(warning_codes(&rewrite).contains(&WarningCode::AnonymousContext));
        assert!(!warning_codes(&rewrite).contains(&WarningCode::ClientNotInScope));
    }
}
