//! Migration orchestrator
//!
//! Drives one pass: scan → classify → rewrite → report.
//!
//! Scanning runs on blocking worker threads, at most `max_parallel_files`
//! at a time, each under a per-file timeout. Results are merged in path
//! order before classification. Nothing is written until every file has
//! been rewritten in memory, so a cancelled pass leaves the project as it
//! found it. Patched files are staged until the summary has been written,
//! so a pass that cannot report leaves every source untouched. If a source
//! write then fails, the summary is written again to match the disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use flagshift_catalog::{Catalog, Location};
use flagshift_engine::{
    build, classify, rewrite_project, Classification, FileFailure, FileRewrite, FindingOutcome,
    MigrationReport, Project, RewriteFailure, Warning, WarningCode,
};
use flagshift_scanner::{default_parsers, ParserRegistry, ScannedFile, Scanner};

use crate::cancel::CancellationFlag;
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::state::{PassState, PassTracker};
use crate::store::{FsStore, ProjectStore};

/// What a finished pass produced
#[derive(Debug)]
pub struct MigrationResult {
    pub report: MigrationReport,
    /// Files whose patched text was written, relative to the root
    pub files_written: Vec<PathBuf>,
    /// Where the summary artifact landed
    pub summary_path: PathBuf,
}

/// Per-file scan result before the barrier
enum ScanOutcome {
    Scanned(ScannedFile),
    Skipped { failure: FileFailure, warning: Warning },
    Cancelled,
}

impl ScanOutcome {
    fn skipped(path: &Path, reason: String) -> Self {
        tracing::warn!("skipping {}: {}", path.display(), reason);
        let warning = Warning::new(WarningCode::FileSkipped, format!("file skipped: {reason}"))
            .at(&Location::new(path, 0..0, 1, 1));
        ScanOutcome::Skipped {
            failure: FileFailure::new(path, reason),
            warning,
        }
    }
}

/// Runs a single migration pass over a project
///
/// An orchestrator is good for one [`run`](Orchestrator::run); the state
/// machine refuses to leave `Done` or `Failed`.
pub struct Orchestrator {
    config: MigrationConfig,
    catalog: Arc<Catalog>,
    store: Arc<dyn ProjectStore>,
    tracker: PassTracker,
    cancel: CancellationFlag,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.tracker.current())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Validate the config and load the pattern catalog
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] for an invalid config and
    /// [`MigrationError::Catalog`] when the catalog cannot be built.
    pub fn new(
        config: MigrationConfig,
        store: Arc<dyn ProjectStore>,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        let catalog = Catalog::with_extensions(
            &config.pragma_tag,
            config.wrappers.iter().map(|(name, kind)| (name.as_str(), *kind)),
        )?;
        tracing::info!(
            "catalog loaded: pragma tag '{}', {} wrapper(s)",
            config.pragma_tag,
            config.wrappers.len()
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            store,
            tracker: PassTracker::new(),
            cancel: CancellationFlag::new(),
        })
    }

    /// Orchestrator over a directory on disk
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::new`].
    pub fn for_root(
        config: MigrationConfig,
        root: impl Into<PathBuf>,
    ) -> Result<Self, MigrationError> {
        let store = FsStore::new(root).with_output(config.output.clone());
        Self::new(config, Arc::new(store))
    }

    /// Flag that stops the pass at the next file boundary
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Current phase
    #[must_use]
    pub fn state(&self) -> PassState {
        self.tracker.current()
    }

    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run the pass
    ///
    /// Per-file problems become failed items in the report. Only fatal
    /// conditions are returned as errors, and the state ends in `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Cancelled`] if cancelled before writing,
    /// [`MigrationError::Store`] if the project cannot be listed, and
    /// [`MigrationError::Summary`] if the summary cannot be written.
    pub async fn run(&self) -> Result<MigrationResult, MigrationError> {
        let started = Instant::now();
        match self.run_pass().await {
            Ok(result) => {
                tracing::info!(
                    "migration finished in {:?}: {} file(s) written, summary at {}",
                    started.elapsed(),
                    result.files_written.len(),
                    result.summary_path.display()
                );
                Ok(result)
            }
            Err(err) => {
                self.tracker.fail();
                Err(err)
            }
        }
    }

    async fn run_pass(&self) -> Result<MigrationResult, MigrationError> {
        self.tracker.transition(PassState::Scanning)?;
        let (scanned, file_failures, warnings) = self.scan_all().await?;
        self.check_cancelled()?;

        self.tracker.transition(PassState::Classifying)?;
        let mut project = Project::from_scanned(scanned);
        let classification = classify(project.findings_mut());
        tracing::info!(
            "classified {} finding(s), {} experiment binding(s)",
            project.findings().len(),
            classification.bindings.len()
        );
        self.check_cancelled()?;

        self.tracker.transition(PassState::Rewriting)?;
        let catalog = Arc::clone(&self.catalog);
        let options = self.config.rewrite_options();
        let (project, mut rewrites) = tokio::task::spawn_blocking(move || {
            let rewrites = rewrite_project(&project, &catalog, &options);
            (project, rewrites)
        })
        .await
        .map_err(|e| MigrationError::Task(e.to_string()))?;
        self.check_cancelled()?;

        let staged = self.stage_files(&project, &mut rewrites).await;

        self.tracker.transition(PassState::Reporting)?;
        let mut report =
            build_report(&project, &classification, &rewrites, &file_failures, &warnings);
        let mut summary_path = self.write_summary(&report).await?;

        let pending = staged.len();
        let files_written = self.commit_files(&mut rewrites, staged).await;
        if files_written.len() < pending {
            // failed writes turned migrated items into failures
            report = build_report(&project, &classification, &rewrites, &file_failures, &warnings);
            summary_path = self.write_summary(&report).await?;
        }

        self.tracker.transition(PassState::Done)?;
        Ok(MigrationResult {
            report,
            files_written,
            summary_path,
        })
    }

    fn check_cancelled(&self) -> Result<(), MigrationError> {
        if self.cancel.is_cancelled() {
            tracing::warn!("cancellation requested during {:?}", self.tracker.current());
            Err(MigrationError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Scan every source file; merged in path order
    async fn scan_all(
        &self,
    ) -> Result<(Vec<ScannedFile>, Vec<FileFailure>, Vec<Warning>), MigrationError> {
        let paths = self
            .store
            .list(&self.config.extensions, &self.config.exclude_dirs)
            .await?;
        tracing::info!("scanning {} file(s)", paths.len());

        let registry = Arc::new(default_parsers());
        let scanner = Arc::new(
            Scanner::new(Arc::clone(&self.catalog)).with_pragma_window(self.config.pragma_window),
        );

        let results: Vec<ScanOutcome> = stream::iter(paths)
            .map(|path| self.scan_file(path, Arc::clone(&registry), Arc::clone(&scanner)))
            .buffered(self.config.max_parallel_files)
            .collect()
            .await;

        let mut scanned = Vec::new();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        for result in results {
            match result {
                ScanOutcome::Scanned(file) => scanned.push(file),
                ScanOutcome::Skipped { failure, warning } => {
                    failures.push(failure);
                    warnings.push(warning);
                }
                ScanOutcome::Cancelled => return Err(MigrationError::Cancelled),
            }
        }
        tracing::info!(
            "scan complete: {} file(s) scanned, {} skipped",
            scanned.len(),
            failures.len()
        );
        Ok((scanned, failures, warnings))
    }

    async fn scan_file(
        &self,
        path: PathBuf,
        registry: Arc<ParserRegistry>,
        scanner: Arc<Scanner>,
    ) -> ScanOutcome {
        if self.cancel.is_cancelled() {
            return ScanOutcome::Cancelled;
        }

        let source = match self.store.read(&path).await {
            Ok(source) => source,
            Err(e) => return ScanOutcome::skipped(&path, e.to_string()),
        };

        let timeout = Duration::from_millis(self.config.file_timeout_ms);
        let task_path = path.clone();
        let task = tokio::task::spawn_blocking(move || {
            scanner.scan_source(&registry, &task_path, &source)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(file))) => ScanOutcome::Scanned(file),
            Ok(Ok(Err(e))) => ScanOutcome::skipped(&path, e.to_string()),
            Ok(Err(e)) => ScanOutcome::skipped(&path, format!("scan task failed: {e}")),
            Err(_) => ScanOutcome::skipped(
                &path,
                format!("scan timed out after {}ms", self.config.file_timeout_ms),
            ),
        }
    }

    async fn write_summary(&self, report: &MigrationReport) -> Result<PathBuf, MigrationError> {
        let json = report.to_json()?;
        self.store
            .write_summary(&self.config.summary_path, &json)
            .await
            .map_err(|source| MigrationError::Summary {
                path: self.config.summary_path.clone(),
                source,
            })
    }

    /// Patched text of every file still matching its scan
    ///
    /// A file edited since it was scanned gets none of its patches. Nothing
    /// is written here.
    async fn stage_files(
        &self,
        project: &Project,
        rewrites: &mut [FileRewrite],
    ) -> Vec<StagedFile> {
        let mut staged = Vec::new();
        if self.config.dry_run {
            let pending = rewrites.iter().filter(|r| !r.patches.is_empty()).count();
            tracing::info!("dry run: {} file(s) would be patched", pending);
            return staged;
        }

        let files = project.files().iter().zip(rewrites.iter_mut());
        for (index, (file, rewrite)) in files.enumerate() {
            if rewrite.patches.is_empty() {
                continue;
            }

            let unchanged = match self.store.read(&file.path).await {
                Ok(current) => !file.hash.differs_from(current.as_bytes()),
                Err(e) => {
                    tracing::warn!("cannot re-read {}: {}", file.path.display(), e);
                    false
                }
            };
            if !unchanged {
                tracing::warn!(
                    "{} changed since it was scanned, not patching",
                    file.path.display()
                );
                rewrite.fail_all(&RewriteFailure::ConcurrentModification);
                continue;
            }

            staged.push(StagedFile {
                index,
                path: file.path.clone(),
                text: rewrite.apply(&file.source),
            });
        }
        staged
    }

    /// Write staged files; a file that fails keeps its original text
    async fn commit_files(
        &self,
        rewrites: &mut [FileRewrite],
        staged: Vec<StagedFile>,
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for file in staged {
            let rewrite = &mut rewrites[file.index];
            match self.store.write(&file.path, &file.text).await {
                Ok(()) => {
                    tracing::debug!(
                        "patched {} ({} patch(es))",
                        file.path.display(),
                        rewrite.patches.len()
                    );
                    written.push(file.path);
                }
                Err(e) => {
                    tracing::warn!("write failed for {}: {}", file.path.display(), e);
                    rewrite.fail_all(&RewriteFailure::WriteFailed(e.to_string()));
                }
            }
        }
        written
    }
}

/// Patched text waiting for the summary to land
struct StagedFile {
    /// Position in the project's file list
    index: usize,
    path: PathBuf,
    text: String,
}

fn build_report(
    project: &Project,
    classification: &Classification,
    rewrites: &[FileRewrite],
    file_failures: &[FileFailure],
    scan_warnings: &[Warning],
) -> MigrationReport {
    let mut warnings = scan_warnings.to_vec();
    warnings.extend(project.warnings().iter().cloned());
    warnings.extend(classification.warnings.iter().cloned());
    let mut outcomes: Vec<FindingOutcome> = Vec::new();
    for rewrite in rewrites {
        warnings.extend(rewrite.warnings.iter().cloned());
        for outcome in &rewrite.outcomes {
            warnings.extend(outcome.warnings.iter().cloned());
            outcomes.push(outcome.clone());
        }
    }
    build(
        project.findings(),
        &outcomes,
        file_failures,
        &classification.bindings,
        warnings,
    )
}
