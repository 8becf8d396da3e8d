//! Project arena
//!
//! All findings of a pass live in one vector indexed by [`FindingId`]; files
//! refer to their findings by index range. Files are kept in path order so
//! every later phase is deterministic regardless of scan completion order.

use std::ops::Range;
use std::path::PathBuf;

use flagshift_catalog::{Finding, FindingId, FindingKind, PackageRole, PluginKind};
use flagshift_scanner::{ContentHash, PluginUse, ScannedFile};

use crate::warning::{Warning, WarningCode};

/// One scanned file in the arena
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub source: String,
    pub hash: ContentHash,
    /// Index range of this file's findings
    pub findings: Range<usize>,
    pub plugins: Vec<PluginUse>,
    pub mixed_variants: bool,
}

impl ProjectFile {
    /// Ids of the file's findings in discovery order
    pub fn finding_ids(&self) -> impl Iterator<Item = FindingId> + '_ {
        self.findings.clone().map(FindingId)
    }

    /// Observability add-ons imported by the file
    #[must_use]
    pub fn observability_imports(&self, findings: &[Finding]) -> Vec<PluginKind> {
        let mut kinds = Vec::new();
        for finding in &findings[self.findings.clone()] {
            if let Some(import) = finding.import() {
                if let PackageRole::Observability(kind) = import.role {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
            }
        }
        kinds
    }
}

/// Findings and files of one pass
#[derive(Debug, Clone, Default)]
pub struct Project {
    files: Vec<ProjectFile>,
    findings: Vec<Finding>,
    warnings: Vec<Warning>,
}

impl Project {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from scan results, ordered by path
    #[must_use]
    pub fn from_scanned(scanned: impl IntoIterator<Item = ScannedFile>) -> Self {
        let mut files: Vec<ScannedFile> = scanned.into_iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut project = Self::new();
        for file in files {
            project.add_file(file);
        }
        project
    }

    /// Append a scanned file
    pub fn add_file(&mut self, file: ScannedFile) {
        for pragma in &file.orphan_pragmas {
            self.warnings.push(
                Warning::new(
                    WarningCode::OrphanPragma,
                    format!(
                        "pragma naming {} is not followed by an experiment or layer fetch",
                        pragma.names.join(", ")
                    ),
                )
                .at(&pragma.location),
            );
        }

        let start = self.findings.len();
        self.findings.extend(file.findings);
        self.files.push(ProjectFile {
            path: file.path,
            source: file.source,
            hash: file.hash,
            findings: start..self.findings.len(),
            plugins: file.plugins,
            mixed_variants: file.mixed_variants,
        });
    }

    #[inline]
    #[must_use]
    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Mutable findings for the classifier
    #[inline]
    pub fn findings_mut(&mut self) -> &mut [Finding] {
        &mut self.findings
    }

    #[inline]
    #[must_use]
    pub fn finding(&self, id: FindingId) -> Option<&Finding> {
        self.findings.get(id.0)
    }

    /// Warnings raised while assembling the project
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of findings of a kind
    #[must_use]
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }
}
