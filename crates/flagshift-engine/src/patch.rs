//! Rewrite patches
//!
//! A [`RewritePatch`] realises one finding. Patches of a file are collected in
//! a [`PatchSet`] which rejects overlaps instead of merging them, then applied
//! back to front in one pass.

use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use flagshift_catalog::{FindingId, Location};

use crate::error::RewriteFailure;

/// Additional replacement belonging to a patch (closing tags, accessor reads)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Text replacement realising one finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewritePatch {
    pub finding: FindingId,
    pub location: Location,
    pub original_text: String,
    pub replacement_text: String,
    pub extra_edits: Vec<TextEdit>,
}

impl RewritePatch {
    /// Patch replacing `location` in `source`
    #[must_use]
    pub fn new(
        finding: FindingId,
        location: Location,
        source: &str,
        replacement: impl Into<String>,
    ) -> Self {
        let original_text = source
            .get(location.span.clone())
            .unwrap_or_default()
            .to_string();
        Self {
            finding,
            location,
            original_text,
            replacement_text: replacement.into(),
            extra_edits: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_edit(mut self, span: Range<usize>, replacement: impl Into<String>) -> Self {
        self.extra_edits.push(TextEdit {
            span,
            replacement: replacement.into(),
        });
        self
    }

    /// Every byte range this patch touches
    pub fn spans(&self) -> impl Iterator<Item = &Range<usize>> + '_ {
        std::iter::once(&self.location.span).chain(self.extra_edits.iter().map(|e| &e.span))
    }

    /// Check every span against the text the patch will be applied to
    ///
    /// # Errors
    ///
    /// Returns [`RewriteFailure::InvalidSpan`] for a span past the end of
    /// `source` or off a character boundary, and
    /// [`RewriteFailure::PatchOverlap`] when two edits of the patch collide.
    pub fn validate(&self, source: &str) -> Result<(), RewriteFailure> {
        if let Some(bad) = self.spans().find(|span| !fits(span, source)) {
            return Err(RewriteFailure::InvalidSpan {
                start: bad.start,
                end: bad.end,
            });
        }
        let spans: Vec<&Range<usize>> = self.spans().collect();
        for (i, a) in spans.iter().enumerate() {
            if spans[i + 1..].iter().any(|b| a.start < b.end && b.start < a.end) {
                return Err(RewriteFailure::PatchOverlap {
                    other: self.finding,
                    location: self.location.clone(),
                });
            }
        }
        Ok(())
    }

    fn overlaps(&self, other: &RewritePatch) -> bool {
        self.spans()
            .any(|a| other.spans().any(|b| a.start < b.end && b.start < a.end))
    }
}

/// Non-overlapping patches of one file, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSet {
    file: PathBuf,
    patches: Vec<RewritePatch>,
}

impl PatchSet {
    #[inline]
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            patches: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Add a patch for `source` unless it is malformed or overlaps one
    /// already accepted
    ///
    /// # Errors
    ///
    /// As [`RewritePatch::validate`], and [`RewriteFailure::PatchOverlap`]
    /// naming the earlier patch.
    pub fn insert(&mut self, patch: RewritePatch, source: &str) -> Result<(), RewriteFailure> {
        patch.validate(source)?;
        if let Some(existing) = self.patches.iter().find(|p| p.overlaps(&patch)) {
            return Err(RewriteFailure::PatchOverlap {
                other: existing.finding,
                location: existing.location.clone(),
            });
        }
        self.patches.push(patch);
        Ok(())
    }

    /// Drop the patch of a finding (used when a file cannot be written)
    pub fn remove(&mut self, finding: FindingId) -> Option<RewritePatch> {
        let index = self.patches.iter().position(|p| p.finding == finding)?;
        Some(self.patches.remove(index))
    }

    #[inline]
    #[must_use]
    pub fn patches(&self) -> &[RewritePatch] {
        &self.patches
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Apply every patch to `source`, the text they were inserted against
    #[must_use]
    pub fn apply(&self, source: &str) -> String {
        let mut edits: Vec<(&Range<usize>, &str)> = Vec::new();
        for patch in &self.patches {
            edits.push((&patch.location.span, &patch.replacement_text));
            for edit in &patch.extra_edits {
                edits.push((&edit.span, &edit.replacement));
            }
        }
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));

        let mut out = source.to_string();
        for (span, replacement) in edits {
            let valid = fits(span, &out);
            debug_assert!(valid, "span {span:?} was not validated against this source");
            if valid {
                out.replace_range(span.clone(), replacement);
            }
        }
        out
    }
}

fn fits(span: &Range<usize>, source: &str) -> bool {
    span.start <= span.end
        && span.end <= source.len()
        && source.is_char_boundary(span.start)
        && source.is_char_boundary(span.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "a(checkGate('x')); b(checkGate('y'));";

    fn patch(id: usize, span: Range<usize>, replacement: &str) -> RewritePatch {
        RewritePatch::new(
            FindingId(id),
            Location::new("src/a.js", span.clone(), 1, span.start + 1),
            SOURCE,
            replacement,
        )
    }

    #[test]
    fn patches_apply_back_to_front() {
        let mut set = PatchSet::new("src/a.js");
        set.insert(patch(0, 2..16, "v('x', false)"), SOURCE).unwrap();
        set.insert(patch(1, 21..35, "v('y', false)"), SOURCE).unwrap();
        assert_eq!(set.patches()[0].original_text, "checkGate('x')");
        assert_eq!(set.apply(SOURCE), "a(v('x', false)); b(v('y', false));");
    }

    #[test]
    fn overlapping_patch_is_rejected() {
        let mut set = PatchSet::new("src/a.js");
        set.insert(patch(0, 0..17, "z"), SOURCE).unwrap();
        let err = set.insert(patch(1, 2..16, "q"), SOURCE).unwrap_err();
        assert!(matches!(err, RewriteFailure::PatchOverlap { other: FindingId(0), .. }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn extra_edits_count_for_overlap_and_apply() {
        let mut set = PatchSet::new("src/a.js");
        set.insert(patch(0, 0..1, "A").with_edit(19..20, "B"), SOURCE).unwrap();
        assert!(set.insert(patch(1, 19..20, "C"), SOURCE).is_err());
        assert_eq!(set.apply(SOURCE), "A(checkGate('x')); B(checkGate('y'));");
        assert!(set.remove(FindingId(0)).is_some());
        assert!(set.is_empty());
    }

    #[test]
    fn malformed_spans_are_rejected_at_insert() {
        let mut set = PatchSet::new("src/a.js");
        let past_end = set.insert(patch(0, 30..40, "x"), SOURCE).unwrap_err();
        assert_eq!(past_end, RewriteFailure::InvalidSpan { start: 30, end: 40 });

        let text = "é = checkGate('x');";
        let location = Location::new("src/a.js", 1..3, 1, 2);
        let split = RewritePatch::new(FindingId(1), location, text, "v");
        assert!(matches!(
            set.insert(split, text),
            Err(RewriteFailure::InvalidSpan { start: 1, end: 3 })
        ));

        let self_overlap = patch(2, 2..16, "v").with_edit(10..12, "w");
        assert!(matches!(
            set.insert(self_overlap, SOURCE),
            Err(RewriteFailure::PatchOverlap { other: FindingId(2), .. })
        ));

        assert!(set.is_empty());
        assert_eq!(set.apply(SOURCE), SOURCE);
    }
}
