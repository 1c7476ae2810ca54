//! Choosing the engine's artifact among the files it left behind
//!
//! The engine may write logs, intermediates and partial PDFs next to the
//! result, and its naming is not a contract. Selection here is a pure function
//! over `(path, mtime)` pairs so it can be tested without a filesystem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::language::OutputMode;

/// Extension of engine artifacts
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Stem used when the upload's filename has none
pub const PLACEHOLDER_STEM: &str = "document";

/// A file found in the workspace after the engine exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl OutputCandidate {
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Lowercased basename
    fn name_lower(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Order candidates most recent first.
///
/// Equal timestamps fall back to path order so the result never depends on
/// directory iteration order.
pub fn sort_by_recency(candidates: &mut [OutputCandidate]) {
    candidates.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
}

/// Pick the artifact for `mode` from candidates sorted by [`sort_by_recency`].
///
/// 1. Drop candidates named like the source file (case-insensitive), unless
///    that would drop all of them.
/// 2. Prefer the most recent candidate whose name carries a marker for
///    `mode` (`dual`/`bilingual` or `mono`/`translated`).
/// 3. Otherwise take the most recent remaining candidate.
pub fn select_output<'a>(
    candidates: &'a [OutputCandidate],
    source_name: &str,
    mode: OutputMode,
) -> Option<&'a OutputCandidate> {
    let source_name = source_name.to_lowercase();

    let mut remaining: Vec<&OutputCandidate> = candidates
        .iter()
        .filter(|c| c.name_lower() != source_name)
        .collect();
    if remaining.is_empty() {
        remaining = candidates.iter().collect();
    }

    let markers = mode.name_markers();
    remaining
        .iter()
        .copied()
        .find(|c| {
            let name = c.name_lower();
            markers.iter().any(|marker| name.contains(marker))
        })
        .or_else(|| remaining.first().copied())
}

/// Filename returned to the caller: `<source-stem>.<mode-suffix>.pdf`
pub fn output_filename(source_filename: &str, mode: OutputMode) -> String {
    // Both separators count, whatever the host platform
    let basename = source_filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = Path::new(basename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_STEM.to_string());

    format!("{}.{}.{}", stem, mode.suffix(), ARTIFACT_EXTENSION)
}
