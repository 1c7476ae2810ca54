//! Per-job scratch directories
//!
//! A [`Workspace`] owns a uniquely named directory under the configured root.
//! The directory is removed when the workspace is dropped, so every exit path
//! out of a job (including panics and cancelled futures) releases it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::resolve::{sort_by_recency, OutputCandidate, ARTIFACT_EXTENSION};

/// Name used when the upload's filename has no usable basename
pub const PLACEHOLDER_SOURCE_NAME: &str = "source.pdf";

/// Prefix of every job directory under the work root
pub const JOB_DIR_PREFIX: &str = "job-";

/// Scratch directory for exactly one translation job
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh job directory under `root`, creating `root` if needed
    pub async fn create(root: &Path) -> io::Result<Self> {
        let root = root.to_path_buf();
        let dir = run_blocking(move || {
            fs::create_dir_all(&root)?;
            tempfile::Builder::new()
                .prefix(JOB_DIR_PREFIX)
                .tempdir_in(&root)
        })
        .await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persist the uploaded bytes under the sanitized upload name
    pub async fn write_source(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(sanitize_source_name(filename));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Every artifact-extension regular file below the workspace, most recent first
    pub async fn collect_candidates(&self) -> io::Result<Vec<OutputCandidate>> {
        let root = self.dir.path().to_path_buf();
        run_blocking(move || {
            let mut candidates = Vec::new();
            collect_into(&root, &mut candidates)?;
            sort_by_recency(&mut candidates);
            Ok(candidates)
        })
        .await
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    ///
    /// Removal runs off the async workers; if this future is dropped first the
    /// directory is still removed when the blocking task finishes.
    pub async fn close(self) -> io::Result<()> {
        let dir = self.dir;
        run_blocking(move || dir.close()).await
    }
}

/// Run filesystem work on the blocking pool so large trees do not stall the runtime
async fn run_blocking<T, F>(work: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn collect_into(dir: &Path, out: &mut Vec<OutputCandidate>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // file_type() does not follow symlinks; links are neither walked nor returned
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            collect_into(&path, out)?;
        } else if file_type.is_file() && has_artifact_extension(&path) {
            let modified = entry.metadata()?.modified()?;
            out.push(OutputCandidate::new(path, modified));
        }
    }
    Ok(())
}

fn has_artifact_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
        .unwrap_or(false)
}

/// Basename of a caller-supplied filename, with directory parts removed
pub fn sanitize_source_name(filename: &str) -> String {
    // Uploads from Windows clients may use backslash separators
    let last = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    Path::new(last)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_SOURCE_NAME.to_string())
}
