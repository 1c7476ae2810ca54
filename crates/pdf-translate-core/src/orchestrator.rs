//! Translation job orchestration
//!
//! One call to [`Orchestrator::translate`] owns one workspace from creation to
//! removal:
//!
//! 1. Reject empty input
//! 2. Create a `job-*` directory under the work root
//! 3. Persist the upload under its sanitized basename
//! 4. Validate language tokens and build the engine command
//! 5. Run the engine with a hard timeout
//! 6. Scan the workspace and pick the artifact for the requested mode
//!
//! The workspace is dropped on every return path, which deletes it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::language::OutputMode;
use crate::process::{EngineInvocation, EngineRunner, TokioEngineRunner};
use crate::resolve::{output_filename, select_output};
use crate::workspace::Workspace;

/// Everything needed to translate one uploaded PDF
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub source_bytes: Vec<u8>,
    /// Filename as supplied by the caller; may contain directory parts
    pub source_filename: String,
    pub source_lang: String,
    pub target_lang: String,
    pub mode: OutputMode,
}

/// The resolved artifact and the name to serve it under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Drives the external engine for translation jobs.
///
/// Cheap to clone; clones share the configuration and runner.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    runner: Arc<dyn EngineRunner>,
}

impl Orchestrator {
    /// Orchestrator that spawns the configured engine binary
    pub fn new(config: EngineConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioEngineRunner))
    }

    pub fn with_runner(config: EngineConfig, runner: Arc<dyn EngineRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Translate one PDF. See the module docs for the steps.
    pub async fn translate(&self, job: TranslationJob) -> Result<TranslationOutput, EngineError> {
        if job.source_bytes.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let workspace = Workspace::create(&self.config.work_root).await?;
        let result = self.run_in(&workspace, &job).await;

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close().await {
            warn!("Failed to remove workspace {}: {}", workspace_path.display(), e);
        }

        result
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        job: &TranslationJob,
    ) -> Result<TranslationOutput, EngineError> {
        let source_pdf = workspace
            .write_source(&job.source_filename, &job.source_bytes)
            .await?;

        let invocation = EngineInvocation::build(
            &self.config,
            &source_pdf,
            workspace.path(),
            &job.source_lang,
            &job.target_lang,
            job.mode,
        )?;

        info!(
            "Translation job started: workspace={}, {} -> {}, mode={}",
            workspace.path().display(),
            job.source_lang,
            job.target_lang,
            job.mode
        );
        debug!(
            "Engine command: {} {}",
            invocation.program,
            invocation.args_lossy().join(" ")
        );

        let outcome = self.runner.run(&invocation).await?;
        if let Err(e) = outcome.into_result(&invocation) {
            warn!("Engine run failed: {}", e);
            return Err(e);
        }

        let candidates = workspace.collect_candidates().await?;
        let source_name = source_pdf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("Found {} output candidate(s)", candidates.len());
        let chosen = select_output(&candidates, &source_name, job.mode).ok_or_else(|| {
            warn!("Engine exited cleanly but left no PDF in the workspace");
            EngineError::NoOutput
        })?;
        debug!("Selected artifact {}", chosen.path.display());

        let bytes = tokio::fs::read(&chosen.path).await?;
        Ok(TranslationOutput {
            bytes,
            filename: output_filename(&job.source_filename, job.mode),
        })
    }
}
