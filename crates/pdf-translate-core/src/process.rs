//! Engine command construction and bounded subprocess execution
//!
//! The engine is an opaque executable. This module turns a job into an
//! [`EngineInvocation`], runs it with a hard timeout and reports what happened
//! as a [`ProcessOutcome`]. Mapping outcomes onto [`EngineError`] is kept
//! separate in [`ProcessOutcome::into_result`] so every case is handled in one
//! exhaustive match.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::language::{is_valid_language_token, OutputMode};

/// Fallback detail when a failed run printed nothing
const GENERIC_EXIT_DETAIL: &str = "BabelDOC returned non-zero exit code.";

/// Fully resolved command for one engine run
#[derive(Debug, Clone)]
pub struct EngineInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Variables set on top of the inherited environment
    pub env: Vec<(&'static str, String)>,
    pub current_dir: PathBuf,
    pub timeout: Duration,
}

impl EngineInvocation {
    /// Build the command line for translating `source_pdf` inside `working_dir`.
    ///
    /// Language tokens are validated first; nothing is built (and therefore
    /// nothing can be spawned) for a token outside the engine-safe alphabet.
    pub fn build(
        config: &EngineConfig,
        source_pdf: &Path,
        working_dir: &Path,
        source_lang: &str,
        target_lang: &str,
        mode: OutputMode,
    ) -> Result<Self, EngineError> {
        if !is_valid_language_token(source_lang) || !is_valid_language_token(target_lang) {
            return Err(EngineError::InvalidLanguageToken);
        }

        let mut args: Vec<OsString> = vec![
            source_pdf.as_os_str().to_owned(),
            "--lang-in".into(),
            source_lang.into(),
            "--lang-out".into(),
            target_lang.into(),
            "--working-dir".into(),
            working_dir.as_os_str().to_owned(),
            mode.engine_flag().into(),
        ];
        args.extend(config.extra_args.iter().map(OsString::from));

        Ok(Self {
            program: config.binary.clone(),
            args,
            env: config.credentials.env_overlay(),
            current_dir: working_dir.to_path_buf(),
            timeout: config.timeout,
        })
    }

    /// Arguments rendered as text, for logs and assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Result of one bounded engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success {
        stdout: String,
        stderr: String,
    },
    TimedOut,
    NotFound,
    NonZeroExit {
        /// `None` when the process was terminated by a signal
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ProcessOutcome {
    /// Classify the outcome of running `invocation`
    pub fn into_result(self, invocation: &EngineInvocation) -> Result<(), EngineError> {
        match self {
            ProcessOutcome::Success { .. } => Ok(()),
            ProcessOutcome::NotFound => {
                Err(EngineError::BinaryNotFound(invocation.program.clone()))
            }
            ProcessOutcome::TimedOut => Err(EngineError::TimedOut(invocation.timeout.as_secs())),
            ProcessOutcome::NonZeroExit { stdout, stderr, .. } => {
                let detail = [stderr.trim(), stdout.trim()]
                    .into_iter()
                    .find(|text| !text.is_empty())
                    .unwrap_or(GENERIC_EXIT_DETAIL);
                Err(EngineError::NonZeroExit(detail.to_string()))
            }
        }
    }
}

/// Something that can execute an [`EngineInvocation`]
#[async_trait]
pub trait EngineRunner: Send + Sync {
    /// Run to completion or until the invocation's timeout elapses.
    ///
    /// Only unexpected spawn or wait failures surface as `Err`; a missing
    /// executable is reported as [`ProcessOutcome::NotFound`].
    async fn run(&self, invocation: &EngineInvocation) -> std::io::Result<ProcessOutcome>;
}

/// Runs the engine as a real child process
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioEngineRunner;

#[async_trait]
impl EngineRunner for TokioEngineRunner {
    async fn run(&self, invocation: &EngineInvocation) -> std::io::Result<ProcessOutcome> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .envs(invocation.env.iter().map(|(name, value)| (*name, value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProcessOutcome::NotFound);
            }
            Err(e) => return Err(e),
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_elapsed) => return Ok(ProcessOutcome::TimedOut),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ProcessOutcome::Success { stdout, stderr })
        } else {
            Ok(ProcessOutcome::NonZeroExit {
                code: output.status.code(),
                stdout,
                stderr,
            })
        }
    }
}
