//! Operator configuration for the engine and the rate limiter

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Default engine executable, resolved through `PATH`
pub const DEFAULT_ENGINE_BIN: &str = "babeldoc";

/// Default wall-clock bound for one engine run
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 900;

/// Settings for driving the external translation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable name or path
    pub binary: String,
    /// Hard timeout for one run; the child is killed once it elapses
    pub timeout: Duration,
    /// Operator-supplied arguments appended after the structured ones
    pub extra_args: Vec<String>,
    /// Directory under which per-job workspaces are created
    pub work_root: PathBuf,
    /// Upstream model credentials passed through to the engine
    pub credentials: EngineCredentials,
}

/// Optional upstream API settings; empty values are never exported
#[derive(Debug, Clone, Default)]
pub struct EngineCredentials {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_ENGINE_BIN.to_string(),
            timeout: Duration::from_secs(DEFAULT_ENGINE_TIMEOUT_SECS),
            extra_args: Vec::new(),
            work_root: PathBuf::from(".tmp").join("babeldoc-jobs"),
            credentials: EngineCredentials::default(),
        }
    }
}

impl EngineConfig {
    /// Replace the extra arguments with `raw` split by shell-quoting rules.
    ///
    /// Blank input clears them. Unbalanced quotes are rejected.
    pub fn with_extra_args(mut self, raw: &str) -> Result<Self, EngineError> {
        self.extra_args = split_extra_args(raw)?;
        Ok(self)
    }
}

impl EngineCredentials {
    /// Environment variables to set on the child process
    pub fn env_overlay(&self) -> Vec<(&'static str, String)> {
        [
            ("OPENAI_API_KEY", &self.api_key),
            ("OPENAI_BASE_URL", &self.base_url),
            ("OPENAI_MODEL", &self.model),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name, value.clone()))
        .collect()
    }
}

fn split_extra_args(raw: &str) -> Result<Vec<String>, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    shlex::split(raw).ok_or_else(|| {
        EngineError::InvalidConfig(format!("cannot split extra arguments: {}", raw))
    })
}

/// Fixed-window quota shared by every client identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(600),
            max_requests: 4,
        }
    }
}
