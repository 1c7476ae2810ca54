//! PDF translation through an external layout-preserving engine
//!
//! This crate drives the BabelDOC command-line engine for single uploaded PDFs
//! and provides the request-side guards the HTTP service needs.
//!
//! - [`Orchestrator`]: one isolated workspace and one bounded engine run per job
//! - [`RateLimiter`]: fixed-window quota keyed by [`client_id::identify`]

pub mod client_id;
pub mod config;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod process;
pub mod rate_limit;
pub mod resolve;
pub mod workspace;

pub use client_id::identify;
pub use config::{EngineConfig, EngineCredentials, RateLimitConfig};
pub use error::EngineError;
pub use language::{is_valid_language_token, OutputMode, ParseOutputModeError};
pub use orchestrator::{Orchestrator, TranslationJob, TranslationOutput};
pub use process::{EngineInvocation, EngineRunner, ProcessOutcome, TokioEngineRunner};
pub use rate_limit::{BucketStore, InMemoryBucketStore, RateLimitDecision, RateLimiter};
