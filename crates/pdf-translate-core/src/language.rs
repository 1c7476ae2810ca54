//! Output modes and language-token validation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which PDF the engine should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Translated text only
    Translated,
    /// Source and translated text interleaved
    #[default]
    Bilingual,
}

impl OutputMode {
    /// Suffix used in the returned filename (`<stem>.<suffix>.pdf`)
    pub fn suffix(self) -> &'static str {
        match self {
            OutputMode::Translated => "translated",
            OutputMode::Bilingual => "bilingual",
        }
    }

    /// Engine flag suppressing the other artifact
    pub fn engine_flag(self) -> &'static str {
        match self {
            OutputMode::Translated => "--no-dual",
            OutputMode::Bilingual => "--no-mono",
        }
    }

    /// Lowercase filename fragments that mark this mode's artifact
    pub fn name_markers(self) -> &'static [&'static str] {
        match self {
            OutputMode::Translated => &["mono", "translated"],
            OutputMode::Bilingual => &["dual", "bilingual"],
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Error for an unrecognized output mode string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown output mode '{0}'. Must be 'translated' or 'bilingual'")]
pub struct ParseOutputModeError(pub String);

impl FromStr for OutputMode {
    type Err = ParseOutputModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "translated" => Ok(OutputMode::Translated),
            "bilingual" => Ok(OutputMode::Bilingual),
            other => Err(ParseOutputModeError(other.to_string())),
        }
    }
}

/// Check a language token against the engine-safe alphabet.
///
/// Accepts ASCII letters, digits and `-`, with at least one letter or digit.
/// A leading `-` is refused so the token can never parse as an engine flag.
pub fn is_valid_language_token(token: &str) -> bool {
    if token.starts_with('-') {
        return false;
    }

    let mut has_alnum = false;
    for c in token.chars() {
        if c.is_ascii_alphanumeric() {
            has_alnum = true;
        } else if c != '-' {
            return false;
        }
    }
    has_alnum
}
