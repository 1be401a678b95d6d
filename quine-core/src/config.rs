//! Runtime configuration sourced from the process environment.
//!
//! Every variable lives under the `QUINE_` namespace. Children created by
//! the fork executor and replacements created by the exec executor receive
//! their configuration through these same variables, so the constant names
//! here are the single source of truth for both readers and writers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::session;
use crate::wisdom::Wisdom;

/// Model identifier.
pub const ENV_MODEL: &str = "QUINE_MODEL";
/// Provider dialect: `openai` or `anthropic`.
pub const ENV_API_TYPE: &str = "QUINE_API_TYPE";
/// API base URL override.
pub const ENV_API_BASE: &str = "QUINE_API_BASE";
/// API credential.
pub const ENV_API_KEY: &str = "QUINE_API_KEY";
/// Maximum recursion depth before fork is refused.
pub const ENV_MAX_DEPTH: &str = "QUINE_MAX_DEPTH";
/// Recursion depth of this process.
pub const ENV_DEPTH: &str = "QUINE_DEPTH";
/// Session identifier. Never set for forked children; they generate their own.
pub const ENV_SESSION_ID: &str = "QUINE_SESSION_ID";
/// Session identifier of the process that created this one.
pub const ENV_PARENT_SESSION: &str = "QUINE_PARENT_SESSION";
/// Maximum concurrent inference slots across the process tree.
pub const ENV_MAX_CONCURRENT: &str = "QUINE_MAX_CONCURRENT";
/// Per-command shell timeout in seconds.
pub const ENV_SHELL_TIMEOUT_SECS: &str = "QUINE_SHELL_TIMEOUT_SECS";
/// Byte threshold above which captured shell output is truncated.
pub const ENV_TRUNCATE_BYTES: &str = "QUINE_TRUNCATE_BYTES";
/// Directory for audit logs, operational logs, and concurrency locks.
pub const ENV_DATA_DIR: &str = "QUINE_DATA_DIR";
/// Path to the shell executable for the persistent shell.
pub const ENV_SHELL: &str = "QUINE_SHELL";
/// Maximum shell turns (0 = unlimited).
pub const ENV_MAX_TURNS: &str = "QUINE_MAX_TURNS";
/// Context window size in tokens, used for budget hints.
pub const ENV_CONTEXT_WINDOW: &str = "QUINE_CONTEXT_WINDOW";
/// Original mission string, preserved across exec.
pub const ENV_MISSION: &str = "QUINE_MISSION";
/// Byte offset into stdin at which a replacement process resumes.
pub const ENV_STDIN_OFFSET: &str = "QUINE_STDIN_OFFSET";
/// Optional persona adopted by a replacement process.
pub const ENV_PERSONA: &str = "QUINE_PERSONA";
/// Prefix for wisdom variables; the suffix becomes the wisdom key.
pub const ENV_WISDOM_PREFIX: &str = "QUINE_WISDOM_";

/// Which wire dialect the LLM endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// OpenAI-style chat completions.
    OpenAi,
    /// Anthropic-style messages.
    Anthropic,
}

impl ApiFlavor {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    /// The `QUINE_API_TYPE` value naming this flavor.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Errors produced while reading configuration from the environment.
///
/// All of these are usage errors: the process exits with code 2.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is present but unparseable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Complete runtime configuration for one agent process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Provider wire dialect.
    pub flavor: ApiFlavor,
    /// API base URL (None = provider default).
    pub api_base: Option<String>,
    /// API credential.
    pub api_key: String,
    /// Recursion depth of this process (0 for a root or replaced agent).
    pub depth: u32,
    /// Depth at which fork is refused.
    pub max_depth: u32,
    /// This session's identifier.
    pub session_id: String,
    /// The creating session's identifier, if any.
    pub parent_session: Option<String>,
    /// Concurrency semaphore capacity.
    pub max_concurrent: u32,
    /// Per-command shell timeout.
    pub shell_timeout: Duration,
    /// Captured-output truncation threshold in bytes.
    pub truncate_bytes: usize,
    /// Data directory for audit logs, op logs, stdin captures, and locks.
    pub data_dir: PathBuf,
    /// Shell executable for the persistent shell.
    pub shell_path: PathBuf,
    /// Shell-turn budget (0 = unlimited).
    pub max_turns: u32,
    /// Context window size in tokens.
    pub context_window: u64,
    /// Original mission string, if carried in the environment.
    pub mission: Option<String>,
    /// Stdin byte offset to resume at.
    pub stdin_offset: u64,
    /// Persona adopted across exec, if any.
    pub persona: Option<String>,
    /// Wisdom carried in from the environment.
    pub wisdom: Wisdom,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `QUINE_MODEL` and `QUINE_API_KEY` are required. A missing
    /// `QUINE_SESSION_ID` is not an error: a fresh identifier is generated,
    /// which is exactly what forked children rely on.
    pub fn from_env() -> Result<Self, ConfigError> {
        let model = require(ENV_MODEL)?;
        let api_key = require(ENV_API_KEY)?;
        let flavor = match optional(ENV_API_TYPE) {
            None => ApiFlavor::Anthropic,
            Some(raw) => ApiFlavor::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                name: ENV_API_TYPE,
                reason: format!("expected openai or anthropic, got {raw:?}"),
            })?,
        };

        Ok(Self {
            model,
            flavor,
            api_base: optional(ENV_API_BASE),
            api_key,
            depth: parsed(ENV_DEPTH, 0)?,
            max_depth: parsed(ENV_MAX_DEPTH, 8)?,
            session_id: optional(ENV_SESSION_ID).unwrap_or_else(session::new_session_id),
            parent_session: optional(ENV_PARENT_SESSION),
            max_concurrent: parsed(ENV_MAX_CONCURRENT, 4)?,
            shell_timeout: Duration::from_secs(parsed(ENV_SHELL_TIMEOUT_SECS, 300u64)?),
            truncate_bytes: parsed(ENV_TRUNCATE_BYTES, 51_200usize)?,
            data_dir: optional(ENV_DATA_DIR).map(PathBuf::from).unwrap_or_else(default_data_dir),
            shell_path: PathBuf::from(optional(ENV_SHELL).unwrap_or_else(|| "/bin/bash".into())),
            max_turns: parsed(ENV_MAX_TURNS, 0)?,
            context_window: parsed(ENV_CONTEXT_WINDOW, 200_000u64)?,
            mission: optional(ENV_MISSION),
            stdin_offset: parsed(ENV_STDIN_OFFSET, 0u64)?,
            persona: optional(ENV_PERSONA),
            wisdom: Wisdom::from_env(),
        })
    }

    /// Path of this session's JSONL audit log.
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", self.session_id))
    }

    /// Path of this session's operational log.
    #[must_use]
    pub fn oplog_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.log", self.session_id))
    }

    /// Directory holding the cross-process concurrency lock files.
    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    /// Path where `-b` mode stores the consumed stdin stream.
    #[must_use]
    pub fn stdin_capture_path(&self) -> PathBuf {
        self.data_dir.join(format!("stdin-{}.bin", self.session_id))
    }
}

fn optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{e}"),
        }),
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".quine"),
        _ => PathBuf::from("/tmp/quine"),
    }
}
