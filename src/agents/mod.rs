mod amp;
mod claude_code;
mod generic;
mod registry;

pub use amp::{AmpAgent, AmpStatus};
pub use claude_code::ClaudeCodeAgent;
pub use generic::GenericAgent;
pub use registry::AgentRegistry;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tmux::Mode;

/// Overridable roots for the agents' on-disk logs. `None` means the agent's
/// conventional location under the user's home directory.
#[derive(Debug, Clone, Default)]
pub struct AgentLogRoots {
    /// Claude Code per-project session logs (default `~/.claude/projects`).
    pub claude_projects: Option<PathBuf>,
    /// Amp thread documents (default `~/.local/share/amp/threads`).
    pub amp_threads: Option<PathBuf>,
    /// Amp state dir holding `last-thread-id` (default `~/.local/state/amp`).
    pub amp_state: Option<PathBuf>,
}

/// Which known agent owns a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    ClaudeCode,
    Amp,
    Generic,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::ClaudeCode => "claude-code",
            AgentKind::Amp => "amp",
            AgentKind::Generic => "generic",
        }
    }
}

/// Classified state of an agent's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Idle,
    Working,
    Done,
    Question,
    Choice,
    Error,
}

impl Default for StatusKind {
    fn default() -> Self {
        StatusKind::Idle
    }
}

/// Structured interpretation of an agent's current terminal or log state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    /// Faded placeholder the agent shows inside its own input line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Default for ParseResult {
    fn default() -> Self {
        Self {
            kind: StatusKind::Idle,
            mode: Mode::Unknown,
            question: None,
            choices: Vec::new(),
            error_snippet: None,
            activity: None,
            suggestion: None,
        }
    }
}

impl ParseResult {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn working(activity: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Working,
            activity: Some(activity.into()),
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            kind: StatusKind::Done,
            ..Self::default()
        }
    }

    pub fn question(question: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Question,
            question: Some(question.into()),
            ..Self::default()
        }
    }

    pub fn choice(question: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            kind: StatusKind::Choice,
            question: Some(question.into()),
            choices,
            ..Self::default()
        }
    }

    pub fn error(snippet: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            error_snippet: Some(snippet.into()),
            ..Self::default()
        }
    }

    /// A human should look at this pane.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.kind,
            StatusKind::Error | StatusKind::Choice | StatusKind::Question
        )
    }
}

/// Failures of the log-file-driven state path. `NotFound` and `Stale` are
/// expected conditions; `Parse` is usually a concurrent write, retried on
/// the next tick.
#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("no session log found")]
    NotFound,

    #[error("session log is stale")]
    Stale,

    #[error("failed to parse session log: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Capability set every known agent implements.
///
/// Implementations are stateless apart from compiled regexes and small
/// read caches, and shared behind `Arc` between the aggregator and every
/// pane streamer.
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// High-confidence markers only; the registry falls back to generic when
    /// nothing matches.
    fn detect_from_output(&self, stripped: &str) -> bool;

    /// Removes the agent's own status ornamentation while preserving
    /// conversational content.
    fn filter_status_bar(&self, raw: &str) -> String;

    /// Defaults to `Unknown` for agents without vim-like modes.
    fn detect_mode(&self, raw: &str) -> Mode;

    /// Terminal-only parse path over the raw capture.
    fn parse_output(&self, raw: &str) -> ParseResult;

    /// Richer, log-file-driven state path.
    fn state_from_files(&self, pane_path: &Path) -> Result<ParseResult, StateFileError>;

    /// The faded placeholder inside the agent's input line, if any.
    fn extract_suggestion(&self, raw: &str) -> Option<String> {
        let _ = raw;
        None
    }

    /// Fallback suggestion source when the terminal is unavailable.
    fn suggestion_from_files(&self, pane_path: &Path) -> Option<String> {
        let _ = pane_path;
        None
    }
}
