use std::fmt;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// `(session, window, pane)` triple addressing one tmux pane.
///
/// Session names are opaque and may contain path-ish characters; they are
/// percent-encoded when the address travels in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaneAddress {
    pub session: String,
    pub window: u32,
    pub pane: u32,
}

impl PaneAddress {
    pub fn new(session: impl Into<String>, window: u32, pane: u32) -> Self {
        Self {
            session: session.into(),
            window,
            pane,
        }
    }

    /// tmux target syntax, e.g. `main:1.0`.
    pub fn target(&self) -> String {
        format!("{}:{}.{}", self.session, self.window, self.pane)
    }

    /// URL-safe form of [`target`](Self::target) with the session name
    /// percent-encoded.
    pub fn url_target(&self) -> String {
        format!(
            "{}:{}.{}",
            utf8_percent_encode(&self.session, NON_ALPHANUMERIC),
            self.window,
            self.pane
        )
    }
}

impl fmt::Display for PaneAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

/// One tmux session as reported by `list-sessions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub name: String,
    /// Unix timestamp of session creation.
    pub created: i64,
    pub windows: u32,
    pub attached: bool,
    /// Unix timestamp of last activity.
    pub activity: i64,
}

/// One window within a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub index: u32,
    pub name: String,
    pub active: bool,
    pub panes: u32,
    /// Unix timestamp of last activity.
    pub activity: i64,
    /// Working directory of the window's chosen pane.
    pub path: String,
}

/// One pane within a window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneInfo {
    pub index: u32,
    pub active: bool,
    pub command: String,
    pub path: String,
    pub title: String,
}

/// Vim-like input mode extracted from an agent's status area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Insert,
    Normal,
    Unknown,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Unknown
    }
}

/// Result of capturing a pane: raw output with escape sequences preserved,
/// plus mode and raw status line extracted from the bottom slice.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub output: String,
    pub mode: Mode,
    pub status_line: String,
}

/// Axis selector for `resize-pane`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAxis {
    Width,
    Height,
}

impl ResizeAxis {
    pub(crate) fn flag(self) -> &'static str {
        match self {
            ResizeAxis::Width => "-x",
            ResizeAxis::Height => "-y",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_formatting() {
        let addr = PaneAddress::new("main", 2, 1);
        assert_eq!(addr.target(), "main:2.1");
        assert_eq!(addr.to_string(), "main:2.1");
    }

    #[test]
    fn test_url_target_escapes_session() {
        let addr = PaneAddress::new("work/api v2", 0, 0);
        assert_eq!(addr.url_target(), "work%2Fapi%20v2:0.0");
    }
}
