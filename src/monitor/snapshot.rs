use serde::Serialize;

use crate::agents::{AgentKind, ParseResult, StatusKind};
use crate::tmux::{Session, Window};

/// One window with its chosen pane's parsed state, as shown on a dashboard
/// card.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    #[serde(flatten)]
    pub window: Window,
    /// Index of the chosen pane within the window.
    pub pane: u32,
    /// URL-safe pane target for follow-up requests.
    pub target: String,
    pub agent: AgentKind,
    pub result: ParseResult,
    pub preview: Vec<String>,
    pub needs_attention: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Command running in the chosen pane.
    pub process: String,
    pub active: bool,
}

impl WindowStatus {
    /// Sort priority inside a session: attention > working > active > idle.
    pub fn priority(&self) -> u8 {
        if self.needs_attention {
            4
        } else if self.agent != AgentKind::Generic && self.result.kind == StatusKind::Working {
            3
        } else if self.active {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithWindows {
    #[serde(flatten)]
    pub session: Session,
    pub windows: Vec<WindowStatus>,
    pub attention_count: usize,
    pub has_working: bool,
}

/// Immutable dashboard value: every observed session appears in exactly one
/// of the three lists.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsSnapshot {
    pub needs_attention: Vec<SessionWithWindows>,
    pub active: Vec<SessionWithWindows>,
    pub idle: Vec<SessionWithWindows>,
}

impl SessionsSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.needs_attention.len() + self.active.len() + self.idle.len()
    }
}
