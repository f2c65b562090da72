use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::text::strip_ansi;
use crate::tmux::Mode;

use super::{Agent, AgentKind, AgentLogRoots, ParseResult, StateFileError};

/// Phrases Amp prints that no other agent does.
const AMP_PHRASES: &[&str] = &["Cogitated for", "Baked for", "Running PostToolUse hooks"];

/// Fields parsed out of Amp's box-drawn status frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmpStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_percent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Agent implementation for Amp's terminal UI and thread files.
pub struct AmpAgent {
    token_re: Regex,
    cost_re: Regex,
    mode_re: Regex,
    location_re: Regex,
    threads_dir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
}

impl AmpAgent {
    pub fn new(roots: &AgentLogRoots) -> Self {
        Self {
            token_re: Regex::new(r"(\d+%)\s*of\s*([0-9.]+[kKmM]?)").unwrap(),
            cost_re: Regex::new(r"(\$[0-9.]+)\s*(\([^)]*\))?").unwrap(),
            // Mode label sits right before the closing corner: `…──smart─╮`.
            mode_re: Regex::new(r"─([A-Za-z]+)─*$").unwrap(),
            location_re: Regex::new(r"^(\S+)(?:\s+\((.+)\))?$").unwrap(),
            threads_dir: roots.amp_threads.clone(),
            state_dir: roots.amp_state.clone(),
        }
    }

    /// Parses Amp's top and bottom frame borders into a status record.
    pub fn parse_status_frame(&self, raw: &str) -> AmpStatus {
        let plain = strip_ansi(raw);
        let mut status = AmpStatus::default();

        for line in plain.lines() {
            let trimmed = line.trim();
            if let Some(inner) = frame_inner(trimmed, '╭', '╮') {
                if let Some(cap) = self.token_re.captures(inner) {
                    status.token_percent = Some(cap[1].to_string());
                    status.token_limit = Some(cap[2].to_string());
                }
                if let Some(cap) = self.cost_re.captures(inner) {
                    status.cost = Some(cap[1].to_string());
                    status.cost_note = cap.get(2).map(|m| m.as_str().to_string());
                }
                if let Some(cap) = self.mode_re.captures(inner) {
                    status.mode = Some(cap[1].to_string());
                }
            } else if let Some(inner) = frame_inner(trimmed, '╰', '╯') {
                let location = inner.trim_matches('─').trim();
                if let Some(cap) = self.location_re.captures(location) {
                    status.path = Some(cap[1].to_string());
                    status.branch = cap.get(2).map(|m| m.as_str().to_string());
                }
            }
        }
        status
    }

    fn threads_dir(&self) -> Option<PathBuf> {
        match &self.threads_dir {
            Some(dir) => Some(dir.clone()),
            None => Some(dirs::data_dir()?.join("amp").join("threads")),
        }
    }

    fn last_thread_id(&self) -> Option<String> {
        let path = match &self.state_dir {
            Some(dir) => dir.join("last-thread-id"),
            None => dirs::state_dir()?.join("amp").join("last-thread-id"),
        };
        let id = std::fs::read_to_string(path).ok()?;
        let id = id.trim().to_string();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    /// Picks the thread whose workspace contains `cwd`: the remembered
    /// last-thread-id if it matches, otherwise the newest matching thread
    /// in the directory.
    fn find_thread(&self, cwd: &Path) -> Result<AmpThread, StateFileError> {
        let threads_dir = self.threads_dir().ok_or(StateFileError::NotFound)?;

        if let Some(id) = self.last_thread_id() {
            let path = threads_dir.join(format!("{}.json", id));
            if let Ok(thread) = read_thread(&path) {
                if thread.contains_workspace(cwd) {
                    return Ok(thread);
                }
            }
        }

        let mut best: Option<AmpThread> = None;
        for entry in std::fs::read_dir(&threads_dir).map_err(|_| StateFileError::NotFound)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("T-") || path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let thread = match read_thread(&path) {
                Ok(t) => t,
                Err(e) => {
                    // Usually a concurrent write; the next tick retries.
                    debug!("skipping unreadable amp thread {}: {}", name, e);
                    continue;
                }
            };
            if !thread.contains_workspace(cwd) {
                continue;
            }
            if best.as_ref().map_or(true, |b| thread.created > b.created) {
                best = Some(thread);
            }
        }
        best.ok_or(StateFileError::NotFound)
    }
}

impl Agent for AmpAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Amp
    }

    fn detect_from_output(&self, stripped: &str) -> bool {
        if AMP_PHRASES.iter().any(|p| stripped.contains(p)) {
            return true;
        }
        stripped.lines().any(|line| {
            let trimmed = line.trim();
            frame_inner(trimmed, '╭', '╮').is_some() || frame_inner(trimmed, '╰', '╯').is_some()
        })
    }

    fn filter_status_bar(&self, raw: &str) -> String {
        raw.lines()
            .filter(|line| {
                let plain = strip_ansi(line);
                let trimmed = plain.trim();
                if frame_inner(trimmed, '╭', '╮').is_some()
                    || frame_inner(trimmed, '╰', '╯').is_some()
                {
                    return false;
                }
                !is_pure_box_drawing(trimmed)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn detect_mode(&self, _raw: &str) -> Mode {
        Mode::Unknown
    }

    fn parse_output(&self, raw: &str) -> ParseResult {
        let plain = strip_ansi(raw);
        let lines: Vec<&str> = plain.lines().collect();
        let start = lines.len().saturating_sub(15);
        let tail = &lines[start..];

        if tail.iter().any(|l| l.contains("Running PostToolUse hooks")) {
            return ParseResult::working("Running hooks");
        }

        for line in tail.iter().rev() {
            let trimmed = line.trim().trim_matches('│').trim();
            if trimmed.is_empty() || is_pure_box_drawing(trimmed) {
                continue;
            }
            if trimmed.contains("Cogitated for") || trimmed.contains("Baked for") {
                return ParseResult::done();
            }
            if trimmed.ends_with('?') {
                return ParseResult::question(trimmed);
            }
            break;
        }

        ParseResult::idle()
    }

    fn state_from_files(&self, pane_path: &Path) -> Result<ParseResult, StateFileError> {
        let cwd = std::fs::canonicalize(pane_path).unwrap_or_else(|_| pane_path.to_path_buf());
        let thread = self.find_thread(&cwd)?;

        let Some(last) = thread.messages.last() else {
            return Ok(ParseResult::idle());
        };

        let state = last.state.as_ref().map(|s| s.kind.as_str()).unwrap_or("");
        match state {
            "running" => Ok(ParseResult::working("Processing")),
            "cancelled" => {
                let mut result = ParseResult::idle();
                result.activity = Some("Cancelled".to_string());
                Ok(result)
            }
            "complete" => {
                let stop_reason = last
                    .state
                    .as_ref()
                    .and_then(|s| s.stop_reason.as_deref())
                    .unwrap_or("");
                if stop_reason == "tool_use" {
                    return Ok(ParseResult::working("Running tool"));
                }
                if last.role == "user" {
                    return Ok(ParseResult::working("Processing"));
                }
                if let Some(question) = last.trailing_question() {
                    return Ok(ParseResult::question(question));
                }
                Ok(ParseResult::idle())
            }
            _ => Ok(ParseResult::idle()),
        }
    }
}

/// Inner text of a frame border line, or `None` when the line is not one.
fn frame_inner(line: &str, open: char, close: char) -> Option<&str> {
    let rest = line.strip_prefix(open)?;
    let inner = rest.strip_suffix(close)?;
    // A real border is mostly horizontal rule; a lone `╭x╮` in conversation
    // text is not.
    if inner.contains('─') {
        Some(inner)
    } else {
        None
    }
}

fn is_pure_box_drawing(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_whitespace() || ('\u{2500}'..='\u{257f}').contains(&c))
}

fn read_thread(path: &Path) -> Result<AmpThread, StateFileError> {
    let data = std::fs::read_to_string(path).map_err(|_| StateFileError::NotFound)?;
    serde_json::from_str(&data).map_err(|e| StateFileError::Parse(e.to_string()))
}

/// One Amp thread document (`T-*.json`).
#[derive(Debug, Deserialize)]
struct AmpThread {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    env: Option<AmpEnv>,
    #[serde(default)]
    messages: Vec<AmpMessage>,
}

#[derive(Debug, Deserialize)]
struct AmpEnv {
    #[serde(default)]
    initial: Option<AmpInitial>,
}

#[derive(Debug, Deserialize)]
struct AmpInitial {
    #[serde(default)]
    trees: Vec<AmpTree>,
}

#[derive(Debug, Deserialize)]
struct AmpTree {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct AmpMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    state: Option<AmpMessageState>,
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AmpMessageState {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "stopReason", alias = "stop_reason")]
    stop_reason: Option<String>,
}

impl AmpThread {
    /// Workspace match: a tree root equal to `cwd` or an ancestor of it.
    fn contains_workspace(&self, cwd: &Path) -> bool {
        let Some(env) = &self.env else { return false };
        let Some(initial) = &env.initial else {
            return false;
        };
        initial.trees.iter().any(|tree| {
            let Some(root) = tree.uri.strip_prefix("file://") else {
                return false;
            };
            let root = Path::new(root);
            cwd == root || cwd.starts_with(root)
        })
    }
}

impl AmpMessage {
    fn trailing_question(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        let text: String = match content {
            Value::String(s) => s.clone(),
            Value::Array(blocks) => blocks
                .iter()
                .filter(|b| b.get("type").and_then(|v| v.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => return None,
        };
        let last = text.lines().rev().find(|l| !l.trim().is_empty())?;
        let trimmed = last.trim();
        if trimmed.ends_with('?') {
            Some(trimmed.to_string())
        } else {
            None
        }
    }
}
