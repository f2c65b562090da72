use std::process::Command;

use crate::text::{is_separator_line, strip_ansi};

use super::error::{Result, TmuxError};
use super::types::{CaptureResult, Mode, PaneAddress, PaneInfo, ResizeAxis, Session, Window};

/// How many lines from the bottom of a capture are searched for the vim-mode
/// indicator and the status line.
const BOTTOM_SLICE_LINES: usize = 12;

/// Client for the external tmux binary.
///
/// Every method executes `tmux` directly (no shell) and is safe to call from
/// many workers concurrently; the client itself holds no mutable state.
pub struct TmuxClient;

impl TmuxClient {
    pub fn new() -> Self {
        Self
    }

    /// Run one tmux command, classifying failures per [`TmuxError`].
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("tmux").args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::from_stderr(args[0], &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Lists all sessions. A missing tmux server is an empty list, not an
    /// error.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        // Tab separator handles spaces and glyphs in session names.
        let format =
            "#{session_name}\t#{session_created}\t#{session_windows}\t#{session_attached}\t#{session_activity}";
        let stdout = match self.run(&["list-sessions", "-F", format]) {
            Ok(out) => out,
            Err(TmuxError::NoServer) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(stdout.lines().filter_map(parse_session_line).collect())
    }

    /// Lists the windows of one session.
    pub fn list_windows(&self, session: &str) -> Result<Vec<Window>> {
        let format =
            "#{window_index}\t#{window_active}\t#{window_panes}\t#{window_activity}\t#{pane_current_path}\t#{window_name}";
        let stdout = self.run(&["list-windows", "-t", session, "-F", format])?;
        Ok(stdout.lines().filter_map(parse_window_line).collect())
    }

    /// Lists the panes of one window.
    pub fn list_panes(&self, session: &str, window: u32) -> Result<Vec<PaneInfo>> {
        let target = format!("{}:{}", session, window);
        let format =
            "#{pane_index}\t#{pane_active}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_title}";
        let stdout = self.run(&["list-panes", "-t", &target, "-F", format])?;
        Ok(stdout.lines().filter_map(parse_pane_line).collect())
    }

    /// Captures a pane's contents with escape sequences preserved, extending
    /// `history_lines` back into the scrollback, and extracts the vim-like
    /// mode and raw status line from the bottom slice.
    pub fn capture_pane(&self, addr: &PaneAddress, history_lines: u32) -> Result<CaptureResult> {
        let target = addr.target();
        let start = format!("-{}", history_lines);
        let output = self.run(&["capture-pane", "-p", "-e", "-t", &target, "-S", &start])?;

        let (mode, status_line) = extract_mode_and_status(&output);
        Ok(CaptureResult {
            output,
            mode,
            status_line,
        })
    }

    /// Sends literal text to a pane, optionally followed by Enter.
    pub fn send_keys(&self, addr: &PaneAddress, text: &str, press_enter: bool) -> Result<()> {
        let target = addr.target();
        self.run(&["send-keys", "-t", &target, "-l", "--", text])?;
        if press_enter {
            self.run(&["send-keys", "-t", &target, "Enter"])?;
        }
        Ok(())
    }

    /// Sends a named key such as `C-c`, `Escape`, `Up`, `BTab`.
    pub fn send_special_key(&self, addr: &PaneAddress, key: &str) -> Result<()> {
        self.run(&["send-keys", "-t", &addr.target(), key])?;
        Ok(())
    }

    /// Requests an explicit pane width or height.
    pub fn resize_pane(&self, addr: &PaneAddress, axis: ResizeAxis, cells: u16) -> Result<()> {
        let target = addr.target();
        let cells = cells.to_string();
        self.run(&["resize-pane", "-t", &target, axis.flag(), &cells])?;
        Ok(())
    }

    pub fn kill_pane(&self, addr: &PaneAddress) -> Result<()> {
        self.run(&["kill-pane", "-t", &addr.target()])?;
        Ok(())
    }

    /// Respawns the pane, killing whatever currently runs in it.
    pub fn respawn_pane(&self, addr: &PaneAddress) -> Result<()> {
        self.run(&["respawn-pane", "-k", "-t", &addr.target()])?;
        Ok(())
    }

    pub fn kill_window(&self, session: &str, window: u32) -> Result<()> {
        let target = format!("{}:{}", session, window);
        self.run(&["kill-window", "-t", &target])?;
        Ok(())
    }

    /// Current (width, height) of a pane.
    pub fn get_pane_size(&self, addr: &PaneAddress) -> Result<(u16, u16)> {
        let target = addr.target();
        let out = self.run(&[
            "display-message",
            "-p",
            "-t",
            &target,
            "#{pane_width}\t#{pane_height}",
        ])?;
        let mut parts = out.trim().split('\t');
        let width = parts.next().and_then(|s| s.parse().ok()).unwrap_or(80);
        let height = parts.next().and_then(|s| s.parse().ok()).unwrap_or(24);
        Ok((width, height))
    }

    /// Resolves a tmux pane id (e.g. `%5`) within a session to its address.
    pub fn get_pane_location(&self, session: &str, pane_id: &str) -> Result<PaneAddress> {
        let out = self.run(&[
            "display-message",
            "-p",
            "-t",
            pane_id,
            "#{session_name}\t#{window_index}\t#{pane_index}",
        ])?;
        let mut parts = out.trim().split('\t');
        let name = parts.next().unwrap_or(session).to_string();
        let window = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let pane = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(PaneAddress::new(name, window, pane))
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_session_line(line: &str) -> Option<Session> {
    let mut parts = line.split('\t');
    Some(Session {
        name: parts.next()?.to_string(),
        created: parts.next()?.parse().ok()?,
        windows: parts.next()?.parse().ok()?,
        attached: parts.next()? != "0",
        activity: parts.next()?.parse().ok()?,
    })
}

fn parse_window_line(line: &str) -> Option<Window> {
    // window_name is last so decorative glyphs never shift the numeric fields.
    let mut parts = line.splitn(6, '\t');
    Some(Window {
        index: parts.next()?.parse().ok()?,
        active: parts.next()? == "1",
        panes: parts.next()?.parse().ok()?,
        activity: parts.next()?.parse().ok()?,
        path: parts.next()?.to_string(),
        name: parts.next()?.to_string(),
    })
}

fn parse_pane_line(line: &str) -> Option<PaneInfo> {
    let mut parts = line.splitn(5, '\t');
    Some(PaneInfo {
        index: parts.next()?.parse().ok()?,
        active: parts.next()? == "1",
        command: parts.next()?.to_string(),
        path: parts.next()?.to_string(),
        title: parts.next()?.to_string(),
    })
}

/// Extracts the vim-like mode and the raw status line from the bottom slice
/// of a capture. The status line is the text after the final long horizontal
/// separator near the bottom.
fn extract_mode_and_status(output: &str) -> (Mode, String) {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(BOTTOM_SLICE_LINES);
    let bottom = &lines[start..];

    let mut mode = Mode::Unknown;
    for line in bottom {
        let plain = strip_ansi(line);
        if plain.contains("-- INSERT --") {
            mode = Mode::Insert;
        } else if plain.contains("-- NORMAL --") {
            mode = Mode::Normal;
        }
    }

    let mut status_line = String::new();
    let separator_idx = bottom
        .iter()
        .rposition(|line| is_separator_line(&strip_ansi(line)));
    if let Some(idx) = separator_idx {
        status_line = bottom[idx + 1..]
            .iter()
            .filter(|l| !l.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
    }

    (mode, status_line)
}
