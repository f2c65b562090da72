use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::agents::{Agent, AgentKind, AgentRegistry, ParseResult, StateFileError, StatusKind};
use crate::tmux::{Mode, PaneAddress, TmuxClient};

/// Everything one capture of a pane tells us: the agent that owns it, the
/// merged parse, and the filtered output ready for clients.
#[derive(Debug, Clone)]
pub struct PaneView {
    pub agent: AgentKind,
    pub result: ParseResult,
    /// Capture output with the agent's status chrome removed; ANSI kept.
    pub output: String,
    /// Raw status line below the final separator, ANSI kept.
    pub status_line: String,
    pub mode: Mode,
}

/// Capture a pane and run the full detection/parse pipeline.
pub fn inspect_pane(
    tmux: &TmuxClient,
    registry: &AgentRegistry,
    addr: &PaneAddress,
    command: &str,
    path: &str,
    history_lines: u32,
) -> crate::tmux::Result<PaneView> {
    let capture = tmux.capture_pane(addr, history_lines)?;
    let kind = registry.detect(&addr.target(), command, &capture.output);
    let agent: Arc<dyn Agent> = registry.agent(kind);

    let pane_path = Path::new(path);
    let mut result = resolve_state(agent.as_ref(), pane_path, &capture.output);
    if result.suggestion.is_none() {
        result.suggestion = agent.suggestion_from_files(pane_path);
    }
    if result.mode == Mode::Unknown {
        // The capture itself may have seen a vim-mode indicator.
        result.mode = capture.mode;
    }

    let mode = result.mode;
    let output = agent.filter_status_bar(&capture.output);
    Ok(PaneView {
        agent: kind,
        result,
        output,
        status_line: capture.status_line,
        mode,
    })
}

/// Merge the log-file state with the terminal parse.
///
/// The log reader wins when it produces a definite state; an idle log falls
/// back to the terminal. When the log only knows "waiting for permission"
/// but the terminal shows the concrete choice menu, the choices win.
pub fn resolve_state(agent: &dyn Agent, pane_path: &Path, raw_output: &str) -> ParseResult {
    let terminal = agent.parse_output(raw_output);

    let log = match agent.state_from_files(pane_path) {
        Ok(log) => log,
        Err(StateFileError::NotFound) | Err(StateFileError::Stale) => return terminal,
        Err(e) => {
            debug!(agent = agent.kind().as_str(), "log state unavailable: {}", e);
            return terminal;
        }
    };

    if log.kind == StatusKind::Idle {
        return terminal;
    }
    if log.kind == StatusKind::Question
        && terminal.kind == StatusKind::Choice
        && !terminal.choices.is_empty()
    {
        return terminal;
    }

    let mut merged = log;
    merged.mode = terminal.mode;
    if merged.suggestion.is_none() {
        merged.suggestion = terminal.suggestion;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentLogRoots, ClaudeCodeAgent};
    use std::io::Write;

    fn claude_with_pending_tool(tmp: &Path, cwd: &Path) -> ClaudeCodeAgent {
        let canonical = std::fs::canonicalize(cwd).unwrap();
        let project = canonical.to_string_lossy().replace(['/', '.'], "-");
        let project_dir = tmp.join(project);
        std::fs::create_dir_all(&project_dir).unwrap();
        let mut f = std::fs::File::create(project_dir.join("session.jsonl")).unwrap();
        writeln!(
            f,
            r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","id":"t1","name":"Bash"}}],"stop_reason":"tool_use"}}}}"#
        )
        .unwrap();

        ClaudeCodeAgent::new(&AgentLogRoots {
            claude_projects: Some(tmp.to_path_buf()),
            ..AgentLogRoots::default()
        })
    }

    #[test]
    fn test_pending_permission_without_terminal_choices() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let agent = claude_with_pending_tool(tmp.path(), &cwd);

        let result = resolve_state(&agent, &cwd, "plain terminal output\n");
        assert_eq!(result.kind, StatusKind::Question);
        assert_eq!(result.question.as_deref(), Some("Waiting for permission…"));
    }

    #[test]
    fn test_terminal_choices_override_permission_question() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let agent = claude_with_pending_tool(tmp.path(), &cwd);

        let output = "Allow Bash to run?\n❯ 1. yes\n  2. no\n";
        let result = resolve_state(&agent, &cwd, output);
        assert_eq!(result.kind, StatusKind::Choice);
        assert_eq!(result.choices, vec!["yes", "no"]);
    }

    #[test]
    fn test_missing_log_falls_back_to_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let agent = ClaudeCodeAgent::new(&AgentLogRoots {
            claude_projects: Some(tmp.path().to_path_buf()),
            ..AgentLogRoots::default()
        });

        let result = resolve_state(&agent, &cwd, "✻ Churning (2s)\n");
        assert_eq!(result.kind, StatusKind::Working);
    }
}
