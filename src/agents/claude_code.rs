use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::text::strip_ansi;
use crate::tmux::Mode;

use super::{Agent, AgentKind, AgentLogRoots, ParseResult, StateFileError};

/// Lines examined by the terminal parser.
const PARSE_TAIL_LINES: usize = 50;
/// Lines near the bottom where questions and activity signals count.
const SIGNAL_TAIL_LINES: usize = 15;
/// Lines searched for the input-line suggestion.
const SUGGESTION_TAIL_LINES: usize = 20;
/// Trailing bytes of the session log read per tick.
const LOG_TAIL_BYTES: u64 = 96 * 1024;
/// Events from the log tail that feed state computation.
const LOG_TAIL_EVENTS: usize = 20;
/// A session log untouched for this long no longer describes the pane.
const LOG_STALE_AFTER: Duration = Duration::from_secs(3600);

/// Phrases that mark an approval/confirmation prompt.
const APPROVAL_PHRASES: &[&str] = &[
    "Do you want to",
    "Would you like",
    "[Y/n]",
    "[y/N]",
    "(Recommended)",
    "Select an option",
];

/// Glyphs Claude Code puts only in its own status bar.
const STATUS_GLYPHS: &[char] = &['🤖', '📊', '⏱', '💬', '❄', '📂'];

/// Spinner glyphs that lead an activity line.
const SPINNER_GLYPHS: &[char] = &['✻', '✽', '✶', '✢', '✳', '·'];

/// Agent implementation for Claude Code's terminal UI and session logs.
pub struct ClaudeCodeAgent {
    choice_line_re: Regex,
    suggestion_re: Regex,
    tool_line_re: Regex,
    log_root: Option<PathBuf>,
    suggestion_cache: Mutex<Option<SuggestionCache>>,
}

struct SuggestionCache {
    path: PathBuf,
    mtime: SystemTime,
    suggestion: Option<String>,
}

impl ClaudeCodeAgent {
    pub fn new(roots: &AgentLogRoots) -> Self {
        Self {
            // "❯ 1. Yes" / "  2. No" / "3) option" / "4] option"
            choice_line_re: Regex::new(r"^❯?\s*(\d+)[.)\]]\s+(.+)$").unwrap(),
            // Prompt glyph, optional nbsp/space padding, then a DIM span.
            suggestion_re: Regex::new("❯[\\s\u{a0}]*(?:\x1b\\[0m)?[\\s\u{a0}]*\x1b\\[2m([^\x1b]+)\x1b\\[")
                .unwrap(),
            tool_line_re: Regex::new(r"●\s*(\w+)\(").unwrap(),
            log_root: roots.claude_projects.clone(),
            suggestion_cache: Mutex::new(None),
        }
    }

    fn project_dir(&self, pane_path: &Path) -> Option<PathBuf> {
        let root = match &self.log_root {
            Some(root) => root.clone(),
            None => dirs::home_dir()?.join(".claude").join("projects"),
        };
        Some(root.join(project_dir_name(pane_path)))
    }

    /// Newest primary session log in the project directory; subagent files
    /// (`agent-*.jsonl`) are excluded.
    fn newest_session_log(&self, project_dir: &Path) -> Result<PathBuf, StateFileError> {
        newest_jsonl(project_dir, |name| !name.starts_with("agent-"))
            .ok_or(StateFileError::NotFound)
    }
}

impl Agent for ClaudeCodeAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ClaudeCode
    }

    fn detect_from_output(&self, stripped: &str) -> bool {
        if stripped.contains("-- INSERT --") || stripped.contains("-- NORMAL --") {
            return true;
        }
        if stripped.contains("Claude:") || stripped.contains("Human:") || stripped.contains(">>>") {
            return true;
        }
        APPROVAL_PHRASES.iter().any(|p| stripped.contains(p))
    }

    fn filter_status_bar(&self, raw: &str) -> String {
        raw.lines()
            .filter(|line| !is_status_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn detect_mode(&self, raw: &str) -> Mode {
        let lines: Vec<&str> = raw.lines().collect();
        let start = lines.len().saturating_sub(5);
        for line in &lines[start..] {
            let plain = strip_ansi(line);
            if plain.contains("-- INSERT --") {
                return Mode::Insert;
            }
            if plain.contains("-- NORMAL --") {
                return Mode::Normal;
            }
        }
        Mode::Normal
    }

    fn parse_output(&self, raw: &str) -> ParseResult {
        let plain = strip_ansi(raw);
        let all: Vec<&str> = plain.lines().collect();
        let tail: Vec<&str> = all
            .iter()
            .skip(all.len().saturating_sub(PARSE_TAIL_LINES))
            .copied()
            .collect();

        let mode = self.detect_mode(raw);
        let suggestion = self.extract_suggestion(raw);
        let decorate = |mut r: ParseResult| {
            r.mode = mode;
            if r.suggestion.is_none() {
                r.suggestion = suggestion.clone();
            }
            r
        };

        // 1. Numbered choice menu directly under a question.
        if let Some((question, choices)) = extract_choices(&self.choice_line_re, &tail) {
            return decorate(ParseResult::choice(question, choices));
        }

        let signal_start = tail.len().saturating_sub(SIGNAL_TAIL_LINES);
        let signal_tail = &tail[signal_start..];

        // 2./3. Approval prompt or general question near the bottom.
        if let Some(question) = find_question(signal_tail) {
            return decorate(ParseResult::question(question));
        }

        // 4. Activity signals, scanned bottom-up.
        for line in signal_tail.iter().rev() {
            if let Some(result) = self.activity_from_line(line) {
                return decorate(result);
            }
        }

        decorate(ParseResult::idle())
    }

    fn state_from_files(&self, pane_path: &Path) -> Result<ParseResult, StateFileError> {
        let project_dir = self.project_dir(pane_path).ok_or(StateFileError::NotFound)?;
        let log = self.newest_session_log(&project_dir)?;

        let mtime = std::fs::metadata(&log)?.modified()?;
        if mtime.elapsed().unwrap_or_default() > LOG_STALE_AFTER {
            return Err(StateFileError::Stale);
        }

        let events = read_tail_events(&log)?;
        if events.is_empty() {
            return Ok(ParseResult::idle());
        }
        Ok(compute_log_state(&self.choice_line_re, &events))
    }

    fn extract_suggestion(&self, raw: &str) -> Option<String> {
        let lines: Vec<&str> = raw.lines().collect();
        let start = lines.len().saturating_sub(SUGGESTION_TAIL_LINES);
        for line in lines[start..].iter().rev() {
            if !line.contains('❯') {
                continue;
            }
            if let Some(cap) = self.suggestion_re.captures(line) {
                let text = cap[1].trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            // Prompt found but no DIM span: the user typed real input.
            return None;
        }
        None
    }

    fn suggestion_from_files(&self, pane_path: &Path) -> Option<String> {
        let project_dir = self.project_dir(pane_path)?;
        let newest = newest_jsonl(&project_dir, |name| name.starts_with("agent-"))?;
        let mtime = std::fs::metadata(&newest).ok()?.modified().ok()?;

        {
            let cache = self.suggestion_cache.lock();
            if let Some(entry) = cache.as_ref() {
                if entry.path == newest && entry.mtime == mtime {
                    return entry.suggestion.clone();
                }
            }
        }

        let suggestion = read_prompt_suggestion(&newest);
        *self.suggestion_cache.lock() = Some(SuggestionCache {
            path: newest,
            mtime,
            suggestion: suggestion.clone(),
        });
        suggestion
    }
}

impl ClaudeCodeAgent {
    fn activity_from_line(&self, line: &str) -> Option<ParseResult> {
        let trimmed = line.trim_start();

        if trimmed.contains("⎿") && trimmed.contains("Running") {
            return Some(ParseResult::working("Running command"));
        }

        if let Some(cap) = self.tool_line_re.captures(trimmed) {
            return Some(ParseResult::working(tool_activity(&cap[1])));
        }

        if let Some(first) = trimmed.chars().next() {
            if SPINNER_GLYPHS.contains(&first) {
                let word = trimmed[first.len_utf8()..]
                    .split_whitespace()
                    .next()
                    .unwrap_or("");
                let lower = word.to_lowercase();
                if lower.starts_with("done")
                    || lower.starts_with("completed")
                    || lower.starts_with("finished")
                {
                    return Some(ParseResult::done());
                }
                return Some(ParseResult::working("Working"));
            }
        }

        if trimmed.contains("accept edits") {
            return Some(ParseResult::working("Edits pending"));
        }
        if trimmed.contains("plan mode") {
            return Some(ParseResult::working("Planning"));
        }

        None
    }
}

/// True for lines that belong to Claude Code's own status chrome.
fn is_status_line(line: &str) -> bool {
    let plain = strip_ansi(line);
    let trimmed = plain.trim();
    if trimmed.len() >= 8 && trimmed.chars().filter(|c| *c == '─').count() * 2 > trimmed.chars().count()
    {
        return true;
    }
    if trimmed.chars().any(|c| STATUS_GLYPHS.contains(&c)) {
        return true;
    }
    trimmed.contains("-- INSERT --")
        || trimmed.contains("-- NORMAL --")
        || trimmed.contains("accept edits")
}

/// Finds a trailing numbered menu: a run of ≥ 2 sequential choices starting
/// at 1, close to the bottom, with the question line above it.
fn extract_choices(choice_re: &Regex, tail: &[&str]) -> Option<(String, Vec<String>)> {
    let mut choices: Vec<String> = Vec::new();
    let mut first_idx = None;
    let mut last_idx = None;

    for (i, line) in tail.iter().enumerate() {
        let trimmed = line.trim();
        if let Some(cap) = choice_re.captures(trimmed) {
            let Ok(num) = cap[1].parse::<usize>() else {
                continue;
            };
            if num == choices.len() + 1 {
                choices.push(cap[2].trim().to_string());
                if first_idx.is_none() {
                    first_idx = Some(i);
                }
                last_idx = Some(i);
                continue;
            }
            // Out-of-sequence number: restart the run.
            if num == 1 {
                choices = vec![cap[2].trim().to_string()];
                first_idx = Some(i);
                last_idx = Some(i);
                continue;
            }
        }
        if !choices.is_empty() && !trimmed.is_empty() {
            // Box borders and separators may sit under an active menu.
            if crate::text::is_separator_line(trimmed) || is_box_drawing(trimmed) {
                continue;
            }
            // Long prose after the run means this was scrollback, not an
            // active prompt.
            if trimmed.len() > 30 {
                choices.clear();
                first_idx = None;
                last_idx = None;
            }
        }
    }

    if choices.len() < 2 {
        return None;
    }
    let last = last_idx?;
    if tail.len() - last > 10 {
        return None;
    }

    let first = first_idx?;
    let mut question = String::new();
    for j in (0..first).rev() {
        let prev = tail[j].trim();
        if prev.is_empty() {
            continue;
        }
        if prev.ends_with('?') {
            question = prev.to_string();
            break;
        }
        if question.is_empty() {
            question = prev.to_string();
        }
        if first - j > 5 {
            break;
        }
    }

    Some((question, choices))
}

/// True when every rune is box-drawing or whitespace.
fn is_box_drawing(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_whitespace() || ('\u{2500}'..='\u{257f}').contains(&c))
}

/// Last question-shaped line in the slice, preferring approval prompts.
fn find_question(lines: &[&str]) -> Option<String> {
    let has_approval = lines
        .iter()
        .any(|l| APPROVAL_PHRASES.iter().any(|p| l.contains(p)));

    for line in lines.iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.ends_with('?') {
            return Some(trimmed.to_string());
        }
        if has_approval && APPROVAL_PHRASES.iter().any(|p| trimmed.contains(p)) {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn tool_activity(tool: &str) -> &'static str {
    match tool {
        "Bash" => "Running command",
        "Read" => "Reading file",
        "Edit" | "Write" | "Update" | "MultiEdit" => "Editing file",
        "Grep" | "Glob" | "Search" => "Searching",
        "Task" => "Running subagent",
        "WebFetch" | "WebSearch" => "Fetching",
        "TodoWrite" => "Updating todos",
        _ => "Running tool",
    }
}

/// Convert a working directory to Claude's per-project log directory name
/// (`/` and `.` become `-`, matching Claude Code's own encoding).
fn project_dir_name(path: &Path) -> String {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    canonical.to_string_lossy().replace(['/', '.'], "-")
}

/// Newest `*.jsonl` in a directory whose file name passes `keep`.
fn newest_jsonl(dir: &Path, keep: impl Fn(&str) -> bool) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| {
            let path = e.path();
            path.extension().is_some_and(|x| x == "jsonl")
                && path
                    .file_name()
                    .map(|n| keep(&n.to_string_lossy()))
                    .unwrap_or(false)
        })
        .max_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()))
        .map(|e| e.path())
}

/// Parse the trailing slice of a session log into its last events. Partial
/// first lines (mid-file seek) and malformed lines are skipped.
fn read_tail_events(path: &Path) -> Result<Vec<Value>, StateFileError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(LOG_TAIL_BYTES);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = String::new();
    BufReader::new(file).read_to_string(&mut buf)?;
    let mut lines: Vec<&str> = buf.lines().collect();
    if start > 0 && !lines.is_empty() {
        lines.remove(0);
    }

    let mut events: Vec<Value> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str(trimmed) {
            Ok(v) => events.push(v),
            Err(e) => debug!("skipping malformed session-log line: {}", e),
        }
    }
    let keep = events.len().saturating_sub(LOG_TAIL_EVENTS);
    Ok(events.split_off(keep))
}

/// Derive agent state from the trailing events of a session log.
fn compute_log_state(choice_re: &Regex, events: &[Value]) -> ParseResult {
    let mut pending_tools: Vec<(String, String)> = Vec::new();
    let mut saw_thinking = false;
    let mut last_assistant_text = String::new();
    let mut last_stop_reason: Option<String> = None;
    let mut last_tool_name: Option<String> = None;

    for event in events {
        if let Some(err) = event_error(event) {
            return ParseResult::error(err);
        }

        let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let content = event
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array());

        match event_type {
            "assistant" => {
                last_stop_reason = event
                    .get("message")
                    .and_then(|m| m.get("stop_reason"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);

                let mut text_parts: Vec<&str> = Vec::new();
                if let Some(blocks) = content {
                    for block in blocks {
                        match block.get("type").and_then(|v| v.as_str()) {
                            Some("tool_use") => {
                                let id = block
                                    .get("id")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string();
                                let name = block
                                    .get("name")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string();
                                last_tool_name = Some(name.clone());
                                pending_tools.push((id, name));
                            }
                            Some("thinking") => saw_thinking = true,
                            Some("text") => {
                                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                                    text_parts.push(t);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                if !text_parts.is_empty() {
                    last_assistant_text = text_parts.join("\n");
                }
            }
            "user" => {
                if let Some(blocks) = content {
                    for block in blocks {
                        if block.get("type").and_then(|v| v.as_str()) == Some("tool_result") {
                            if let Some(id) = block.get("tool_use_id").and_then(|v| v.as_str()) {
                                pending_tools.retain(|(pending_id, _)| pending_id != id);
                            }
                        }
                    }
                }
            }
            // file-history-snapshot, summary, and friends carry no state.
            _ => {}
        }
    }

    // An emitted tool_use with no tool_result yet means the agent is blocked
    // on the permission dialog.
    if let Some((_, name)) = pending_tools.last() {
        let mut result = ParseResult::question("Waiting for permission…");
        result.activity = Some(tool_activity(name).to_string());
        return result;
    }

    match last_stop_reason.as_deref() {
        Some("tool_use") => {
            let activity = last_tool_name
                .as_deref()
                .map(tool_activity)
                .unwrap_or("Running tool");
            ParseResult::working(activity)
        }
        Some("end_turn") => {
            let lines: Vec<&str> = last_assistant_text.lines().collect();
            if let Some((question, choices)) = extract_choices(choice_re, &lines) {
                return ParseResult::choice(question, choices);
            }
            if let Some(question) = trailing_question(&last_assistant_text) {
                return ParseResult::question(question);
            }
            ParseResult::done()
        }
        _ => {
            if saw_thinking {
                ParseResult::working("Thinking")
            } else {
                ParseResult::idle()
            }
        }
    }
}

fn event_error(event: &Value) -> Option<String> {
    let err = event.get("error").and_then(|v| v.as_str()).or_else(|| {
        event
            .get("message")
            .and_then(|m| m.get("error"))
            .and_then(|v| v.as_str())
    })?;
    let mut snippet = err.trim().to_string();
    if snippet.len() > 200 {
        snippet.truncate(200);
    }
    Some(snippet)
}

fn trailing_question(text: &str) -> Option<String> {
    let last = text.lines().rev().find(|l| !l.trim().is_empty())?;
    let trimmed = last.trim();
    if trimmed.ends_with('?') {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Last assistant text of a prompt-suggestion subagent log. Only files that
/// actually belong to that subagent yield a suggestion.
fn read_prompt_suggestion(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let lines: Vec<String> = BufReader::new(file).lines().map_while(|l| l.ok()).collect();

    if !lines.iter().any(|l| l.contains("prompt_suggestion")) {
        return None;
    }

    for line in lines.iter().rev() {
        let Ok(json) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if json.get("type").and_then(|v| v.as_str()) != Some("assistant") {
            continue;
        }
        let text: String = json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array())?
            .iter()
            .filter(|b| b.get("type").and_then(|v| v.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::StatusKind;
    use std::io::Write;

    fn agent() -> ClaudeCodeAgent {
        ClaudeCodeAgent::new(&AgentLogRoots::default())
    }

    fn agent_with_root(root: &Path) -> ClaudeCodeAgent {
        ClaudeCodeAgent::new(&AgentLogRoots {
            claude_projects: Some(root.to_path_buf()),
            ..AgentLogRoots::default()
        })
    }

    #[test]
    fn test_detects_vim_mode_markers() {
        let a = agent();
        assert!(a.detect_from_output("some text\n-- INSERT --"));
        assert!(a.detect_from_output("Do you want to proceed?"));
        assert!(a.detect_from_output("Human: hi\nClaude: hello"));
        assert!(!a.detect_from_output("$ ls\nsrc main.rs"));
    }

    #[test]
    fn test_parse_choice_menu() {
        let a = agent();
        let output = "Do you want to proceed?\n❯ 1. Yes\n  2. No\n";
        let result = a.parse_output(output);
        assert_eq!(result.kind, StatusKind::Choice);
        assert_eq!(result.question.as_deref(), Some("Do you want to proceed?"));
        assert_eq!(result.choices, vec!["Yes", "No"]);
    }

    #[test]
    fn test_choice_run_must_be_sequential() {
        let a = agent();
        let output = "listing:\n  3. third item\n  7. seventh item\n";
        let result = a.parse_output(output);
        assert_ne!(result.kind, StatusKind::Choice);
    }

    #[test]
    fn test_parse_question() {
        let a = agent();
        let output = "I finished the refactor.\nShould I also update the tests?\n";
        let result = a.parse_output(output);
        assert_eq!(result.kind, StatusKind::Question);
        assert_eq!(
            result.question.as_deref(),
            Some("Should I also update the tests?")
        );
    }

    #[test]
    fn test_parse_working_tool_line() {
        let a = agent();
        let result = a.parse_output("● Bash(cargo build)\n⎿ Running…\n");
        assert_eq!(result.kind, StatusKind::Working);
        assert_eq!(result.activity.as_deref(), Some("Running command"));
    }

    #[test]
    fn test_parse_spinner_done() {
        let a = agent();
        let result = a.parse_output("✻ Done (4s · 2.1k tokens)\n");
        assert_eq!(result.kind, StatusKind::Done);
    }

    #[test]
    fn test_parse_idle() {
        let a = agent();
        let result = a.parse_output("older conversation text\nnothing new here\n");
        assert_eq!(result.kind, StatusKind::Idle);
    }

    #[test]
    fn test_filter_status_bar() {
        let a = agent();
        let raw = "real conversation line\n────────────────────\n🤖 sonnet 📊 12k\n-- INSERT --\n";
        let filtered = a.filter_status_bar(raw);
        assert_eq!(filtered, "real conversation line");
    }

    #[test]
    fn test_filter_keeps_conversational_content() {
        let a = agent();
        let raw = "I ran the tests - they pass.\nNext I will edit main.rs\n";
        let filtered = a.filter_status_bar(raw);
        assert!(filtered.contains("they pass"));
        assert!(filtered.contains("main.rs"));
    }

    #[test]
    fn test_detect_mode_defaults_normal() {
        let a = agent();
        assert_eq!(a.detect_mode("plain output\n"), Mode::Normal);
        assert_eq!(a.detect_mode("x\n\x1b[1m-- INSERT --\x1b[0m\n"), Mode::Insert);
    }

    #[test]
    fn test_extract_suggestion_dim_span() {
        let a = agent();
        let raw = "\x1b[0m❯\u{a0}\x1b[2mclean up the .bak files too\x1b[0m\n";
        assert_eq!(
            a.extract_suggestion(raw).as_deref(),
            Some("clean up the .bak files too")
        );
    }

    #[test]
    fn test_extract_suggestion_user_input_is_not_dim() {
        let a = agent();
        let raw = "❯ clean up the .bak files too\n";
        assert_eq!(a.extract_suggestion(raw), None);
    }

    fn write_log(dir: &Path, project: &str, name: &str, lines: &[&str]) -> PathBuf {
        let project_dir = dir.join(project);
        std::fs::create_dir_all(&project_dir).unwrap();
        let path = project_dir.join(name);
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_log_state_pending_permission() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "session.jsonl",
            &[r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash"}],"stop_reason":"tool_use"}}"#],
        );

        let a = agent_with_root(tmp.path());
        let result = a.state_from_files(&cwd).unwrap();
        assert_eq!(result.kind, StatusKind::Question);
        assert_eq!(result.question.as_deref(), Some("Waiting for permission…"));
    }

    #[test]
    fn test_log_state_tool_result_clears_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "session.jsonl",
            &[
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash"}],"stop_reason":"tool_use"}}"#,
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
            ],
        );

        let a = agent_with_root(tmp.path());
        let result = a.state_from_files(&cwd).unwrap();
        assert_eq!(result.kind, StatusKind::Working);
        assert_eq!(result.activity.as_deref(), Some("Running command"));
    }

    #[test]
    fn test_log_state_end_turn_is_done() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "session.jsonl",
            &[r#"{"type":"assistant","message":{"content":[{"type":"text","text":"All tests pass."}],"stop_reason":"end_turn"}}"#],
        );

        let a = agent_with_root(tmp.path());
        let result = a.state_from_files(&cwd).unwrap();
        assert_eq!(result.kind, StatusKind::Done);
    }

    #[test]
    fn test_log_state_end_turn_question() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "session.jsonl",
            &[r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Done.\nShould I push the branch?"}],"stop_reason":"end_turn"}}"#],
        );

        let a = agent_with_root(tmp.path());
        let result = a.state_from_files(&cwd).unwrap();
        assert_eq!(result.kind, StatusKind::Question);
        assert_eq!(result.question.as_deref(), Some("Should I push the branch?"));
    }

    #[test]
    fn test_log_state_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let a = agent_with_root(tmp.path());
        let missing = tmp.path().join("nowhere");
        assert!(matches!(
            a.state_from_files(&missing),
            Err(StateFileError::NotFound)
        ));
    }

    #[test]
    fn test_log_skips_subagent_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "agent-sub.jsonl",
            &[r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"x","name":"Bash"}]}}"#],
        );
        write_log(
            tmp.path(),
            &project,
            "session.jsonl",
            &[r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hi."}],"stop_reason":"end_turn"}}"#],
        );

        let a = agent_with_root(tmp.path());
        let result = a.state_from_files(&cwd).unwrap();
        assert_eq!(result.kind, StatusKind::Done);
    }

    #[test]
    fn test_prompt_suggestion_from_subagent_log() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().join("proj");
        std::fs::create_dir_all(&cwd).unwrap();
        let project = project_dir_name(&cwd);

        write_log(
            tmp.path(),
            &project,
            "agent-ps.jsonl",
            &[
                r#"{"type":"user","subtype":"prompt_suggestion","message":{"content":[{"type":"text","text":"suggest"}]}}"#,
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"run the linter next"}]}}"#,
            ],
        );

        let a = agent_with_root(tmp.path());
        assert_eq!(
            a.suggestion_from_files(&cwd).as_deref(),
            Some("run the linter next")
        );
        // Second call hits the mtime cache.
        assert_eq!(
            a.suggestion_from_files(&cwd).as_deref(),
            Some("run the linter next")
        );
    }
}
