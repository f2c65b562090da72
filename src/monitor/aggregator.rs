use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::agents::{AgentKind, AgentRegistry, ParseResult, StatusKind};
use crate::app::Config;
use crate::text::{is_separator_line, strip_ansi_with_orphans, strip_osc8_hyperlinks};
use crate::tmux::{PaneAddress, PaneInfo, Session, TmuxClient, Window};

use super::git::branch_for_path;
use super::inspect::{inspect_pane, resolve_state};
use super::process::is_process_active;
use super::snapshot::{SessionWithWindows, SessionsSnapshot, WindowStatus};

/// Dashboard fan-out capacity; slow subscribers skip to the newest snapshot.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 4;

/// Shared handle to the current snapshot and its fan-out channel. The
/// aggregator is the only writer; the HTTP layer reads.
pub struct SnapshotHub {
    tx: broadcast::Sender<Arc<SessionsSnapshot>>,
    latest: RwLock<Arc<SessionsSnapshot>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            tx,
            latest: RwLock::new(Arc::new(SessionsSnapshot::empty())),
        }
    }

    pub fn latest(&self) -> Arc<SessionsSnapshot> {
        self.latest.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SessionsSnapshot>> {
        self.tx.subscribe()
    }

    fn publish(&self, snapshot: SessionsSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.latest.write() = snapshot.clone();
        // No subscribers is fine; the one-shot endpoint reads `latest`.
        let _ = self.tx.send(snapshot);
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic worker that turns the observable tmux world into
/// [`SessionsSnapshot`] values.
pub struct Aggregator {
    tmux: Arc<TmuxClient>,
    registry: Arc<AgentRegistry>,
    hub: Arc<SnapshotHub>,
    tick: Duration,
    score_capture_lines: u32,
    capture_lines: u32,
    preview_lines: usize,
    preview_lines_attention: usize,
}

impl Aggregator {
    pub fn new(
        tmux: Arc<TmuxClient>,
        registry: Arc<AgentRegistry>,
        hub: Arc<SnapshotHub>,
        config: &Config,
    ) -> Self {
        Self {
            tmux,
            registry,
            hub,
            tick: Duration::from_millis(config.tick_sessions_ms),
            score_capture_lines: config.score_capture_lines,
            capture_lines: config.capture_lines,
            preview_lines: config.preview_lines,
            preview_lines_attention: config.preview_lines_attention,
        }
    }

    /// Runs until process shutdown. Every tick publishes a complete
    /// snapshot; a down tmux server publishes an empty one.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let snapshot = self.build_snapshot();
            self.hub.publish(snapshot);
        }
    }

    /// One aggregation tick. Per-pane failures degrade to idle fallbacks;
    /// only a completely unreachable server yields an empty snapshot.
    pub fn build_snapshot(&self) -> SessionsSnapshot {
        let sessions = match self.tmux.list_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("list-sessions failed: {}", e);
                return SessionsSnapshot::empty();
            }
        };

        let now = chrono::Utc::now().timestamp();
        let mut live_targets: Vec<String> = Vec::new();
        let mut snapshot = SessionsSnapshot::empty();

        for session in sessions {
            let windows = match self.tmux.list_windows(&session.name) {
                Ok(windows) => windows,
                Err(e) => {
                    debug!(session = %session.name, "list-windows failed: {}", e);
                    continue;
                }
            };
            if windows.is_empty() {
                continue;
            }

            // Branch lookups are memoized per session; sibling windows of one
            // worktree share a path.
            let mut branches: HashMap<String, Option<String>> = HashMap::new();
            let mut statuses: Vec<WindowStatus> = Vec::new();

            for window in windows {
                match self.window_status(&session, window, now, &mut branches, &mut live_targets) {
                    Some(status) => statuses.push(status),
                    None => continue,
                }
            }
            if statuses.is_empty() {
                continue;
            }

            place_session(&mut snapshot, session, statuses);
        }

        self.registry.retain_panes(&live_targets);
        snapshot
    }

    /// Builds the status card for one window, or `None` when the window
    /// cannot be observed at all.
    fn window_status(
        &self,
        session: &Session,
        window: Window,
        now: i64,
        branches: &mut HashMap<String, Option<String>>,
        live_targets: &mut Vec<String>,
    ) -> Option<WindowStatus> {
        let panes = match self.tmux.list_panes(&session.name, window.index) {
            Ok(panes) => panes,
            Err(e) => {
                debug!(session = %session.name, window = window.index, "list-panes failed: {}", e);
                return None;
            }
        };
        if panes.is_empty() {
            return None;
        }

        for pane in &panes {
            live_targets.push(
                PaneAddress::new(session.name.clone(), window.index, pane.index).target(),
            );
        }

        let best = self.best_pane(&session.name, window.index, &panes);
        let addr = PaneAddress::new(session.name.clone(), window.index, best.index);

        // Deep capture of the chosen pane; failure degrades to an idle card.
        let view = inspect_pane(
            &self.tmux,
            &self.registry,
            &addr,
            &best.command,
            &best.path,
            self.capture_lines,
        );
        let (agent, result, output) = match view {
            Ok(v) => (v.agent, v.result, v.output),
            Err(e) => {
                debug!(target = %addr, "capture failed: {}", e);
                (AgentKind::Generic, ParseResult::idle(), String::new())
            }
        };

        let needs_attention = agent != AgentKind::Generic && result.needs_attention();
        let preview_len = if needs_attention {
            self.preview_lines_attention
        } else {
            self.preview_lines
        };
        let preview = build_preview(&output, preview_len);

        let active = if agent != AgentKind::Generic {
            result.kind == StatusKind::Working
        } else {
            is_process_active(&best.command, window.activity, now)
        };

        let branch = branches
            .entry(best.path.clone())
            .or_insert_with(|| branch_for_path(std::path::Path::new(&best.path)))
            .clone();

        Some(WindowStatus {
            target: addr.url_target(),
            pane: best.index,
            agent,
            result,
            preview,
            needs_attention,
            branch,
            process: best.command.clone(),
            active,
            window,
        })
    }

    /// Scores every pane of a window and picks the best one:
    /// attention 100, working agent 50, other agent 30, active non-agent 10,
    /// anything else 1. Failures score 0 but never abort the window.
    fn best_pane<'p>(&self, session: &str, window: u32, panes: &'p [PaneInfo]) -> &'p PaneInfo {
        let mut best: (&PaneInfo, u32) = (&panes[0], 0);
        for pane in panes {
            let score = self.score_pane(session, window, pane);
            if score > best.1 {
                best = (pane, score);
            }
        }
        best.0
    }

    fn score_pane(&self, session: &str, window: u32, pane: &PaneInfo) -> u32 {
        let addr = PaneAddress::new(session.to_string(), window, pane.index);
        let capture = match self.tmux.capture_pane(&addr, self.score_capture_lines) {
            Ok(c) => c,
            Err(e) => {
                debug!(target = %addr, "score capture failed: {}", e);
                return 0;
            }
        };

        let kind = self
            .registry
            .detect(&addr.target(), &pane.command, &capture.output);
        if kind == AgentKind::Generic {
            return if pane.active { 10 } else { 1 };
        }

        let agent = self.registry.agent(kind);
        let result = resolve_state(agent.as_ref(), std::path::Path::new(&pane.path), &capture.output);
        if result.needs_attention() {
            100
        } else if result.kind == StatusKind::Working {
            50
        } else {
            30
        }
    }
}

/// Sort a session's windows by priority and file the session into exactly
/// one of the snapshot's three lists.
fn place_session(snapshot: &mut SessionsSnapshot, session: Session, mut windows: Vec<WindowStatus>) {
    // Stable: equal priorities keep tmux order.
    windows.sort_by_key(|w| std::cmp::Reverse(w.priority()));

    let attention_count = windows.iter().filter(|w| w.needs_attention).count();
    let has_working = windows.iter().any(|w| w.active);
    let entry = SessionWithWindows {
        session,
        windows,
        attention_count,
        has_working,
    };

    if entry.attention_count > 0 {
        snapshot.needs_attention.push(entry);
    } else if entry.has_working {
        snapshot.active.push(entry);
    } else {
        snapshot.idle.push(entry);
    }
}

/// Last `n` preview-worthy lines of status-filtered output: non-empty,
/// non-separator, with ANSI, OSC-8, and orphaned SGR remnants removed so the
/// lines are JSON-safe.
fn build_preview(filtered_output: &str, n: usize) -> Vec<String> {
    let delinked = strip_osc8_hyperlinks(filtered_output);
    let lines: Vec<String> = delinked
        .lines()
        .map(strip_ansi_with_orphans)
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.trim().is_empty() && !is_separator_line(l))
        .collect();
    let skip = lines.len().saturating_sub(n);
    lines.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> Session {
        Session {
            name: name.to_string(),
            created: 1_700_000_000,
            windows: 1,
            attached: true,
            activity: 1_700_000_100,
        }
    }

    fn window_status(index: u32, agent: AgentKind, result: ParseResult, active: bool) -> WindowStatus {
        let needs_attention = agent != AgentKind::Generic && result.needs_attention();
        WindowStatus {
            window: Window {
                index,
                name: format!("w{}", index),
                active: false,
                panes: 1,
                activity: 0,
                path: "/tmp".to_string(),
            },
            pane: 0,
            target: format!("s:{}.0", index),
            agent,
            result,
            preview: Vec::new(),
            needs_attention,
            branch: None,
            process: "node".to_string(),
            active,
        }
    }

    #[test]
    fn test_sessions_partition_into_exactly_one_list() {
        let mut snapshot = SessionsSnapshot::empty();

        // A: claude window presenting a choice.
        place_session(
            &mut snapshot,
            session("a"),
            vec![window_status(
                0,
                AgentKind::ClaudeCode,
                ParseResult::choice("Proceed?", vec!["Yes".into(), "No".into()]),
                false,
            )],
        );
        // B: plain node process with recent activity.
        place_session(
            &mut snapshot,
            session("b"),
            vec![window_status(0, AgentKind::Generic, ParseResult::idle(), true)],
        );
        // C: nothing happening.
        place_session(
            &mut snapshot,
            session("c"),
            vec![window_status(0, AgentKind::Generic, ParseResult::idle(), false)],
        );

        assert_eq!(snapshot.needs_attention.len(), 1);
        assert_eq!(snapshot.needs_attention[0].session.name, "a");
        assert_eq!(snapshot.active.len(), 1);
        assert_eq!(snapshot.active[0].session.name, "b");
        assert_eq!(snapshot.idle.len(), 1);
        assert_eq!(snapshot.idle[0].session.name, "c");
        assert_eq!(snapshot.session_count(), 3);
    }

    #[test]
    fn test_attention_consistency() {
        let mut snapshot = SessionsSnapshot::empty();
        place_session(
            &mut snapshot,
            session("a"),
            vec![
                window_status(0, AgentKind::Generic, ParseResult::idle(), false),
                window_status(1, AgentKind::ClaudeCode, ParseResult::question("Push?"), false),
            ],
        );

        let entry = &snapshot.needs_attention[0];
        assert!(entry.attention_count > 0);
        assert!(entry.windows.iter().any(|w| w.needs_attention));
    }

    #[test]
    fn test_generic_attention_types_do_not_flag() {
        // An error in a plain shell pane is not agent attention.
        let mut snapshot = SessionsSnapshot::empty();
        place_session(
            &mut snapshot,
            session("a"),
            vec![window_status(
                0,
                AgentKind::Generic,
                ParseResult::error("boom"),
                false,
            )],
        );
        assert!(snapshot.needs_attention.is_empty());
        assert_eq!(snapshot.idle.len(), 1);
    }

    #[test]
    fn test_windows_sorted_by_priority_stable() {
        let mut snapshot = SessionsSnapshot::empty();
        place_session(
            &mut snapshot,
            session("a"),
            vec![
                window_status(0, AgentKind::Generic, ParseResult::idle(), false),
                window_status(1, AgentKind::ClaudeCode, ParseResult::working("x"), true),
                window_status(2, AgentKind::ClaudeCode, ParseResult::choice("q", vec!["a".into(), "b".into()]), false),
                window_status(3, AgentKind::Generic, ParseResult::idle(), false),
                window_status(4, AgentKind::ClaudeCode, ParseResult::working("y"), true),
            ],
        );

        let order: Vec<u32> = snapshot.needs_attention[0]
            .windows
            .iter()
            .map(|w| w.window.index)
            .collect();
        // attention, then working (1 before 4: stable), then idle (0 before 3).
        assert_eq!(order, vec![2, 1, 4, 0, 3]);
    }

    #[test]
    fn test_build_preview_filters_and_tails() {
        let output = "one\n\n────────────\ntwo\x1b[31m red\x1b[0m\nthree[2m\n";
        let preview = build_preview(output, 2);
        assert_eq!(preview, vec!["two red", "three"]);
    }

    #[test]
    fn test_build_preview_strips_hyperlinks() {
        let output = "see \x1b]8;;http://x\x1b\\the docs\x1b]8;;\x1b\\ now\n";
        let preview = build_preview(output, 5);
        assert_eq!(preview, vec!["see the docs now"]);
    }

    #[test]
    fn test_snapshot_hub_last_value_wins() {
        let hub = SnapshotHub::new();
        let mut rx = hub.subscribe();
        for _ in 0..10 {
            hub.publish(SessionsSnapshot::empty());
        }
        // The receiver lagged; it recovers and still observes a snapshot.
        let mut seen = 0;
        while let Ok(result) = rx.try_recv() {
            let _ = result;
            seen += 1;
        }
        assert!(seen <= SNAPSHOT_CHANNEL_CAPACITY);
        assert_eq!(hub.latest().session_count(), 0);
    }
}
