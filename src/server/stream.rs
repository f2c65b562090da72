use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agents::{AgentKind, StatusKind};
use crate::monitor::{inspect_pane, PaneView};
use crate::tmux::{Mode, PaneAddress, ResizeAxis};

use super::pane::{lookup_pane, parse_target};
use super::AppState;

/// Settle time after an input nudge before the forced capture, so the pane
/// has echoed the keystrokes.
const NUDGE_SETTLE: Duration = Duration::from_millis(50);

/// Metadata record sent whenever it changes. All fields are JSON values,
/// never double-encoded strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaneMeta {
    pub agent: AgentKind,
    pub mode: Mode,
    pub status: StatusKind,
    pub activity: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_line: Option<String>,
}

impl PaneMeta {
    pub fn from_view(view: &PaneView) -> Self {
        Self {
            agent: view.agent,
            mode: view.mode,
            status: view.result.kind,
            activity: view
                .result
                .activity
                .clone()
                .or_else(|| view.result.question.clone())
                .unwrap_or_default(),
            choices: view.result.choices.clone(),
            suggestion: view.result.suggestion.clone(),
            status_line: if view.status_line.is_empty() {
                None
            } else {
                Some(view.status_line.clone())
            },
        }
    }
}

/// Server → client frames. The payload under `data` is a JSON value.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum ServerFrame {
    Output { data: String },
    Meta(PaneMeta),
}

/// Client → server frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum ClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

/// `GET /api/pane/<target>/ws` — live bidirectional pane stream.
pub async fn pane_ws(
    State(state): State<AppState>,
    Path(target): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let addr = match parse_target(&state, &target) {
        Ok(addr) => addr,
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_pane_stream(socket, state, addr))
}

async fn handle_pane_stream(socket: WebSocket, state: AppState, addr: PaneAddress) {
    // Pane command and cwd are discovered once; per-tick work is capture
    // plus parse only.
    let info = match lookup_pane(&state, &addr) {
        Ok(info) => info,
        Err(_) => {
            debug!(target = %addr, "pane gone before stream start");
            return;
        }
    };

    let (sink, mut ws_stream) = socket.split();
    let (nudge_tx, nudge_rx) = mpsc::channel::<()>(1);

    let mut write_task = tokio::spawn(write_loop(
        sink,
        state.clone(),
        addr.clone(),
        info.command,
        info.path,
        nudge_rx,
    ));

    loop {
        tokio::select! {
            _ = &mut write_task => break,
            msg = ws_stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        handle_client_frame(&state, &addr, &nudge_tx, &text);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    write_task.abort();
    debug!(target = %addr, "pane stream closed");
}

fn handle_client_frame(
    state: &AppState,
    addr: &PaneAddress,
    nudge_tx: &mpsc::Sender<()>,
    text: &str,
) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Input { data }) => {
            if let Err(e) = state.tmux.send_keys(addr, &data, false) {
                warn!(target = %addr, "send-keys failed: {}", e);
            }
            // Capacity 1: a pending nudge already covers this input.
            let _ = nudge_tx.try_send(());
        }
        Ok(ClientFrame::Resize { cols, rows }) => {
            if let Err(e) = state
                .tmux
                .resize_pane(addr, ResizeAxis::Width, cols)
                .and_then(|_| state.tmux.resize_pane(addr, ResizeAxis::Height, rows))
            {
                warn!(target = %addr, "resize failed: {}", e);
            }
            let _ = nudge_tx.try_send(());
        }
        Err(e) => debug!(target = %addr, "ignoring malformed frame: {}", e),
    }
}

/// Capture ticker: emits `output` frames when the filtered output changes
/// and `meta` frames when the metadata record changes. Ends on the first
/// capture or send failure.
async fn write_loop(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    state: AppState,
    addr: PaneAddress,
    command: String,
    path: String,
    mut nudge_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(state.config.tick_pane_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_output: Option<String> = None;
    let mut last_meta: Option<PaneMeta> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(()) = nudge_rx.recv() => {
                tokio::time::sleep(NUDGE_SETTLE).await;
            }
        }

        let view = match inspect_pane(
            &state.tmux,
            &state.registry,
            &addr,
            &command,
            &path,
            state.config.capture_lines,
        ) {
            Ok(view) => view,
            Err(e) => {
                debug!(target = %addr, "capture failed, ending stream: {}", e);
                return;
            }
        };

        let meta = PaneMeta::from_view(&view);

        if last_output.as_deref() != Some(view.output.as_str()) {
            let frame = ServerFrame::Output {
                data: view.output.clone(),
            };
            if send_frame(&mut sink, &frame).await.is_err() {
                return;
            }
            last_output = Some(view.output);
        }

        if last_meta.as_ref() != Some(&meta) {
            let frame = ServerFrame::Meta(meta.clone());
            if send_frame(&mut sink, &frame).await.is_err() {
                return;
            }
            last_meta = Some(meta);
        }
    }
}

async fn send_frame(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap();
    sink.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_frame_wire_shape() {
        let frame = ServerFrame::Output {
            data: "hello\x1b[0m".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "output");
        assert_eq!(value["data"]["data"], "hello\u{1b}[0m");
    }

    #[test]
    fn test_meta_frame_wire_shape() {
        let meta = PaneMeta {
            agent: AgentKind::ClaudeCode,
            mode: Mode::Insert,
            status: StatusKind::Choice,
            activity: String::new(),
            choices: vec!["Yes".to_string(), "No".to_string()],
            suggestion: None,
            status_line: Some("> ".to_string()),
        };
        let json = serde_json::to_string(&ServerFrame::Meta(meta)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "meta");
        assert_eq!(value["data"]["agent"], "claude-code");
        assert_eq!(value["data"]["mode"], "insert");
        assert_eq!(value["data"]["status"], "choice");
        assert_eq!(value["data"]["choices"][0], "Yes");
        // Empty optionals stay off the wire entirely.
        assert!(value["data"].get("suggestion").is_none());
    }

    #[test]
    fn test_client_frame_parsing() {
        let input: ClientFrame =
            serde_json::from_str(r#"{"type":"input","data":{"data":"ls\n"}}"#).unwrap();
        assert!(matches!(input, ClientFrame::Input { data } if data == "ls\n"));

        let resize: ClientFrame =
            serde_json::from_str(r#"{"type":"resize","data":{"cols":120,"rows":40}}"#).unwrap();
        assert!(matches!(resize, ClientFrame::Resize { cols: 120, rows: 40 }));
    }

    #[test]
    fn test_meta_equality_drives_coalescing() {
        let a = PaneMeta {
            agent: AgentKind::Amp,
            mode: Mode::Unknown,
            status: StatusKind::Working,
            activity: "Processing".to_string(),
            choices: Vec::new(),
            suggestion: None,
            status_line: None,
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.choices.push("1".to_string());
        assert_ne!(a, b);
    }
}
