use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Json, Redirect};
use axum::Form;
use serde::{Deserialize, Serialize};

use crate::monitor::inspect_pane;
use crate::tmux::{PaneAddress, PaneInfo};

use super::stream::PaneMeta;
use super::{ApiError, AppState};

/// One-shot pane snapshot: the stream's `meta` record plus the filtered
/// output.
#[derive(Debug, Serialize)]
pub struct PaneData {
    pub target: String,
    #[serde(flatten)]
    pub meta: PaneMeta,
    pub output: String,
}

/// Resolve a URL pane target (already percent-decoded by the router) into a
/// concrete address.
///
/// `session` alone addresses the session's active window; a missing pane
/// index defaults to `0`. The `window 0, pane 0` form is treated as "the
/// interesting pane of this session": when the current snapshot knows a
/// priority pane, it is substituted.
pub fn parse_target(state: &AppState, raw: &str) -> Result<PaneAddress, ApiError> {
    let (session, window, pane) = match split_target(raw) {
        Some(parts) => parts,
        None => {
            // Session-only form: fall back to the active window (or first).
            let windows = state.tmux.list_windows(raw)?;
            let window = windows
                .iter()
                .find(|w| w.active)
                .or_else(|| windows.first())
                .map(|w| w.index)
                .ok_or_else(|| ApiError::NotFound(format!("session has no windows: {}", raw)))?;
            return Ok(PaneAddress::new(raw.to_string(), window, 0));
        }
    };

    let mut addr = PaneAddress::new(session, window, pane);
    if window == 0 && pane == 0 {
        if let Some(better) = priority_pane(state, &addr.session) {
            addr = better;
        }
    }
    Ok(addr)
}

/// Split `session:window.pane` / `session:window` from the right so session
/// names may contain `:` and `.`. Returns `None` for the session-only form.
fn split_target(raw: &str) -> Option<(String, u32, u32)> {
    let (session, rest) = raw.rsplit_once(':')?;
    let (window, pane) = match rest.split_once('.') {
        Some((w, p)) => (w.parse().ok()?, p.parse().ok()?),
        None => (rest.parse().ok()?, 0),
    };
    Some((session.to_string(), window, pane))
}

/// The highest-priority pane the last aggregation chose for this session.
fn priority_pane(state: &AppState, session: &str) -> Option<PaneAddress> {
    let snapshot = state.hub.latest();
    snapshot
        .needs_attention
        .iter()
        .chain(snapshot.active.iter())
        .chain(snapshot.idle.iter())
        .find(|s| s.session.name == session)
        .and_then(|s| s.windows.first())
        .map(|w| PaneAddress::new(session.to_string(), w.window.index, w.pane))
}

/// Pane metadata (command, cwd) for an address, erroring when the pane is
/// gone.
pub fn lookup_pane(state: &AppState, addr: &PaneAddress) -> Result<PaneInfo, ApiError> {
    let panes = state.tmux.list_panes(&addr.session, addr.window)?;
    panes
        .into_iter()
        .find(|p| p.index == addr.pane)
        .ok_or_else(|| ApiError::NotFound(format!("no such pane: {}", addr)))
}

/// `GET /api/pane/<target>`.
pub async fn get_pane(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<Json<PaneData>, ApiError> {
    let addr = parse_target(&state, &target)?;
    let info = lookup_pane(&state, &addr)?;

    let view = inspect_pane(
        &state.tmux,
        &state.registry,
        &addr,
        &info.command,
        &info.path,
        state.config.capture_lines,
    )?;

    Ok(Json(PaneData {
        target: addr.url_target(),
        meta: PaneMeta::from_view(&view),
        output: view.output,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendForm {
    pub input: String,
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub noenter: bool,
}

/// `POST /api/pane/<target>/send` — queue a keystroke batch.
pub async fn send_input(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Form(form): Form<SendForm>,
) -> Result<StatusCode, ApiError> {
    let addr = parse_target(&state, &target)?;
    if form.special {
        state.tmux.send_special_key(&addr, &form.input)?;
    } else {
        state.tmux.send_keys(&addr, &form.input, !form.noenter)?;
    }
    Ok(StatusCode::OK)
}

/// `POST /api/pane/<target>/kill`.
pub async fn kill_pane(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<Redirect, ApiError> {
    let addr = parse_target(&state, &target)?;
    state.tmux.kill_pane(&addr)?;
    Ok(Redirect::to("/"))
}

/// `POST /api/pane/<target>/respawn`.
pub async fn respawn_pane(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<StatusCode, ApiError> {
    let addr = parse_target(&state, &target)?;
    state.tmux.respawn_pane(&addr)?;
    Ok(StatusCode::OK)
}

/// `POST /api/pane/<target>/kill-window`.
pub async fn kill_window(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<Redirect, ApiError> {
    let addr = parse_target(&state, &target)?;
    state.tmux.kill_window(&addr.session, addr.window)?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_target() {
        assert_eq!(
            split_target("main:2.1"),
            Some(("main".to_string(), 2, 1))
        );
    }

    #[test]
    fn test_split_defaults_pane_to_zero() {
        assert_eq!(split_target("main:3"), Some(("main".to_string(), 3, 0)));
    }

    #[test]
    fn test_split_session_with_colon() {
        assert_eq!(
            split_target("work:api:1.0"),
            Some(("work:api".to_string(), 1, 0))
        );
    }

    #[test]
    fn test_split_session_only() {
        assert_eq!(split_target("main"), None);
        // A colon followed by a non-numeric suffix is part of the name.
        assert_eq!(split_target("odd:name"), None);
    }
}
