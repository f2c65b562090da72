use thiserror::Error;

/// Failure taxonomy for tmux invocations. Callers treat `NoServer` as an
/// empty world, `NotFound` as a vanished target, and the rest as transport
/// problems worth logging.
#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("no tmux server running")]
    NoServer,

    #[error("tmux target not found: {0}")]
    NotFound(String),

    #[error("tmux {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to execute tmux: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TmuxError>;

impl TmuxError {
    /// Classify a non-zero exit by its stderr text.
    pub(crate) fn from_stderr(command: &str, stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        if lower.contains("no server running") || lower.contains("error connecting to") {
            TmuxError::NoServer
        } else if lower.contains("can't find") || lower.contains("unknown pane") {
            TmuxError::NotFound(stderr.trim().to_string())
        } else {
            TmuxError::CommandFailed {
                command: command.to_string(),
                stderr: stderr.trim().to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_classification() {
        assert!(matches!(
            TmuxError::from_stderr("list-sessions", "no server running on /tmp/tmux-1000/default"),
            TmuxError::NoServer
        ));
        assert!(matches!(
            TmuxError::from_stderr("capture-pane", "can't find pane: main:0.7"),
            TmuxError::NotFound(_)
        ));
        assert!(matches!(
            TmuxError::from_stderr("send-keys", "usage: send-keys ..."),
            TmuxError::CommandFailed { .. }
        ));
    }
}
