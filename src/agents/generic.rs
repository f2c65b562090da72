use std::path::Path;

use crate::tmux::Mode;

use super::{Agent, AgentKind, ParseResult, StateFileError};

/// Fallback for shells and anything not identified as a known agent: never
/// detects, never filters, always idle.
pub struct GenericAgent;

impl GenericAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for GenericAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Generic
    }

    fn detect_from_output(&self, _stripped: &str) -> bool {
        false
    }

    fn filter_status_bar(&self, raw: &str) -> String {
        raw.to_string()
    }

    fn detect_mode(&self, _raw: &str) -> Mode {
        Mode::Unknown
    }

    fn parse_output(&self, _raw: &str) -> ParseResult {
        ParseResult::idle()
    }

    fn state_from_files(&self, _pane_path: &Path) -> Result<ParseResult, StateFileError> {
        Err(StateFileError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::StatusKind;

    #[test]
    fn test_generic_is_inert() {
        let a = GenericAgent::new();
        assert!(!a.detect_from_output("╭─╮ -- INSERT -- Do you want to"));
        assert_eq!(a.parse_output("anything").kind, StatusKind::Idle);
        assert_eq!(a.detect_mode("-- INSERT --"), Mode::Unknown);
        assert_eq!(a.filter_status_bar("a\nb"), "a\nb");
    }
}
