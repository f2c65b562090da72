use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::text::strip_ansi;

use super::{Agent, AgentKind, AgentLogRoots, AmpAgent, ClaudeCodeAgent, GenericAgent};

struct CacheEntry {
    kind: AgentKind,
    command: String,
    expires: Instant,
}

/// Maps panes to agents and caches the classification.
///
/// Resolution order: fresh cache entry, command-substring match, output
/// detection in registration order, generic fallback. Entries expire after
/// the TTL or eagerly when the pane's running command changes.
pub struct AgentRegistry {
    claude: Arc<ClaudeCodeAgent>,
    amp: Arc<AmpAgent>,
    generic: Arc<GenericAgent>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl AgentRegistry {
    pub fn new(ttl: Duration, roots: &AgentLogRoots) -> Self {
        Self {
            claude: Arc::new(ClaudeCodeAgent::new(roots)),
            amp: Arc::new(AmpAgent::new(roots)),
            generic: Arc::new(GenericAgent::new()),
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Classify the pane identified by `target`, currently running `command`,
    /// whose latest capture is `output` (escape sequences allowed).
    pub fn detect(&self, target: &str, command: &str, output: &str) -> AgentKind {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(target) {
                if entry.expires > Instant::now() && entry.command == command {
                    return entry.kind;
                }
            }
        }

        let kind = self.classify(command, output);

        let mut cache = self.cache.write();
        cache.insert(
            target.to_string(),
            CacheEntry {
                kind,
                command: command.to_string(),
                expires: Instant::now() + self.ttl,
            },
        );
        kind
    }

    fn classify(&self, command: &str, output: &str) -> AgentKind {
        let command_lower = command.to_lowercase();
        if command_lower.contains("claude") {
            return AgentKind::ClaudeCode;
        }
        if command_lower.contains("amp") {
            return AgentKind::Amp;
        }

        let stripped = strip_ansi(output);
        if self.claude.detect_from_output(&stripped) {
            return AgentKind::ClaudeCode;
        }
        if self.amp.detect_from_output(&stripped) {
            return AgentKind::Amp;
        }
        AgentKind::Generic
    }

    /// The shared implementation for a kind.
    pub fn agent(&self, kind: AgentKind) -> Arc<dyn Agent> {
        match kind {
            AgentKind::ClaudeCode => self.claude.clone(),
            AgentKind::Amp => self.amp.clone(),
            AgentKind::Generic => self.generic.clone(),
        }
    }

    /// Drop cache entries for panes that are no longer observed. Called by
    /// the aggregator once per tick with the set of live targets.
    pub fn retain_panes(&self, live: &[String]) {
        let mut cache = self.cache.write();
        cache.retain(|target, _| live.iter().any(|t| t == target));
    }
}
