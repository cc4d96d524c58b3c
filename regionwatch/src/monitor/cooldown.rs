//! Entry-event deduplication.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers recent region entries for a cooldown window.
///
/// Guarantees at most one emitted `entered` event per region id per window.
/// Entries older than the window are pruned lazily whenever the table is
/// consulted.
#[derive(Debug)]
pub struct CooldownTable {
    window: Duration,
    entries: HashMap<String, Instant>,
}

impl CooldownTable {
    /// Create a table with the given cooldown window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Decide whether an entry for `id` may be emitted at `now`.
    ///
    /// Returns `true` and records the entry when no prior entry for the same
    /// id is younger than the window; returns `false` (suppress) otherwise.
    pub fn check_and_record(&mut self, id: &str, now: Instant) -> bool {
        self.prune(now);

        if let Some(&recorded) = self.entries.get(id) {
            if now.saturating_duration_since(recorded) < self.window {
                return false;
            }
        }

        self.entries.insert(id.to_string(), now);
        true
    }

    /// Drop entries older than the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.entries
            .retain(|_, recorded| now.saturating_duration_since(*recorded) < window);
    }

    /// Number of remembered entries, without pruning first.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
