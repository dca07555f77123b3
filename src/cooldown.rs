//! Per-source rate-limit cooldown
//!
//! After a source reports throttling it is skipped for a fixed window.
//! Windows expire on their own; nothing here ever disables a source
//! permanently. State is in-memory and resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Tracks which sources are cooling down after a rate limit
pub struct CooldownTracker {
    until: Mutex<HashMap<String, Instant>>,
    window: Duration,
}

impl CooldownTracker {
    /// Creates a tracker; a zero `window` disables cooldowns
    pub fn new(window: Duration) -> Self {
        Self {
            until: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Lock the map, recovering from poison. A stale cooldown at worst
    /// skips a source once more than it should.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.until.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Cooldown mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// Starts (or restarts) the cooldown window for `source`
    pub fn mark_rate_limited(&self, source: &str) {
        if !self.is_enabled() {
            return;
        }

        let until = Instant::now() + self.window;
        self.lock().insert(source.to_string(), until);
        tracing::info!(
            source,
            cooldown_secs = self.window.as_secs(),
            "Source rate limited, cooling down"
        );
    }

    /// True while `source` is inside its cooldown window
    pub fn is_cooling_down(&self, source: &str) -> bool {
        let mut until = self.lock();
        match until.get(source) {
            Some(deadline) if Instant::now() < *deadline => true,
            Some(_) => {
                until.remove(source);
                tracing::debug!(source, "Cooldown expired");
                false
            }
            None => false,
        }
    }

    /// Time left in the cooldown window for `source`
    pub fn remaining(&self, source: &str) -> Option<Duration> {
        self.lock()
            .get(source)
            .and_then(|deadline| deadline.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Names of sources currently cooling down, sorted
    pub fn active(&self) -> Vec<String> {
        let now = Instant::now();
        let mut until = self.lock();
        until.retain(|_, deadline| now < *deadline);

        let mut names: Vec<String> = until.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clears the cooldown for `source`
    pub fn reset(&self, source: &str) {
        self.lock().remove(source);
    }
}
