//! Webhook replay guard
//!
//! Remembers delivered webhook ids for the signature tolerance window.
//! Entries older than the window are pruned on every insert; a replay
//! outside the window is already rejected by the timestamp check.

use std::collections::HashMap;

use parking_lot::Mutex;

pub struct ReplayGuard {
    window_secs: i64,
    seen: Mutex<HashMap<String, i64>>,
}

impl ReplayGuard {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `id` as seen at `now`, returns false if it was already seen
    pub fn check_and_record(&self, id: &str, now: i64) -> bool {
        let mut seen = self.seen.lock();
        let window = self.window_secs;
        seen.retain(|_, at| now - *at <= window);

        if seen.contains_key(id) {
            return false;
        }
        seen.insert(id.to_string(), now);
        true
    }

    /// Forget `id` so a redelivery is processed again
    pub fn forget(&self, id: &str) {
        self.seen.lock().remove(id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
