//! Per-session escalation tracking.
//!
//! Each session carries a counter of consecutive uncertain responses;
//! a confident response resets it. The tracker is bounded: when the
//! session count exceeds capacity, the least recently touched session
//! is evicted, so a long-lived server never grows without limit.

use std::collections::HashMap;
use std::sync::Mutex;

struct SessionEntry {
    failures: u32,
    last_touch: u64,
}

struct Inner {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

pub struct SessionTracker {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl SessionTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Record whether the session's latest response was uncertain and
    /// return the updated consecutive-failure count.
    pub fn record(&self, session_id: &str, uncertain: bool) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        let entry = inner
            .entries
            .entry(session_id.to_string())
            .or_insert(SessionEntry {
                failures: 0,
                last_touch: clock,
            });
        entry.last_touch = clock;
        if uncertain {
            entry.failures += 1;
        } else {
            entry.failures = 0;
        }
        let failures = entry.failures;

        if inner.entries.len() > self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_touch)
                .map(|(id, _)| id.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        failures
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_failures_accumulate() {
        let tracker = SessionTracker::new(8);
        assert_eq!(tracker.record("s1", true), 1);
        assert_eq!(tracker.record("s1", true), 2);
        assert_eq!(tracker.record("s1", true), 3);
    }

    #[test]
    fn confident_response_resets_the_counter() {
        let tracker = SessionTracker::new(8);
        tracker.record("s1", true);
        tracker.record("s1", true);
        assert_eq!(tracker.record("s1", false), 0);
        // Escalating again takes three fresh uncertain responses.
        assert_eq!(tracker.record("s1", true), 1);
        assert_eq!(tracker.record("s1", true), 2);
        assert_eq!(tracker.record("s1", true), 3);
    }

    #[test]
    fn sessions_do_not_interact() {
        let tracker = SessionTracker::new(8);
        tracker.record("s1", true);
        tracker.record("s1", true);
        assert_eq!(tracker.record("s2", true), 1);
    }

    #[test]
    fn least_recently_touched_session_is_evicted() {
        let tracker = SessionTracker::new(2);
        tracker.record("a", true);
        tracker.record("b", true);
        tracker.record("a", true); // keeps "a" fresh
        tracker.record("c", true); // evicts "b"
        assert_eq!(tracker.tracked_sessions(), 2);

        // "a" survived eviction with its streak; "b" starts over.
        assert_eq!(tracker.record("a", true), 3);
        assert_eq!(tracker.record("b", true), 1);
    }
}
