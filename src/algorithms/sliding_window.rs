// src/algorithms/sliding_window.rs

use crate::algorithms::{RateLimitAlgorithm, WindowState, WindowVerdict};
use crate::config::RateLimitWindow;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counter identity: one deque per policy, identity and window index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    policy_key: String,
    identity: String,
    window_index: usize,
}

impl CounterKey {
    fn new(policy_key: &str, identity: &str, window_index: usize) -> Self {
        Self {
            policy_key: policy_key.to_string(),
            identity: identity.to_string(),
            window_index,
        }
    }
}

/// Sliding Window rate limiting algorithm
///
/// Every accepted request leaves a timestamp in each window of its policy.
/// A window admits a request while fewer than `limit` timestamps fall inside
/// the trailing `window_seconds`. Expired timestamps are purged when the
/// counter is next touched; empty counters are dropped at the same time, so
/// there is no background reaper.
///
/// State is process-local. Two replicas each enforce the full quota.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    counters: Mutex<HashMap<CounterKey, VecDeque<u64>>>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a deque half-updated, so
    // the map is still usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<CounterKey, VecDeque<u64>>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live counters, mostly useful for tests
    pub fn counter_count(&self) -> usize {
        self.lock().len()
    }
}

/// Drops entries strictly older than `now - window`
fn purge(entries: &mut VecDeque<u64>, now_millis: u64, window_millis: u64) {
    let cutoff = now_millis.saturating_sub(window_millis);
    while entries.front().is_some_and(|&ts| ts < cutoff) {
        entries.pop_front();
    }
}

/// First whole unix second at which the oldest entry is no longer live.
///
/// An entry is still counted at exactly `oldest + window`, so the reset is
/// the whole second strictly after that instant.
fn reset_at(entries: Option<&VecDeque<u64>>, now_millis: u64, window_millis: u64) -> u64 {
    let oldest = entries.and_then(|e| e.front().copied()).unwrap_or(now_millis);
    oldest.saturating_add(window_millis) / 1_000 + 1
}

impl RateLimitAlgorithm for SlidingWindow {
    fn check_and_record(
        &self,
        policy_key: &str,
        identity: &str,
        windows: &[RateLimitWindow],
        now_millis: u64,
    ) -> WindowVerdict {
        if windows.is_empty() {
            return WindowVerdict {
                allowed: true,
                windows: Vec::new(),
            };
        }

        let mut counters = self.lock();
        let keys: Vec<CounterKey> = (0..windows.len())
            .map(|i| CounterKey::new(policy_key, identity, i))
            .collect();

        // Purge and count every window before deciding
        let mut allowed = true;
        for (key, window) in keys.iter().zip(windows) {
            let used = match counters.get_mut(key) {
                Some(entries) => {
                    purge(entries, now_millis, window.window_millis());
                    let used = entries.len();
                    if used == 0 {
                        counters.remove(key);
                    }
                    used
                }
                None => 0,
            };

            if used as u64 >= window.limit {
                allowed = false;
            }
        }

        // Rejected attempts never consume quota
        if allowed {
            for key in &keys {
                counters.entry(key.clone()).or_default().push_back(now_millis);
            }
        }

        let states = keys
            .iter()
            .zip(windows)
            .map(|(key, window)| {
                let entries = counters.get(key);
                let used = entries.map_or(0, |e| e.len()) as u64;
                WindowState {
                    limit: window.limit,
                    remaining: window.limit.saturating_sub(used),
                    reset_at: reset_at(entries, now_millis, window.window_millis()),
                    window_seconds: window.window_seconds,
                }
            })
            .collect();

        WindowVerdict {
            allowed,
            windows: states,
        }
    }

    fn recorded(
        &self,
        policy_key: &str,
        identity: &str,
        window_index: usize,
        window: &RateLimitWindow,
        now_millis: u64,
    ) -> usize {
        let mut counters = self.lock();
        let key = CounterKey::new(policy_key, identity, window_index);

        match counters.get_mut(&key) {
            Some(entries) => {
                purge(entries, now_millis, window.window_millis());
                entries.len()
            }
            None => 0,
        }
    }

    fn reset_all(&self) {
        self.lock().clear();
    }
}
