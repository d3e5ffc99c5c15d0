// src/algorithms/mod.rs

pub mod sliding_window;

#[cfg(test)]
mod tests;

pub use sliding_window::SlidingWindow;

use crate::config::RateLimitWindow;
use std::fmt::Debug;

/// Quota state of a single window after a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Configured limit of the window
    pub limit: u64,

    /// Requests still allowed inside the window
    pub remaining: u64,

    /// Unix time (seconds) at which the oldest live entry expires
    pub reset_at: u64,

    /// Window length in seconds
    pub window_seconds: u64,
}

/// Outcome of checking every window of a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowVerdict {
    /// Whether the request was admitted and recorded
    pub allowed: bool,

    /// One state per configured window, in declaration order
    pub windows: Vec<WindowState>,
}

impl WindowVerdict {
    /// Window with the least remaining capacity.
    ///
    /// Among exhausted windows the one that resets last wins, so its reset
    /// is a time at which every window has room again. Other ties go to the
    /// first declared window.
    pub fn most_restrictive(&self) -> Option<&WindowState> {
        self.windows.iter().reduce(|best, w| {
            let exhausted_longer =
                w.remaining == 0 && best.remaining == 0 && w.reset_at > best.reset_at;
            if w.remaining < best.remaining || exhausted_longer {
                w
            } else {
                best
            }
        })
    }
}

/// Core trait that rate limiting algorithms implement
pub trait RateLimitAlgorithm: Send + Sync + Debug {
    /// Checks every window of a policy for one identity and, only if all of
    /// them have capacity, records the request in each of them.
    ///
    /// The check and the record happen under one critical section.
    fn check_and_record(
        &self,
        policy_key: &str,
        identity: &str,
        windows: &[RateLimitWindow],
        now_millis: u64,
    ) -> WindowVerdict;

    /// Number of live entries recorded for one window
    fn recorded(
        &self,
        policy_key: &str,
        identity: &str,
        window_index: usize,
        window: &RateLimitWindow,
        now_millis: u64,
    ) -> usize;

    /// Drops every counter
    fn reset_all(&self);
}
