// src/http.rs
//
// Framework-agnostic side of the HTTP boundary: header names, the 429 body
// and a guard that wraps a downstream handler.

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;

use crate::algorithms::{RateLimitAlgorithm, WindowState};
use crate::error::CoreError;
use crate::identity::{Authenticator, RequestMeta};
use crate::limiter::{Decision, RateLimiter};

pub const X_RATELIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const X_RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const X_RATELIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

pub const TOO_MANY_REQUESTS: u16 = 429;

/// Anything response headers can be written into
pub trait HeaderSink {
    fn set_header(&mut self, name: &str, value: String);
}

impl HeaderSink for HashMap<String, String> {
    fn set_header(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }
}

impl HeaderSink for Vec<(String, String)> {
    fn set_header(&mut self, name: &str, value: String) {
        self.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.push((name.to_string(), value));
    }
}

/// Quota state of the most restrictive window of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds
    pub reset: u64,
}

impl From<&WindowState> for RateLimitHeaders {
    fn from(window: &WindowState) -> Self {
        Self {
            limit: window.limit,
            remaining: window.remaining,
            reset: window.reset_at,
        }
    }
}

impl RateLimitHeaders {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (X_RATELIMIT_LIMIT, self.limit.to_string()),
            (X_RATELIMIT_REMAINING, self.remaining.to_string()),
            (X_RATELIMIT_RESET, self.reset.to_string()),
        ]
    }

    pub fn apply<S: HeaderSink + ?Sized>(&self, sink: &mut S) {
        for (name, value) in self.pairs() {
            sink.set_header(name, value);
        }
    }
}

/// A request turned away by the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub headers: RateLimitHeaders,

    /// Seconds until the reported reset, at least 1
    pub retry_after: u64,
}

impl Rejection {
    pub(crate) fn new(headers: RateLimitHeaders, now_millis: u64) -> Self {
        let headers = RateLimitHeaders {
            remaining: 0,
            ..headers
        };
        let wait_millis = headers.reset.saturating_mul(1_000).saturating_sub(now_millis);

        Self {
            headers,
            retry_after: wait_millis.div_ceil(1_000).max(1),
        }
    }

    pub fn status(&self) -> u16 {
        TOO_MANY_REQUESTS
    }

    /// Rate limit headers plus `Retry-After`
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.headers.pairs();
        pairs.push((RETRY_AFTER, self.retry_after.to_string()));
        pairs
    }

    pub fn apply<S: HeaderSink + ?Sized>(&self, sink: &mut S) {
        for (name, value) in self.pairs() {
            sink.set_header(name, value);
        }
    }

    /// `{"error": {"code": "rate_limited", "message": "Too Many Requests"}}`
    pub fn body(&self) -> Value {
        self.to_error().to_body()
    }

    pub fn to_error(&self) -> CoreError {
        CoreError::RateLimitExceeded {
            retry_after: self.retry_after,
        }
    }
}

impl From<Rejection> for CoreError {
    fn from(rejection: Rejection) -> Self {
        rejection.to_error()
    }
}

/// Runs `handler` only if the limiter admits the request.
///
/// Admitted responses get the post-recording rate limit headers; requests to
/// routes without a policy pass through untouched. A rejection is returned
/// for the caller to render with [`Rejection::status`], [`Rejection::pairs`]
/// and [`Rejection::body`].
pub async fn guard<A, R, F, Fut>(
    limiter: &RateLimiter<A>,
    authenticator: &dyn Authenticator,
    request: &RequestMeta,
    handler: F,
) -> Result<R, Rejection>
where
    A: RateLimitAlgorithm,
    R: HeaderSink,
    F: FnOnce() -> Fut,
    Fut: Future<Output = R>,
{
    let principal = authenticator.resolve_identity(request);

    match limiter.check(request, &principal) {
        Decision::Unlimited => Ok(handler().await),
        Decision::Allowed(headers) => {
            let mut response = handler().await;
            headers.apply(&mut response);
            Ok(response)
        }
        Decision::Rejected(rejection) => Err(rejection),
    }
}
