// src/limiter.rs

use std::sync::Arc;

use tracing::{debug, info};

use crate::algorithms::{RateLimitAlgorithm, SlidingWindow};
use crate::clock::{Clock, SystemClock};
use crate::config::{LimiterConfig, PolicyTable, RateLimitPolicy};
use crate::error::{CoreError, Result};
use crate::http::{RateLimitHeaders, Rejection};
use crate::identity::{ClientIpResolver, Principal, RequestMeta};
use crate::rate_limit_event;

/// What to do with an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No policy covers the route; no headers are attached
    Unlimited,

    /// Admitted and recorded in every window of the policy
    Allowed(RateLimitHeaders),

    /// At least one window is exhausted; nothing was recorded
    Rejected(Rejection),
}

impl Decision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected(_))
    }

    /// Headers to attach to the response, if any
    pub fn headers(&self) -> Option<&RateLimitHeaders> {
        match self {
            Decision::Unlimited => None,
            Decision::Allowed(headers) => Some(headers),
            Decision::Rejected(rejection) => Some(&rejection.headers),
        }
    }

    /// Turns a rejection into [`CoreError::RateLimitExceeded`]
    pub fn into_result(self) -> Result<Option<RateLimitHeaders>> {
        match self {
            Decision::Unlimited => Ok(None),
            Decision::Allowed(headers) => Ok(Some(headers)),
            Decision::Rejected(rejection) => Err(CoreError::from(rejection)),
        }
    }
}

/// Admission control for inbound requests.
///
/// Owned by the composition root and handed to the HTTP layer explicitly.
/// Counters live in process memory, so the limits hold per process only.
#[derive(Debug)]
pub struct RateLimiter<A = SlidingWindow>
where
    A: RateLimitAlgorithm,
{
    policies: PolicyTable,
    algorithm: A,
    clock: Arc<dyn Clock>,
    ip_resolver: ClientIpResolver,
}

impl RateLimiter<SlidingWindow> {
    /// Sliding window limiter on the wall clock
    pub fn new(config: LimiterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_algorithm(config, SlidingWindow::new(), clock)
    }
}

impl<A> RateLimiter<A>
where
    A: RateLimitAlgorithm,
{
    pub fn with_algorithm(config: LimiterConfig, algorithm: A, clock: Arc<dyn Clock>) -> Result<Self> {
        let policies = PolicyTable::new(config.policies)?;

        info!(
            policies = policies.len(),
            trust_proxy_ip_headers = config.trust_proxy_ip_headers,
            "Rate limiter initialized"
        );

        Ok(Self {
            policies,
            algorithm,
            clock,
            ip_resolver: ClientIpResolver::new(config.trust_proxy_ip_headers),
        })
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn policy_for(&self, method: &str, route: &str) -> Option<&RateLimitPolicy> {
        self.policies.find(method, route)
    }

    /// Bucketing key the request would be counted under for `policy`
    pub fn identity_for(
        &self,
        policy: &RateLimitPolicy,
        request: &RequestMeta,
        principal: &Principal,
    ) -> String {
        self.ip_resolver
            .identity_key(policy.keying_basis, principal, request)
    }

    /// Decides whether `request` may proceed and records it if so.
    ///
    /// Never fails: a route without a policy is simply not limited.
    pub fn check(&self, request: &RequestMeta, principal: &Principal) -> Decision {
        let Some(policy) = self.policies.find(&request.method, &request.route) else {
            debug!(
                method = request.method.as_str(),
                route = request.route.as_str(),
                "No rate limit policy for route"
            );
            return Decision::Unlimited;
        };

        let identity = self.identity_for(policy, request, principal);
        let policy_key = policy.policy_key();
        let now = self.clock.now_millis();

        let verdict = self
            .algorithm
            .check_and_record(&policy_key, &identity, &policy.windows, now);

        let Some(window) = verdict.most_restrictive() else {
            return Decision::Unlimited;
        };

        rate_limit_event!(
            policy_key.as_str(),
            identity.as_str(),
            verdict.allowed,
            window.limit,
            window.window_seconds
        );

        let headers = RateLimitHeaders::from(window);
        if verdict.allowed {
            Decision::Allowed(headers)
        } else {
            Decision::Rejected(Rejection::new(headers, now))
        }
    }

    /// Live entries for one window of a policy and identity
    pub fn recorded(&self, policy: &RateLimitPolicy, identity: &str, window_index: usize) -> usize {
        match policy.windows.get(window_index) {
            Some(window) => self.algorithm.recorded(
                &policy.policy_key(),
                identity,
                window_index,
                window,
                self.clock.now_millis(),
            ),
            None => 0,
        }
    }

    /// Clears every counter. Safe to call while requests are in flight.
    pub fn reset_all(&self) {
        self.algorithm.reset_all();
        info!("Rate limit counters reset");
    }
}
