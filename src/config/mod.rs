// src/config/mod.rs

pub mod policies;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{CoreError, Result};

pub use policies::default_policies;

/// Which identity dimension a policy buckets requests by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyingBasis {
    /// Authenticated user id, falling back to the client IP
    User,
    /// Client IP only
    Ip,
}

/// One trailing window of a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    /// Maximum number of requests accepted inside the window
    pub limit: u64,

    /// Window length in seconds
    pub window_seconds: u64,
}

impl RateLimitWindow {
    pub const fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
        }
    }

    pub fn window_millis(&self) -> u64 {
        self.window_seconds.saturating_mul(1_000)
    }
}

/// Binds a method and route template to one or more windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// HTTP verb, matched exactly
    pub method: String,

    /// Canonical route template, e.g. `/api/v1/todo/{key}`
    pub path: String,

    pub keying_basis: KeyingBasis,

    /// All windows must have capacity for a request to pass
    pub windows: Vec<RateLimitWindow>,
}

impl RateLimitPolicy {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        keying_basis: KeyingBasis,
        windows: Vec<RateLimitWindow>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            keying_basis,
            windows,
        }
    }

    /// `METHOD:path`, the prefix of every counter key of this policy
    pub fn policy_key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

/// Immutable lookup table from `(method, route template)` to policy
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<(String, String), RateLimitPolicy>,
}

impl PolicyTable {
    /// Builds the table, rejecting invalid or duplicated policies
    pub fn new(policies: Vec<RateLimitPolicy>) -> Result<Self> {
        validate_policies(&policies)?;

        let policies = policies
            .into_iter()
            .map(|p| ((p.method.clone(), p.path.clone()), p))
            .collect();

        Ok(Self { policies })
    }

    /// Exact match on method and route template
    pub fn find(&self, method: &str, route: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(&(method.to_string(), route.to_string()))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies sorted by path then method, for display
    pub fn sorted(&self) -> Vec<&RateLimitPolicy> {
        let mut all: Vec<_> = self.policies.values().collect();
        all.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
        all
    }
}

fn validate_policies(policies: &[RateLimitPolicy]) -> Result<()> {
    let mut seen = HashSet::new();

    for policy in policies {
        if policy.method.trim().is_empty() || policy.path.trim().is_empty() {
            return Err(CoreError::Config(
                "policy method and path must not be empty".to_string(),
            ));
        }

        for window in &policy.windows {
            if window.limit == 0 || window.window_seconds == 0 {
                return Err(CoreError::Config(format!(
                    "policy {} has a window with zero limit or length",
                    policy.policy_key()
                )));
            }
        }

        if !seen.insert((policy.method.as_str(), policy.path.as_str())) {
            return Err(CoreError::Config(format!(
                "duplicate policy for {}",
                policy.policy_key()
            )));
        }
    }

    Ok(())
}

/// Configuration for the rate limiter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterConfig {
    /// Trust `X-Forwarded-For` / `Forwarded` when resolving the client IP
    #[serde(default)]
    pub trust_proxy_ip_headers: bool,

    #[serde(default = "default_policies")]
    pub policies: Vec<RateLimitPolicy>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            trust_proxy_ip_headers: false,
            policies: default_policies(),
        }
    }
}

impl LimiterConfig {
    /// Reads `TRUST_PROXY_IP_HEADERS` and, if set, replaces the policy table
    /// with the JSON array found at `RATE_LIMIT_POLICIES_FILE`.
    pub fn from_env() -> Result<Self> {
        let trust_proxy_ip_headers = std::env::var("TRUST_PROXY_IP_HEADERS")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let policies = match std::env::var("RATE_LIMIT_POLICIES_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    CoreError::Config(format!("cannot read policy file {}: {}", path, e))
                })?;
                Self::policies_from_json(&raw)?
            }
            _ => default_policies(),
        };

        let config = Self {
            trust_proxy_ip_headers,
            policies,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn policies_from_json(raw: &str) -> Result<Vec<RateLimitPolicy>> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_policies(&self.policies)
    }
}

/// Configuration for the in-memory ordered-list store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// How long `begin` waits for another transaction on the same owner
    #[serde(default = "default_lock_timeout", with = "duration_serde")]
    pub lock_timeout: Duration,

    /// Maximum number of rows per owner
    #[serde(default = "default_max_items_per_owner")]
    pub max_items_per_owner: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: default_lock_timeout(),
            max_items_per_owner: default_max_items_per_owner(),
        }
    }
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_items_per_owner() -> usize {
    1_000
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
