// src/config/policies.rs

use super::{KeyingBasis, RateLimitPolicy, RateLimitWindow};

use super::KeyingBasis::{Ip, User};

const SECOND: u64 = 1;
const MINUTE: u64 = 60;
const HOUR: u64 = 3_600;

// Quota shapes shared by the resource routes
const LIST: &[(u64, u64)] = &[(10, SECOND), (200, MINUTE)];
const READ: &[(u64, u64)] = &[(20, SECOND), (400, MINUTE)];
const CREATE: &[(u64, u64)] = &[(10, MINUTE), (100, HOUR)];
const UPDATE: &[(u64, u64)] = &[(20, MINUTE), (200, HOUR)];
const DELETE: &[(u64, u64)] = &[(10, MINUTE), (50, HOUR)];
const ACCOUNT: &[(u64, u64)] = &[(10, MINUTE), (100, HOUR)];

type PolicyRow = (&'static str, &'static str, KeyingBasis, &'static [(u64, u64)]);

const DEFAULT_POLICIES: &[PolicyRow] = &[
    // Public endpoints
    ("GET", "/", Ip, &[(60, MINUTE)]),
    ("GET", "/health", Ip, &[(60, MINUTE)]),
    ("POST", "/api/v1/token", Ip, &[(5, MINUTE), (100, HOUR)]),
    // Users
    ("GET", "/api/v1/users", User, LIST),
    ("GET", "/api/v1/user/{key}", User, READ),
    ("POST", "/api/v1/users", Ip, &[(5, MINUTE), (50, HOUR)]),
    ("PUT", "/api/v1/user/{key}", User, ACCOUNT),
    ("PATCH", "/api/v1/user/{key}", User, ACCOUNT),
    ("PUT", "/api/v1/user/{key}/password", User, ACCOUNT),
    ("DELETE", "/api/v1/user/{key}", User, DELETE),
    // Todos
    ("GET", "/api/v1/todos", User, LIST),
    ("GET", "/api/v1/todo/{key}", User, READ),
    ("POST", "/api/v1/todos", User, CREATE),
    ("PUT", "/api/v1/todo/{key}", User, UPDATE),
    ("PATCH", "/api/v1/todo/{key}", User, UPDATE),
    ("DELETE", "/api/v1/todo/{key}", User, DELETE),
    // Priorities
    ("GET", "/api/v1/priorities", User, LIST),
    ("GET", "/api/v1/priority/{key}", User, READ),
    ("POST", "/api/v1/priorities", User, CREATE),
    ("PUT", "/api/v1/priority/{key}", User, UPDATE),
    ("PATCH", "/api/v1/priority/{key}", User, UPDATE),
    ("PATCH", "/api/v1/priority/{key}/reorder", User, UPDATE),
    ("DELETE", "/api/v1/priority/{key}", User, DELETE),
    // Statuses
    ("GET", "/api/v1/statuses", User, LIST),
    ("GET", "/api/v1/status/{key}", User, READ),
    ("POST", "/api/v1/statuses", User, CREATE),
    ("PUT", "/api/v1/status/{key}", User, UPDATE),
    ("PATCH", "/api/v1/status/{key}", User, UPDATE),
    ("PATCH", "/api/v1/status/{key}/reorder", User, UPDATE),
    ("DELETE", "/api/v1/status/{key}", User, DELETE),
];

/// The compiled-in policy table
pub fn default_policies() -> Vec<RateLimitPolicy> {
    DEFAULT_POLICIES
        .iter()
        .map(|&(method, path, basis, windows)| {
            RateLimitPolicy::new(
                method,
                path,
                basis,
                windows
                    .iter()
                    .map(|&(limit, secs)| RateLimitWindow::new(limit, secs))
                    .collect(),
            )
        })
        .collect()
}
