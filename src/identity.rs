// src/identity.rs

use crate::config::KeyingBasis;

/// Outcome of the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Stable identifier of the authenticated caller
    Authenticated(String),
    Anonymous,
}

/// The authentication collaborator.
///
/// Token parsing lives behind this trait; the limiter only consumes the
/// resolved principal.
pub trait Authenticator: Send + Sync {
    fn resolve_identity(&self, request: &RequestMeta) -> Principal;
}

impl<F> Authenticator for F
where
    F: Fn(&RequestMeta) -> Principal + Send + Sync,
{
    fn resolve_identity(&self, request: &RequestMeta) -> Principal {
        self(request)
    }
}

/// What the rate limiter needs to know about an inbound request
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// HTTP verb
    pub method: String,

    /// Canonical route template the request resolved to
    pub route: String,

    /// Socket peer address, if known
    pub remote_addr: Option<String>,

    headers: Vec<(String, String)>,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Works out the client address of a request
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpResolver {
    trust_proxy_headers: bool,
}

impl ClientIpResolver {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }

    /// Proxy headers are only consulted when trusted. `X-Forwarded-For`
    /// wins over `Forwarded`; the socket address is the fallback.
    pub fn client_ip(&self, request: &RequestMeta) -> String {
        if self.trust_proxy_headers {
            if let Some(ip) = request
                .header("X-Forwarded-For")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
            {
                return ip.to_string();
            }

            if let Some(ip) = request.header("Forwarded").and_then(forwarded_for) {
                return ip;
            }
        }

        request
            .remote_addr
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Bucketing key for a request under a keying basis
    pub fn identity_key(
        &self,
        basis: KeyingBasis,
        principal: &Principal,
        request: &RequestMeta,
    ) -> String {
        match (basis, principal) {
            (KeyingBasis::User, Principal::Authenticated(id)) if !id.is_empty() => {
                format!("user:{}", id)
            }
            // Unauthenticated callers on user-keyed routes share their IP bucket
            _ => format!("ip:{}", self.client_ip(request)),
        }
    }
}

/// `for=` element of a `Forwarded` header
fn forwarded_for(value: &str) -> Option<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .find_map(|part| {
            let (name, ip) = part.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("for")
                .then(|| ip.trim().trim_matches('"').to_string())
        })
        .filter(|ip| !ip.is_empty())
}
