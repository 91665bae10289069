//! Per-request context, created at request entry and threaded as an explicit
//! argument through resolution, forwarding, and data access. Nothing here is
//! looked up ambiently and nothing outlives the request.

use std::time::Instant;

use axum::http::HeaderMap;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ephemeral per-call state
///
/// Identity and group are filled in by the authorization resolver once the
/// call has been matched against the routing table; the access log reads
/// them at response time.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request id: inbound `X-Request-ID` honored, otherwise a fresh UUIDv4
    pub id: String,

    /// Timing marker set at request entry
    pub started: Instant,

    /// Resolved caller identity (token subject), when authenticated
    pub identity: Option<String>,

    /// Matched group name, or the matched policy flag for flag policies
    pub group: Option<String>,
}

impl RequestContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started: Instant::now(),
            identity: None,
            group: None,
        }
    }

    /// Build a context from inbound headers, minting an id when absent
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self::new(id)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}
