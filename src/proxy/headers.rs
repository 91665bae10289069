//! Header transformation for forwarded requests, kept as a pure function
//! over header maps so the rules are unit-testable without a network.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, HOST};

use crate::core::context::RequestContext;

/// Hop-by-hop and framing headers never forwarded upstream: the client
/// negotiates these with the gateway, and reqwest reframes the outbound
/// request itself.
const STRIPPED_HEADERS: [&str; 4] = ["accept-encoding", "connection", "content-length", "host"];

pub const API_USER_HEADER: &str = "api-user";
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Build the outbound header set from the inbound one
///
/// - strips hop-by-hop and framing headers;
/// - injects `X-Forwarded-Proto` / `X-Forwarded-Host` only when absent;
/// - appends the caller's address to `X-Forwarded-For`;
/// - injects `X-Request-ID` from the request context;
/// - injects `API-User` when an identity was resolved.
pub fn forward_headers(
    original: &HeaderMap,
    ctx: &RequestContext,
    identity: Option<&str>,
    client_addr: Option<&str>,
) -> HeaderMap {
    let mut headers = original.clone();

    if let Some(user) = identity {
        if let Ok(value) = HeaderValue::from_str(user) {
            headers.insert(HeaderName::from_static(API_USER_HEADER), value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&ctx.id) {
        headers.insert(HeaderName::from_static(crate::core::context::REQUEST_ID_HEADER), value);
    }

    if !headers.contains_key(FORWARDED_PROTO_HEADER) {
        headers.insert(
            HeaderName::from_static(FORWARDED_PROTO_HEADER),
            HeaderValue::from_static("http"),
        );
    }

    if !headers.contains_key(FORWARDED_HOST_HEADER) {
        if let Some(host) = original.get(HOST) {
            headers.insert(HeaderName::from_static(FORWARDED_HOST_HEADER), host.clone());
        }
    }

    let mut forwarded_for: Vec<String> = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();
    if let Some(addr) = client_addr {
        forwarded_for.push(addr.to_string());
    }
    if !forwarded_for.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&forwarded_for.join(", ")) {
            headers.insert(HeaderName::from_static(FORWARDED_FOR_HEADER), value);
        }
    }

    for name in STRIPPED_HEADERS {
        headers.remove(name);
    }

    headers
}
