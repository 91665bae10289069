//! # Request Forwarder
//!
//! Issues the outbound call for a resolved request and relays the backend's
//! response to the caller unmodified in status and payload. The underlying
//! `reqwest::Client` is constructed once at startup and injected; cloning
//! it is cheap (it is internally reference-counted), and there is no lazy
//! first-use initialization to race on.
//!
//! Network-layer failures are translated at this boundary per a fixed
//! table; the originating error is logged with the request id before the
//! generic status is returned:
//!
//! | condition                               | status |
//! |-----------------------------------------|--------|
//! | connection failure, payload transport   | 502    |
//! | upstream signalled overload (503)       | 503    |
//! | other backend-side response error       | 502    |
//! | timeout waiting on the backend          | 504    |
//! | anything unclassified                   | 500    |
//!
//! The proxied call is never retried: replaying a non-idempotent forwarded
//! request is unsafe without method-aware opt-in.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::core::context::RequestContext;
use crate::core::error::{GatewayError, GatewayResult};

/// Response headers not relayed back: the gateway reframes the body itself.
const UNRELAYED_RESPONSE_HEADERS: [&str; 3] = ["connection", "transfer-encoding", "content-length"];

pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Forward one request to `target_url` and relay the backend response
    ///
    /// `headers` must already be the transformed outbound set from
    /// [`forward_headers`](crate::proxy::headers::forward_headers). Query
    /// parameters are appended verbatim.
    pub async fn forward(
        &self,
        method: &Method,
        target_url: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
        ctx: &RequestContext,
    ) -> GatewayResult<Response> {
        let url = match query {
            Some(q) if !q.is_empty() => format!("{target_url}?{q}"),
            _ => target_url.to_string(),
        };

        debug!(request_id = %ctx.id, method = %method, url = %url, "Forwarding request");

        let outbound_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| GatewayError::internal(format!("Unsupported method: {e}")))?;

        let mut outbound_headers = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            // reqwest 0.11 carries its own http types, so names and values
            // cross the boundary as bytes.
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                outbound_headers.append(name, value);
            }
        }

        let upstream = self
            .client
            .request(outbound_method, &url)
            .headers(outbound_headers)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_failure(e, ctx))?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(|e| GatewayError::internal(format!("Invalid upstream status: {e}")))?;

        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(request_id = %ctx.id, url = %url, "Upstream signalled overload");
        }

        let mut response = Response::builder().status(status);
        if let Some(out_headers) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if UNRELAYED_RESPONSE_HEADERS.contains(&name.as_str()) {
                    continue;
                }
                if let (Ok(name), Ok(value)) = (
                    axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
                    axum::http::HeaderValue::from_bytes(value.as_bytes()),
                ) {
                    out_headers.append(name, value);
                }
            }
        }

        let payload = upstream
            .bytes()
            .await
            .map_err(|e| self.map_failure(e, ctx))?;

        debug!(
            request_id = %ctx.id,
            status = status.as_u16(),
            backend_ms = ctx.elapsed_ms(),
            "Upstream responded"
        );

        response
            .body(Body::from(payload))
            .map_err(|e| GatewayError::internal(format!("Failed to build response: {e}")))
    }

    /// Translate a transport error into the caller-visible status
    fn map_failure(&self, e: reqwest::Error, ctx: &RequestContext) -> GatewayError {
        if e.is_timeout() {
            error!(request_id = %ctx.id, error = %e, "Gateway Timeout");
            GatewayError::GatewayTimeout
        } else if e.is_connect() || e.is_body() || e.is_decode() || e.is_request() {
            error!(request_id = %ctx.id, error = %e, "Bad Gateway");
            GatewayError::BadGateway
        } else if e.is_status() {
            if e.status().map(|s| s.as_u16()) == Some(503) {
                error!(request_id = %ctx.id, error = %e, "Service Unavailable");
                GatewayError::ServiceUnavailable
            } else {
                error!(request_id = %ctx.id, error = %e, "Bad Gateway");
                GatewayError::BadGateway
            }
        } else {
            error!(request_id = %ctx.id, error = %e, "Internal Server Error");
            GatewayError::internal(format!("Unclassified forwarding failure: {e}"))
        }
    }
}
