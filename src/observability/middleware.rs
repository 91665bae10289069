//! Access-log middleware at the gateway boundary. Ensures every request
//! carries a request id (inbound `X-Request-ID` honored, minted otherwise),
//! echoes it on the response, and logs one line per completed request.
//! Handlers that resolve a caller hand the updated context back through the
//! response extensions, so the line carries the identity and group.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::core::context::{RequestContext, REQUEST_ID_HEADER};

pub async fn access_log(mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let ctx = RequestContext::from_headers(request.headers());
    let id = ctx.id.clone();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Handlers read the context from extensions and thread it onwards as
    // an explicit argument.
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let (identity, group) = response
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| (ctx.identity.clone(), ctx.group.clone()))
        .unwrap_or_default();

    info!(
        request_id = %id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        identity = identity.as_deref().unwrap_or("-"),
        group = group.as_deref().unwrap_or("-"),
        duration_ms = started.elapsed().as_millis() as u64,
        "Request processed"
    );

    response
}
