//! Retry wrapper for pooled queries: exponential backoff, bounded attempts,
//! and a service-unavailable-class error on exhaustion. The wrapped
//! operation checks its connection out of the pool per attempt, so no
//! connection is held across a backoff sleep.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error};

use crate::core::context::RequestContext;
use crate::core::error::{GatewayError, GatewayResult};

/// Run `operation` up to `limit` times, sleeping `2^attempt` seconds after
/// each failure
///
/// `description` names the caller's intent; it ends up in the exhaustion
/// error together with the request id, and the caller surfaces that as a
/// generic 500.
pub async fn with_retries<T, E, F, Fut>(
    description: &str,
    limit: u32,
    ctx: &RequestContext,
    operation: F,
) -> GatewayResult<T>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for attempt in 0..limit {
        match operation().await {
            Ok(value) => {
                debug!(request_id = %ctx.id, "Successfully queried database");
                return Ok(value);
            }
            Err(e) => {
                error!(
                    request_id = %ctx.id,
                    attempt,
                    error = %e,
                    "Error when trying to query database"
                );
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }
    }

    error!(request_id = %ctx.id, "{description} after {limit} retries");
    Err(GatewayError::DataAccess {
        detail: description.to_string(),
        request_id: ctx.id.clone(),
    })
}
