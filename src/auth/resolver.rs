//! # Authorization Resolver
//!
//! Matches an inbound call against the routing table and enforces the
//! matched rule's access policy. The resolution is a pure function of the
//! routing table, the presented token, and the group membership query; the
//! only output is the resolved target URL plus the caller's identity and
//! group, which the forwarder injects into the outbound request.
//!
//! Order of decisions, first hit wins:
//! 1. unknown (service, version) or no matching pattern -> 404
//! 2. matched pattern without a policy for the method -> 405
//! 3. `DenyAll` -> 403 regardless of token presence or validity
//! 4. explicit groups -> valid token required, then at least one membership
//! 5. `Authenticated` -> valid token required
//! 6. `Anonymous` -> no token required

use std::sync::Arc;

use tracing::info;

use crate::auth::token::TokenService;
use crate::core::context::RequestContext;
use crate::core::error::{GatewayError, GatewayResult};
use crate::data::directory::UserDirectory;
use crate::onboarding::descriptor::{
    AccessPolicy, AUTHENTICATE_FLAG, DENY_ALL_ACCESS_FLAG, NO_AUTHENTICATION_FLAG,
};
use crate::onboarding::registry::RoutingTable;

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Backend base URL with the original path appended
    pub target_url: String,
    /// Token subject, when the policy required authentication
    pub identity: Option<String>,
    /// Matched group name, or the matched policy flag
    pub group: String,
}

pub struct AuthorizationResolver {
    routing: Arc<RoutingTable>,
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
}

impl AuthorizationResolver {
    pub fn new(
        routing: Arc<RoutingTable>,
        tokens: Arc<TokenService>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            routing,
            tokens,
            directory,
        }
    }

    pub async fn resolve(
        &self,
        service: &str,
        version: &str,
        path: &str,
        method: &str,
        bearer: Option<&str>,
        ctx: &RequestContext,
    ) -> GatewayResult<Resolution> {
        let routes = self
            .routing
            .routes(service, version)
            .ok_or(GatewayError::NotFound)?;

        let rule = routes.matching_rule(path).ok_or(GatewayError::NotFound)?;

        let policy = rule
            .policy(&method.to_uppercase())
            .ok_or(GatewayError::MethodNotAllowed)?;

        let target_url = format!("{}{}", routes.base_url, path);

        match policy {
            AccessPolicy::DenyAll => {
                info!(
                    request_id = %ctx.id,
                    rule = %rule.source,
                    "{DENY_ALL_ACCESS_FLAG} flag matched"
                );
                Err(GatewayError::Forbidden)
            }

            AccessPolicy::Groups(names) => {
                let subject = self.verify_bearer(bearer, ctx)?;
                let matched = self
                    .directory
                    .matching_groups(&subject, names, ctx)
                    .await?;

                match matched.into_iter().next() {
                    Some(group) => {
                        info!(request_id = %ctx.id, group = %group, "Group matched");
                        Ok(Resolution {
                            target_url,
                            identity: Some(subject),
                            group,
                        })
                    }
                    None => {
                        info!(request_id = %ctx.id, user = %subject, "No groups matched");
                        Err(GatewayError::unauthorized("Unauthorized"))
                    }
                }
            }

            AccessPolicy::Authenticated => {
                let subject = self.verify_bearer(bearer, ctx)?;
                info!(request_id = %ctx.id, "{AUTHENTICATE_FLAG} flag matched");
                Ok(Resolution {
                    target_url,
                    identity: Some(subject),
                    group: AUTHENTICATE_FLAG.to_string(),
                })
            }

            AccessPolicy::Anonymous => {
                info!(request_id = %ctx.id, "{NO_AUTHENTICATION_FLAG} flag matched");
                Ok(Resolution {
                    target_url,
                    identity: None,
                    group: NO_AUTHENTICATION_FLAG.to_string(),
                })
            }
        }
    }

    fn verify_bearer(&self, bearer: Option<&str>, ctx: &RequestContext) -> GatewayResult<String> {
        let token = bearer.ok_or_else(|| GatewayError::unauthorized("Not authenticated"))?;
        self.tokens.verify(token, ctx)
    }
}
