//! # Bearer Tokens
//!
//! HS256 JWTs carrying a subject and an expiry instant. Tokens are issued
//! at login and verified on every protected call; they are never stored.
//! Expiry is boundary-exact: a token is live strictly before its `exp`
//! instant and rejected at or after it, so the library's default leeway is
//! disabled and the instant is checked explicitly.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::context::RequestContext;
use crate::core::error::{GatewayError, GatewayResult};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and verifies signed bearer tokens
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl: std::time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: ttl.as_secs() as i64,
        }
    }

    /// Issue a token for `username`, expiring after the configured lifetime
    pub fn issue(&self, username: &str, ctx: &RequestContext) -> GatewayResult<String> {
        let claims = Claims {
            sub: username.to_string(),
            exp: Utc::now().timestamp() + self.ttl_secs,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| GatewayError::internal(format!("Failed to sign token: {e}")))?;

        info!(request_id = %ctx.id, user = %username, "Created token");
        Ok(token)
    }

    /// Verify signature and expiry, returning the token's subject
    ///
    /// Any failure (malformed token, bad signature, expired) is
    /// Unauthorized, never a 5xx.
    pub fn verify(&self, token: &str, ctx: &RequestContext) -> GatewayResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below so that exp == now is already rejected.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            error!(request_id = %ctx.id, error = %e, "Error when decoding bearer token");
            GatewayError::unauthorized("Could not validate credentials")
        })?;

        if data.claims.exp <= Utc::now().timestamp() {
            error!(request_id = %ctx.id, "Rejected expired bearer token");
            return Err(GatewayError::unauthorized("Could not validate credentials"));
        }

        Ok(data.claims.sub)
    }
}
