//! # User Directory
//!
//! Read-only lookups against the user store: a stored password hash for
//! login, and the intersection of a user's group memberships with a
//! declared group list for authorization. The trait is the seam: the
//! resolver and the login handler depend on `dyn UserDirectory`, and tests
//! inject an in-memory stub. The production implementation runs
//! parameterized queries against a bounded `sqlx` Postgres pool, each
//! attempt wrapped by [`with_retries`](crate::data::retry::with_retries).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::core::config::DatabaseSettings;
use crate::core::context::RequestContext;
use crate::core::error::GatewayResult;
use crate::data::retry::with_retries;

/// Read-only view of users, credentials, and group memberships
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The stored password hash of `username`, if the user exists
    async fn password_hash(
        &self,
        username: &str,
        ctx: &RequestContext,
    ) -> GatewayResult<Option<String>>;

    /// The subset of `groups` the user belongs to, ordered by the declared
    /// group list so the first element is a deterministic tie-break
    async fn matching_groups(
        &self,
        username: &str,
        groups: &[String],
        ctx: &RequestContext,
    ) -> GatewayResult<Vec<String>>;
}

/// Postgres-backed directory over a shared connection pool
pub struct PgUserDirectory {
    pool: PgPool,
    query_retries: u32,
}

impl PgUserDirectory {
    /// Connect a bounded pool per the database settings
    pub async fn connect(settings: &DatabaseSettings) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .connect(&settings.url())
            .await?;

        Ok(Self {
            pool,
            query_retries: settings.query_retries,
        })
    }

    /// Wrap an existing pool (used by tests running against a scratch db)
    pub fn from_pool(pool: PgPool, query_retries: u32) -> Self {
        Self {
            pool,
            query_retries,
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn password_hash(
        &self,
        username: &str,
        ctx: &RequestContext,
    ) -> GatewayResult<Option<String>> {
        debug!(request_id = %ctx.id, "Retrieving password hash from database");

        with_retries(
            "Failed to retrieve password hash from database",
            self.query_retries,
            ctx,
            || {
                sqlx::query_scalar::<_, String>(
                    "SELECT password FROM users WHERE username = $1",
                )
                .bind(username)
                .fetch_optional(&self.pool)
            },
        )
        .await
    }

    async fn matching_groups(
        &self,
        username: &str,
        groups: &[String],
        ctx: &RequestContext,
    ) -> GatewayResult<Vec<String>> {
        debug!(
            request_id = %ctx.id,
            groups = ?groups,
            "Retrieving matching user groups from database"
        );

        with_retries(
            "Failed to retrieve user groups from database",
            self.query_retries,
            ctx,
            || {
                sqlx::query_scalar::<_, String>(
                    r#"
                    SELECT g.group_name
                    FROM groups g
                    JOIN user_groups ug ON g.group_id = ug.group_id
                    JOIN users u ON u.user_id = ug.user_id
                    WHERE u.username = $1
                      AND g.group_name = ANY($2)
                    ORDER BY array_position($2, g.group_name)
                    "#,
                )
                .bind(username)
                .bind(groups)
                .fetch_all(&self.pool)
            },
        )
        .await
    }
}
