//! # Gateway Server
//!
//! Ties the components together behind one axum router:
//!
//! - `POST /login` exchanges form credentials for a bearer token;
//! - `GET /openapi.json?mode=internal|external` triggers aggregation and
//!   returns the merged document;
//! - `{METHOD} /{service}/api/{version}/{path...}` resolves the call
//!   against the routing table and proxies it to the backend.
//!
//! Shared state is constructed once at startup and injected: the routing
//! table and documentation registry are immutable snapshots, and the
//! outbound HTTP client is built during wiring rather than lazily on first
//! use, so there is no initialization race. Each inbound request is its own
//! tokio task; if the caller disconnects mid-forward the handler future is
//! dropped, which aborts the in-flight upstream call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Extension, Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::credentials::PasswordVerifier;
use crate::auth::resolver::AuthorizationResolver;
use crate::auth::token::TokenService;
use crate::core::config::GatewayConfig;
use crate::core::context::RequestContext;
use crate::core::error::{GatewayError, GatewayResult};
use crate::data::directory::UserDirectory;
use crate::docs::aggregator::{DocsMode, SchemaAggregator};
use crate::onboarding::registry::{DocumentationRegistry, RoutingTable};
use crate::observability::middleware::access_log;
use crate::proxy::forwarder::Forwarder;
use crate::proxy::headers::forward_headers;

/// Shared, read-only state injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<AuthorizationResolver>,
    pub forwarder: Arc<Forwarder>,
    pub aggregator: Arc<SchemaAggregator>,
    pub directory: Arc<dyn UserDirectory>,
    pub tokens: Arc<TokenService>,
    pub passwords: Arc<dyn PasswordVerifier>,
}

impl AppState {
    /// Wire the components from configuration and the built registries
    ///
    /// `client` is the single shared outbound HTTP client; both the
    /// forwarder and the aggregator clone it.
    pub fn new(
        config: &GatewayConfig,
        routing: RoutingTable,
        docs: DocumentationRegistry,
        client: reqwest::Client,
        directory: Arc<dyn UserDirectory>,
        passwords: Arc<dyn PasswordVerifier>,
    ) -> Self {
        let routing = Arc::new(routing);
        let docs = Arc::new(docs);
        let tokens = Arc::new(TokenService::new(
            &config.auth.token_secret,
            config.auth.token_ttl,
        ));

        let resolver = Arc::new(AuthorizationResolver::new(
            Arc::clone(&routing),
            Arc::clone(&tokens),
            Arc::clone(&directory),
        ));

        let forwarder = Arc::new(Forwarder::new(
            client.clone(),
            config.upstream.forward_timeout,
        ));

        let aggregator = Arc::new(SchemaAggregator::new(
            client,
            routing,
            docs,
            config.docs.fetch_timeout,
            config.server.public_url.clone(),
        ));

        Self {
            resolver,
            forwarder,
            aggregator,
            directory,
            tokens,
            passwords,
        }
    }
}

/// Build the gateway router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/openapi.json", get(merged_openapi))
        .route("/:service/api/:version/*path", any(proxy))
        .layer(axum::middleware::from_fn(access_log))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Last-resort boundary: a panic becomes a logged, generic 500
fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    error!(error = %detail, "Unhandled panic while serving request");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Form(form): Form<LoginForm>,
) -> GatewayResult<Json<Value>> {
    let stored = state.directory.password_hash(&form.username, &ctx).await?;

    let valid = stored
        .map(|hash| state.passwords.verify(&form.password, &hash))
        .unwrap_or(false);

    if !valid {
        return Err(GatewayError::unauthorized("Invalid credentials"));
    }

    let token = state.tokens.issue(&form.username, &ctx)?;
    Ok(Json(json!({ "token": token, "token_type": "bearer" })))
}

#[derive(Debug, Default, Deserialize)]
struct DocsQuery {
    #[serde(default)]
    mode: DocsMode,
}

async fn merged_openapi(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<DocsQuery>,
) -> Json<Value> {
    Json(state.aggregator.aggregate(query.mode, &ctx).await)
}

async fn proxy(
    State(state): State<AppState>,
    Extension(mut ctx): Extension<RequestContext>,
    Path((service, version, path)): Path<(String, String, String)>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> GatewayResult<Response> {
    let endpoint = format!("/{path}");
    let method = request.method().clone();
    let query = request.uri().query().map(str::to_string);
    let bearer = bearer_token(request.headers().get(AUTHORIZATION));

    let resolution = state
        .resolver
        .resolve(
            &service,
            &version,
            &endpoint,
            method.as_str(),
            bearer.as_deref(),
            &ctx,
        )
        .await?;

    ctx.identity = resolution.identity.clone();
    ctx.group = Some(resolution.group.clone());

    let client_addr = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    let headers = forward_headers(
        request.headers(),
        &ctx,
        resolution.identity.as_deref(),
        client_addr.as_deref(),
    );

    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to read request body: {e}")))?;

    let mut response = state
        .forwarder
        .forward(
            &method,
            &resolution.target_url,
            query.as_deref(),
            &headers,
            body,
            &ctx,
        )
        .await?;

    // The access log picks the resolved identity and group up from here.
    response.extensions_mut().insert(ctx);
    Ok(response)
}

/// Extract the credential from an `Authorization: Bearer <token>` header
fn bearer_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let value = header?.to_str().ok()?;
    let (scheme, credentials) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !credentials.is_empty() {
        Some(credentials.trim().to_string())
    } else {
        None
    }
}
