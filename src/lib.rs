//! # Edge Gateway Library
//!
//! A descriptor-driven API gateway: a single ingress that authenticates
//! callers, authorizes each call against a declarative per-endpoint policy,
//! forwards it to the right backend, and aggregates the backends' OpenAPI
//! documents into one consolidated view.
//!
//! Module map:
//! - `core`: error taxonomy, configuration, per-request context
//! - `onboarding`: descriptor parsing, routing table, documentation registry
//! - `auth`: bearer tokens, the authorization resolver, credential seam
//! - `proxy`: outbound header construction and the request forwarder
//! - `docs`: multi-backend OpenAPI aggregation
//! - `data`: retrying pooled access to the user directory
//! - `observability`: logging setup and the access-log middleware
//! - `gateway`: the axum surface and state wiring

pub mod auth;
pub mod core;
pub mod data;
pub mod docs;
pub mod gateway;
pub mod observability;
pub mod onboarding;
pub mod proxy;

pub use core::config::GatewayConfig;
pub use core::context::RequestContext;
pub use core::error::{GatewayError, GatewayResult};
pub use gateway::server::{build_router, AppState};
