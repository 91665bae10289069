//! HTTP surface and startup wiring.

pub mod server;

pub use server::{build_router, AppState};
