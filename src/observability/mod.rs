//! Logging setup and the boundary access-log middleware.

pub mod logging;
pub mod middleware;

pub use logging::init_logging;
