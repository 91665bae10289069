//! Core functionality shared by every component: the error taxonomy, the
//! configuration structures, and the per-request context.

pub mod config;
pub mod context;
pub mod error;
