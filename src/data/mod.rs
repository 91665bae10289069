//! Resilient data access: retrying pooled queries for the user directory.

pub mod directory;
pub mod retry;

pub use directory::{PgUserDirectory, UserDirectory};
