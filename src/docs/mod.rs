//! Multi-backend OpenAPI aggregation: fetching, path rewriting, collision
//! resolution, and merging into one consolidated document.

pub mod aggregator;
pub mod components;
pub mod schema;

pub use aggregator::{DocsMode, SchemaAggregator};
