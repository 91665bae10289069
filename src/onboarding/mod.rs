//! Service onboarding: descriptor parsing and the construction of the
//! routing table and documentation registry that every other component
//! reads.

pub mod descriptor;
pub mod registry;

pub use descriptor::{AccessPolicy, EndpointRule};
pub use registry::{build_registries, DocsEntry, DocumentationRegistry, RoutingTable, ServiceKey};
