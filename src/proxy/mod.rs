//! Reverse-proxy forwarding path: outbound header construction and the
//! forwarder that issues the upstream call and maps its failures.

pub mod forwarder;
pub mod headers;

pub use forwarder::Forwarder;
pub use headers::forward_headers;
