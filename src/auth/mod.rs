//! Authentication and authorization: bearer token issuance/verification,
//! the per-endpoint policy resolver, and the password verification seam.

pub mod credentials;
pub mod resolver;
pub mod token;

pub use credentials::{PasswordVerifier, Sha256Verifier};
pub use resolver::{AuthorizationResolver, Resolution};
pub use token::TokenService;
