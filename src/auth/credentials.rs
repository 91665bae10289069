//! Password verification seam. Hashing itself is an external concern;
//! deployments inject whatever scheme their user store uses. The default
//! implementation compares a SHA-256 hex digest.

use sha2::{Digest, Sha256};

/// Compares a presented password against a stored hash
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool;
}

/// SHA-256 hex-digest verifier
#[derive(Debug, Default)]
pub struct Sha256Verifier;

impl PasswordVerifier for Sha256Verifier {
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        let digest = hex::encode(Sha256::digest(candidate.as_bytes()));
        // Hashes come from the directory, not the caller, so a plain
        // comparison is sufficient here.
        digest == stored_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_password() {
        let stored = hex::encode(Sha256::digest(b"hunter2"));
        assert!(Sha256Verifier.verify("hunter2", &stored));
    }

    #[test]
    fn test_wrong_password() {
        let stored = hex::encode(Sha256::digest(b"hunter2"));
        assert!(!Sha256Verifier.verify("hunter3", &stored));
    }
}
