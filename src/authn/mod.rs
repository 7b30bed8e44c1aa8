pub mod config;
pub mod jwt;

use anyhow::Result;

/// Trait for bearer credential verifiers.
///
/// Implementors validate an end-user credential and yield a stable subject
/// identity. Verification failure is reported as an error; the caller decides
/// what to do with it (the enforcement pipeline skips the check entirely,
/// it never rejects on identity grounds).
pub trait TokenVerifier: Send + Sync {
    /// Validates a bearer token and returns the verified subject.
    ///
    /// # Arguments
    /// * `token` - The raw token, without the "Bearer " prefix
    ///
    /// # Returns
    /// * `Ok(subject)` - Token is valid
    /// * `Err(_)` - Token is missing claims, expired, or has a bad signature
    fn verify(&self, token: &str) -> Result<VerifiedSubject>;
}

/// Identity of a verified end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject {
    /// Stable subject key sent to the decision service, e.g. "user-42".
    pub key: String,

    /// Raw identifier in the system of record, used to fetch the full
    /// subject record for attribute enrichment.
    pub record_id: String,
}
