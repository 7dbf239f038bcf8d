//! Deduplication fingerprints for dataset requests.
//!
//! A [`Fingerprint`] is the SHA-256 hex digest of a request's normalized
//! identifying fields. It is the sole key under which jobs are stored and
//! deduplicated.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::DatasetRequest;

/// Stable identity of a dataset request.
///
/// Two requests with the same (region, year, population) — after trimming
/// whitespace and upper-casing the region — always produce the same
/// fingerprint; the contact address never participates. Fields are joined
/// with a newline before hashing so that no pair of distinct field values
/// can collide by concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a request.
    ///
    /// Pure and side-effect-free; does not require the request to have been
    /// validated.
    pub fn of(request: &DatasetRequest) -> Self {
        let normalized = format!(
            "{}\n{}\n{}",
            request.region.trim().to_uppercase(),
            request.year.trim(),
            request.population.trim(),
        );
        let hash = Sha256::digest(normalized.as_bytes());
        Self(format!("{hash:x}"))
    }

    /// Wrap an already-computed digest, e.g. one received in a URL path.
    ///
    /// No validation is performed; a malformed digest simply never matches
    /// a stored job.
    pub fn from_hex(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
