//! Identity anonymization
//!
//! Employee identifiers never leave the agent in the clear. They are replaced by
//! a truncated SHA-256 digest that is stable across runs, so analytics can
//! correlate records for the same person without storing who they are.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of an anonymized identifier, in hex characters
pub const ANONYMIZED_ID_LEN: usize = 16;

/// Pseudonymous identifier derived from a raw personal identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonymizedId(String);

impl AnonymizedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AnonymizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AnonymizedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash a raw identifier (e.g. an email address) into its pseudonymous form.
///
/// The input is hashed byte for byte: no trimming or case folding. Callers that
/// need `Alice@corp` and `alice@corp` to match must canonicalize first.
pub fn anonymize(raw_identifier: &str) -> AnonymizedId {
    let digest = Sha256::digest(raw_identifier.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(ANONYMIZED_ID_LEN);
    AnonymizedId(hex)
}
