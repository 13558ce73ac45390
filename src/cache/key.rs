//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deterministic identity of a request's cacheable fields.
///
/// Two requests that would send the same prompt, role instruction, model tag
/// and temperature over the wire hash to the same fingerprint. Inputs are
/// canonicalized through a sorted key map before hashing, so field order can
/// never perturb the digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the cacheable fields of a resolved request. `temperature` and
    /// `model` arrive with defaults already substituted; only the role
    /// instruction stays optional, and an absent one is distinct from an
    /// empty one.
    pub fn of(prompt: &str, system_prompt: Option<&str>, temperature: f32, model: &str) -> Self {
        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("model", model.to_string());
        parts.insert("prompt", prompt.to_string());
        if let Some(system) = system_prompt {
            parts.insert("system", system.to_string());
        }
        parts.insert("temperature", format!("{:.2}", temperature));
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        Fingerprint(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
