//! Deterministic snapshot naming.

use sha2::{Digest, Sha256};

/// Longest name accepted by downstream stores (DNS label rules).
const MAX_NAME_LEN: usize = 63;

/// Hex characters of the namespace/name digest kept in the suffix.
const SUFFIX_LEN: usize = 10;

/// Derive the snapshot name for an object. The same namespace and
/// name always map to the same snapshot name, so repeated attempts
/// converge on one artifact instead of leaking a new one per run.
pub fn generate_snapshot_name(name: &str, namespace: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let suffix = &digest[..SUFFIX_LEN];

    let budget = MAX_NAME_LEN - SUFFIX_LEN - 1;
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .take(budget)
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        format!("snapshot-{suffix}")
    } else {
        format!("{stem}-{suffix}")
    }
}
