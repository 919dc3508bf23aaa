//! Incremental re-run support (SPEC_FULL.md §4 "Incremental re-run /
//! fingerprinting"). A run fingerprint is distinct from
//! [`crate::cache::key::cache_key`]: the cache key addresses one model
//! response, while a fingerprint addresses the combination a whole test was
//! run under, so a previous run's results can be skipped wholesale when
//! nothing relevant changed.

use serde::Serialize;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct FingerprintInput<'a> {
    suite_name: &'a str,
    suite_version: &'a str,
    test_id: &'a str,
    prompt: &'a str,
    model_id: &'a str,
    policy_hash: &'a str,
    engine_version: &'a str,
}

/// Stable canonical-JSON hash of everything that determines whether a test's
/// prior result is still valid: the suite/test identity, the prompt text,
/// the model under test, the policy that graded it, and the engine version.
/// A change in any of these invalidates the fingerprint and forces a re-run.
pub fn test_fingerprint(
    suite_name: &str,
    suite_version: &str,
    test_id: &str,
    prompt: &str,
    model_id: &str,
    policy_hash: &str,
) -> String {
    let input = FingerprintInput {
        suite_name,
        suite_version,
        test_id,
        prompt,
        model_id,
        policy_hash,
        engine_version: ENGINE_VERSION,
    };
    let canonical = serde_jcs::to_string(&input).expect("FingerprintInput always serializes");
    aipo_common::sha256_hex(canonical.as_bytes())
}

/// Canonical hash of a [`crate::model::Policy`], used as the `policy_hash`
/// input to [`test_fingerprint`]. Any threshold, content rule, or allowlist
/// change invalidates every fingerprint computed against the old policy.
pub fn policy_hash(policy: &crate::model::Policy) -> String {
    let canonical = serde_jcs::to_string(policy).expect("Policy always serializes");
    aipo_common::sha256_hex(canonical.as_bytes())
}

/// A prior run's fingerprints, keyed by test id, used to decide which tests
/// an incremental re-run can skip.
#[derive(Debug, Default, Clone, Serialize, serde::Deserialize)]
pub struct FingerprintIndex {
    entries: std::collections::HashMap<String, String>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, test_id: impl Into<String>, fingerprint: String) {
        self.entries.insert(test_id.into(), fingerprint);
    }

    /// True when `test_id` was previously run with exactly this fingerprint,
    /// meaning the engine can reuse the stored result instead of invoking
    /// the adapter again.
    pub fn is_unchanged(&self, test_id: &str, fingerprint: &str) -> bool {
        self.entries.get(test_id).map(|f| f == fingerprint).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Policy;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = test_fingerprint("s", "1", "t1", "hello", "gpt-x", "ph");
        let b = test_fingerprint("s", "1", "t1", "hello", "gpt-x", "ph");
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_change_invalidates_fingerprint() {
        let a = test_fingerprint("s", "1", "t1", "hello", "gpt-x", "ph");
        let b = test_fingerprint("s", "1", "t1", "goodbye", "gpt-x", "ph");
        assert_ne!(a, b);
    }

    #[test]
    fn policy_change_changes_hash() {
        let p1 = Policy { name: "p".into(), ..Default::default() };
        let mut p2 = p1.clone();
        p2.tool_allowlist.push("search".into());
        assert_ne!(policy_hash(&p1), policy_hash(&p2));
    }

    #[test]
    fn index_detects_unchanged_and_changed_tests() {
        let mut index = FingerprintIndex::new();
        index.record("t1", "fp-a".to_string());
        assert!(index.is_unchanged("t1", "fp-a"));
        assert!(!index.is_unchanged("t1", "fp-b"));
        assert!(!index.is_unchanged("t2", "fp-a"));
    }
}
