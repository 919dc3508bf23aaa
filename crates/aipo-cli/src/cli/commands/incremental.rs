//! `aipo run --incremental`: skip tests whose fingerprint hasn't changed
//! since a prior passing run (SPEC_FULL.md §4 "Incremental re-run /
//! fingerprinting"). The fingerprint math itself lives in
//! `aipo_core::fingerprint`; this module is the CLI-side persistence layer
//! that remembers, per suite/state-dir, which test last passed under which
//! fingerprint and what its `TestResult` was.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aipo_core::fingerprint::{policy_hash, test_fingerprint, FingerprintIndex};
use aipo_core::{Policy, Suite, TestCase, TestResult, TestStatus};
use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IncrementalStore {
    index: FingerprintIndex,
    results: HashMap<String, TestResult>,
}

impl IncrementalStore {
    fn path(state_dir: &Path) -> PathBuf {
        state_dir.join("incremental.json")
    }

    pub fn load(state_dir: &Path) -> anyhow::Result<Self> {
        let path = Self::path(state_dir);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, state_dir: &Path) -> anyhow::Result<()> {
        let path = Self::path(state_dir);
        let bytes = serde_json::to_vec_pretty(self)?;
        aipo_core::atomic_write(&path, &bytes).with_context(|| format!("writing {}", path.display()))
    }

    fn record(&mut self, test_id: &str, fingerprint: String, result: TestResult) {
        self.index.record(test_id, fingerprint);
        self.results.insert(test_id.to_string(), result);
    }
}

/// Splits `suite` into tests that must still be run and results that can be
/// reused verbatim from a prior store. A test is reusable only when its
/// fingerprint is unchanged *and* its stored result was `Passed` — a
/// previously failing test always gets a fresh attempt.
pub fn partition(
    suite: &Suite,
    model_id: &str,
    policy: &Policy,
    store: &IncrementalStore,
) -> (Vec<TestCase>, Vec<(usize, TestResult)>) {
    let policy_hash = policy_hash(policy);
    let mut to_run = Vec::new();
    let mut reused = Vec::new();

    for (index, test) in suite.tests.iter().enumerate() {
        let fingerprint = test_fingerprint(&suite.name, &suite.version, &test.id, &test.prompt, model_id, &policy_hash);
        match store.results.get(&test.id) {
            Some(prior) if prior.status == TestStatus::Passed && store.index.is_unchanged(&test.id, &fingerprint) => {
                reused.push((index, prior.clone()));
            }
            _ => to_run.push(test.clone()),
        }
    }
    (to_run, reused)
}

/// Records every test's current fingerprint and result for the next
/// incremental run, overwriting stale entries wholesale — a reused result
/// carries its existing fingerprint forward unchanged, a freshly run one
/// gets today's.
pub fn update(
    store: &mut IncrementalStore,
    suite: &Suite,
    model_id: &str,
    policy: &Policy,
    results: &[TestResult],
) {
    let policy_hash = policy_hash(policy);
    for (test, result) in suite.tests.iter().zip(results.iter()) {
        let fingerprint = test_fingerprint(&suite.name, &suite.version, &test.id, &test.prompt, model_id, &policy_hash);
        store.record(&test.id, fingerprint, result.clone());
    }
}
