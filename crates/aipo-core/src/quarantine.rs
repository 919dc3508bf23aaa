//! Quarantine of known-flaky tests (SPEC_FULL.md §4 "Quarantine of
//! known-flaky tests"), grounded in the teacher's `QuarantineService`/
//! `QuarantineMode`. Applied as an overlay on `TestResult.status` right
//! before aggregation — it never hides a genuine security finding, only
//! relabels infra-flaky `passed`/`failed` statuses an operator has
//! explicitly quarantined.

use crate::model::{TestResult, TestStatus};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuarantineMode {
    Off,
    #[default]
    Warn,
    Strict,
}

impl QuarantineMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "off" => Self::Off,
            "strict" => Self::Strict,
            _ => Self::Warn,
        }
    }
}

/// Records which (suite, test_id) pairs are quarantined and why.
pub struct QuarantineService {
    conn: Mutex<Connection>,
}

impl QuarantineService {
    pub fn open(path: &std::path::Path) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS quarantine (
                suite TEXT NOT NULL,
                test_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                PRIMARY KEY (suite, test_id)
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn add(&self, suite: &str, test_id: &str, reason: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("quarantine mutex poisoned");
        conn.execute(
            "INSERT INTO quarantine (suite, test_id, reason) VALUES (?1, ?2, ?3)
             ON CONFLICT(suite, test_id) DO UPDATE SET reason=excluded.reason",
            params![suite, test_id, reason],
        )?;
        Ok(())
    }

    pub fn remove(&self, suite: &str, test_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("quarantine mutex poisoned");
        conn.execute(
            "DELETE FROM quarantine WHERE suite = ?1 AND test_id = ?2",
            params![suite, test_id],
        )?;
        Ok(())
    }

    pub fn reason_for(&self, suite: &str, test_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().expect("quarantine mutex poisoned");
        let reason = conn
            .query_row(
                "SELECT reason FROM quarantine WHERE suite = ?1 AND test_id = ?2",
                params![suite, test_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(reason)
    }

    /// Overlays the quarantine decision onto an already-computed
    /// `TestResult`. `Off` leaves the result untouched; `Warn` demotes a
    /// `failed` result to `skipped` (still visible in counts, excluded from
    /// the ASR numerator); `Strict` leaves `failed` as-is so the gate still
    /// sees it. A `passed` result is never touched by any mode.
    pub fn apply_overlay(&self, mode: QuarantineMode, reason: Option<&str>, result: &mut TestResult) {
        let Some(reason) = reason else { return };
        if result.status != TestStatus::Failed {
            return;
        }
        match mode {
            QuarantineMode::Off => {}
            QuarantineMode::Warn => {
                result.status = TestStatus::Skipped;
                result.findings.push(crate::model::Finding {
                    id: uuid::Uuid::new_v4().to_string(),
                    test_id: result.test_id.clone(),
                    severity: crate::model::Severity::Low,
                    category: "quarantine".to_string(),
                    confidence: 1.0,
                    evidence_ref: vec![],
                    description: format!("quarantined: {reason}"),
                });
            }
            QuarantineMode::Strict => {
                // Strict mode still counts the failure toward the gate; only
                // annotate why it was known-flaky.
                result.findings.push(crate::model::Finding {
                    id: uuid::Uuid::new_v4().to_string(),
                    test_id: result.test_id.clone(),
                    severity: crate::model::Severity::Low,
                    category: "quarantine".to_string(),
                    confidence: 1.0,
                    evidence_ref: vec![],
                    description: format!("quarantined (strict): {reason}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_result() -> TestResult {
        TestResult {
            test_id: "t1".into(),
            status: TestStatus::Failed,
            response: None,
            judge_score: Some(9.0),
            findings: vec![],
            cost_estimate: 0.0,
            latency_ms: 1,
            cache_hit: false,
            conversation_id: None,
        }
    }

    #[test]
    fn warn_mode_demotes_failed_to_skipped() {
        let svc = QuarantineService::in_memory().unwrap();
        svc.add("suite", "t1", "known flaky").unwrap();
        let mut result = failed_result();
        let reason = svc.reason_for("suite", "t1").unwrap();
        svc.apply_overlay(QuarantineMode::Warn, reason.as_deref(), &mut result);
        assert_eq!(result.status, TestStatus::Skipped);
    }

    #[test]
    fn off_mode_leaves_result_untouched() {
        let svc = QuarantineService::in_memory().unwrap();
        svc.add("suite", "t1", "known flaky").unwrap();
        let mut result = failed_result();
        let reason = svc.reason_for("suite", "t1").unwrap();
        svc.apply_overlay(QuarantineMode::Off, reason.as_deref(), &mut result);
        assert_eq!(result.status, TestStatus::Failed);
    }

    #[test]
    fn unquarantined_test_is_never_touched() {
        let svc = QuarantineService::in_memory().unwrap();
        let mut result = failed_result();
        let reason = svc.reason_for("suite", "t1").unwrap();
        svc.apply_overlay(QuarantineMode::Warn, reason.as_deref(), &mut result);
        assert_eq!(result.status, TestStatus::Failed);
    }

    #[test]
    fn remove_clears_quarantine() {
        let svc = QuarantineService::in_memory().unwrap();
        svc.add("suite", "t1", "flaky").unwrap();
        svc.remove("suite", "t1").unwrap();
        assert!(svc.reason_for("suite", "t1").unwrap().is_none());
    }
}
