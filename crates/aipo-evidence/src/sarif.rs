//! SARIF 2.1.0 findings export (SPEC_FULL.md §4 "SARIF-shaped findings
//! export"), grounded on the teacher's `assay-core/src/report/sarif.rs`:
//! same schema URI/version, same deterministic truncation order, same
//! synthetic-location fallback for results without a file context. Reuses
//! the `Finding` records a [`crate::pack::EvidencePack`] already stages,
//! rather than introducing a parallel diagnostic type.

use std::path::Path;

use aipo_core::{Finding, Severity};
use serde::Serialize;

/// GitHub Code Scanning accepts up to 25_000 results per run; beyond that
/// uploads are rejected outright.
pub const DEFAULT_SARIF_MAX_RESULTS: usize = 25_000;

pub const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

const SYNTHETIC_LOCATION_URI: &str = ".aipo/suite.yaml";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SarifWriteOutcome {
    pub omitted_count: u64,
}

#[inline]
fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Critical | Severity::High => 0,
        Severity::Medium => 1,
        Severity::Low => 2,
    }
}

#[inline]
fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

fn sarif_sort_key(f: &Finding) -> (u8, &str) {
    (severity_rank(f.severity), f.id.as_str())
}

/// Writes `findings` as SARIF 2.1.0 with an explicit result limit. Use
/// [`write_sarif`] for the default limit.
///
/// Truncation is deterministic: sort by `(severity_rank, finding.id)`, take
/// the first `max_results`. `omitted_count` reflects exactly what was
/// dropped, never silently.
pub fn write_sarif_with_limit(
    tool_name: &str,
    findings: &[Finding],
    out: &Path,
    max_results: usize,
) -> anyhow::Result<SarifWriteOutcome> {
    let total = findings.len();
    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort_by_cached_key(|f| sarif_sort_key(f));
    let kept: Vec<&Finding> = sorted.into_iter().take(max_results).collect();
    let omitted_count = total.saturating_sub(kept.len()) as u64;

    let sarif_results: Vec<serde_json::Value> = kept
        .iter()
        .map(|f| {
            let file_uri = f.evidence_ref.first().map(String::as_str).unwrap_or(SYNTHETIC_LOCATION_URI);
            serde_json::json!({
                "ruleId": f.category,
                "level": sarif_level(f.severity),
                "message": { "text": format!("{}: {}", f.test_id, f.description) },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": file_uri },
                        "region": { "startLine": 1, "startColumn": 1 }
                    }
                }],
                "properties": { "confidence": f.confidence }
            })
        })
        .collect();

    let run_obj = if omitted_count > 0 {
        serde_json::json!({
            "tool": { "driver": { "name": tool_name, "version": env!("CARGO_PKG_VERSION") } },
            "results": sarif_results,
            "properties": { "aipo": { "truncated": true, "omitted_count": omitted_count } }
        })
    } else {
        serde_json::json!({
            "tool": { "driver": { "name": tool_name, "version": env!("CARGO_PKG_VERSION") } },
            "results": sarif_results
        })
    };

    let doc = serde_json::json!({
        "version": "2.1.0",
        "$schema": SARIF_SCHEMA,
        "runs": [run_obj]
    });

    std::fs::write(out, serde_json::to_string_pretty(&doc)?)?;
    Ok(SarifWriteOutcome { omitted_count })
}

pub fn write_sarif(tool_name: &str, findings: &[Finding], out: &Path) -> anyhow::Result<SarifWriteOutcome> {
    write_sarif_with_limit(tool_name, findings, out, DEFAULT_SARIF_MAX_RESULTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            test_id: "t1".to_string(),
            severity,
            category: "jailbreak".to_string(),
            confidence: 0.9,
            evidence_ref: vec![],
            description: "refused to decline".to_string(),
        }
    }

    #[test]
    fn sorts_by_severity_then_id() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.sarif");
        let findings = vec![finding("b", Severity::Low), finding("a", Severity::Critical)];
        write_sarif("aipo", &findings, &out).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        let results = doc["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["level"], "error");
        assert_eq!(results[1]["level"], "note");
    }

    #[test]
    fn truncates_deterministically_and_reports_omitted_count() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.sarif");
        let findings: Vec<Finding> = (0..5).map(|i| finding(&format!("f{i}"), Severity::Medium)).collect();
        let outcome = write_sarif_with_limit("aipo", &findings, &out, 2).unwrap();
        assert_eq!(outcome.omitted_count, 3);

        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(doc["runs"][0]["results"].as_array().unwrap().len(), 2);
        assert_eq!(doc["runs"][0]["properties"]["aipo"]["omitted_count"], 3);
    }

    #[test]
    fn falls_back_to_synthetic_location_without_evidence_ref() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.sarif");
        write_sarif("aipo", &[finding("a", Severity::High)], &out).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        let uri = &doc["runs"][0]["results"][0]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"];
        assert_eq!(uri, SYNTHETIC_LOCATION_URI);
    }
}
