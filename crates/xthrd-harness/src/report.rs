//! Run reports: JSON documents summarizing a harness run, plus a SHA-256
//! digest helper so reports can be referenced from logs with integrity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::scenarios::ScenarioOutcome;

/// Result of one scenario, as persisted in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub passed: bool,
    pub checks: u64,
    pub failures: Vec<String>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    #[must_use]
    pub fn from_outcome(scenario: &str, outcome: &ScenarioOutcome, duration_ms: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            passed: outcome.failures.is_empty(),
            checks: outcome.checks,
            failures: outcome.failures.clone(),
            duration_ms,
        }
    }
}

/// Aggregate counters over a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub checks: u64,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(results: &[ScenarioReport]) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            checks: results.iter().map(|r| r.checks).sum(),
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Full report for one harness invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub title: String,
    pub run_id: String,
    pub timestamp: String,
    pub results: Vec<ScenarioReport>,
    pub summary: RunSummary,
}

impl RunReport {
    #[must_use]
    pub fn new(run_id: &str, timestamp: &str, results: Vec<ScenarioReport>) -> Self {
        let summary = RunSummary::from_results(&results);
        Self {
            title: String::from("xthrd Conformance Report"),
            run_id: run_id.to_string(),
            timestamp: timestamp.to_string(),
            results,
            summary,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render a compact markdown table for humans.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!(
            "Run `{}` at {}: {} scenarios, {} passed, {} failed, {} checks.\n\n",
            self.run_id,
            self.timestamp,
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.checks,
        ));
        out.push_str("| Scenario | Result | Checks | Duration (ms) |\n");
        out.push_str("|---|---|---|---|\n");
        for r in &self.results {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                r.scenario,
                if r.passed { "pass" } else { "FAIL" },
                r.checks,
                r.duration_ms,
            ));
        }
        for r in self.results.iter().filter(|r| !r.passed) {
            out.push_str(&format!("\n## {} failures\n\n", r.scenario));
            for f in &r.failures {
                out.push_str(&format!("- {f}\n"));
            }
        }
        out
    }
}

/// Hex-encoded SHA-256 digest of arbitrary bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> Vec<ScenarioReport> {
        vec![
            ScenarioReport {
                scenario: "mutual_exclusion".to_string(),
                passed: true,
                checks: 4,
                failures: Vec::new(),
                duration_ms: 18,
            },
            ScenarioReport {
                scenario: "broadcast_release".to_string(),
                passed: false,
                checks: 8,
                failures: vec!["waiter 3 never woke".to_string()],
                duration_ms: 2_001,
            },
        ]
    }

    #[test]
    fn summary_counts_results() {
        let summary = RunSummary::from_results(&sample_results());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.checks, 12);
        assert!(!summary.all_passed());
    }

    #[test]
    fn report_json_roundtrip() {
        let report = RunReport::new("run-1", "2026-01-01T00:00:00Z", sample_results());
        let json = report.to_json().unwrap();
        let restored: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, "run-1");
        assert_eq!(restored.results.len(), 2);
        assert_eq!(restored.summary.failed, 1);
    }

    #[test]
    fn markdown_lists_failures() {
        let report = RunReport::new("run-1", "2026-01-01T00:00:00Z", sample_results());
        let md = report.to_markdown();
        assert!(md.contains("| mutual_exclusion | pass |"));
        assert!(md.contains("| broadcast_release | FAIL |"));
        assert!(md.contains("- waiter 3 never woke"));
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
