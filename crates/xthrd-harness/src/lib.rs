//! Conformance and stress harness for the xthrd threading layer.
//!
//! The harness runs named scenarios against the public `xthrd-core` API,
//! emits a structured JSONL log of every check, and writes a JSON report
//! with a SHA-256 integrity digest.

pub mod log;
pub mod report;
pub mod scenarios;

use thiserror::Error;

/// Errors surfaced by the harness CLI and report plumbing.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown scenario '{0}', run `harness list` for the registry")]
    UnknownScenario(String),

    #[error("{0} scenario(s) failed")]
    ScenariosFailed(usize),
}

pub use report::{RunReport, RunSummary, ScenarioReport, sha256_hex};
pub use scenarios::{Scenario, ScenarioOutcome};
