//! CLI entrypoint for the xthrd conformance harness.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use xthrd_harness::log::{LogEmitter, LogEntry, LogLevel, Outcome};
use xthrd_harness::{HarnessError, RunReport, ScenarioReport, scenarios, sha256_hex};

/// Conformance tooling for xthrd.
#[derive(Debug, Parser)]
#[command(name = "xthrd-harness")]
#[command(about = "Conformance and stress harness for xthrd")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the registered scenarios.
    List,
    /// Run scenarios and write a JSON report.
    Run {
        /// Scenario name to run; all scenarios when omitted.
        #[arg(long)]
        scenario: Option<String>,
        /// Identifier stitched into trace ids and the report.
        #[arg(long, default_value = "local")]
        run_id: String,
        /// Output report path (JSON; a markdown rendering and a .sha256
        /// sidecar are written next to it).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Structured JSONL log path (if omitted, log lines go to stderr).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Optional fixed timestamp string for deterministic report output.
        #[arg(long)]
        timestamp: Option<String>,
    },
}

fn main() -> Result<(), HarnessError> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            for s in scenarios::all() {
                println!("{:<24} {}", s.name, s.summary);
            }
        }
        Command::Run {
            scenario,
            run_id,
            report,
            log,
            timestamp,
        } => {
            let selected: Vec<&scenarios::Scenario> = match &scenario {
                Some(name) => vec![
                    scenarios::find(name)
                        .ok_or_else(|| HarnessError::UnknownScenario(name.clone()))?,
                ],
                None => scenarios::all().iter().collect(),
            };

            let mut emitter = match &log {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    Some(LogEmitter::to_file(path, &run_id)?)
                }
                None => None,
            };

            let mut results = Vec::new();
            for s in &selected {
                eprintln!("running {}", s.name);
                let started = Instant::now();
                let outcome = (s.run)();
                let duration_ms = started.elapsed().as_millis() as u64;

                let result = ScenarioReport::from_outcome(s.name, &outcome, duration_ms);
                let entry = LogEntry::new(
                    "",
                    if result.passed {
                        LogLevel::Info
                    } else {
                        LogLevel::Error
                    },
                    "scenario_end",
                )
                .with_scenario(s.name)
                .with_outcome(if result.passed {
                    Outcome::Pass
                } else {
                    Outcome::Fail
                })
                .with_checks(result.checks)
                .with_duration_ms(duration_ms);
                let entry = if result.failures.is_empty() {
                    entry
                } else {
                    entry.with_failures(result.failures.clone())
                };

                match emitter.as_mut() {
                    Some(em) => em.emit_entry(entry)?,
                    None => eprintln!("{}", entry.to_jsonl()?),
                }
                results.push(result);
            }
            if let Some(em) = emitter.as_mut() {
                em.flush()?;
            }

            let timestamp =
                timestamp.unwrap_or_else(|| format!("{:?}", std::time::SystemTime::now()));
            let doc = RunReport::new(&run_id, &timestamp, results);

            eprintln!(
                "run complete: total={}, passed={}, failed={}, checks={}",
                doc.summary.total, doc.summary.passed, doc.summary.failed, doc.summary.checks
            );

            if let Some(report_path) = report {
                if let Some(parent) = report_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let json = doc.to_json()?;
                std::fs::write(&report_path, &json)?;
                std::fs::write(report_path.with_extension("md"), doc.to_markdown())?;
                std::fs::write(report_path.with_extension("sha256"), sha256_hex(json.as_bytes()))?;
                eprintln!("wrote report to {}", report_path.display());
            }

            if !doc.summary.all_passed() {
                return Err(HarnessError::ScenariosFailed(doc.summary.failed));
            }
        }
    }

    Ok(())
}
