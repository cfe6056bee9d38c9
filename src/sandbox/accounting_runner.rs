use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;

use super::{RunOutcome, SandboxRunner, run_capped};

const USER_TIME_LABEL: &str = "User time (seconds):";
const MAX_RSS_LABEL: &str = "Maximum resident set size (kbytes):";

/// Runs the binary under a GNU time compatible utility (`time -v`)
///
/// The utility's report is written to the same stderr as the program, and
/// CPU time and peak memory are scraped back out of it.
pub struct AccountingRunner {
    accounting_command: PathBuf,
}

impl AccountingRunner {
    pub fn new(accounting_command: PathBuf) -> Self {
        Self { accounting_command }
    }
}

#[async_trait]
impl SandboxRunner for AccountingRunner {
    async fn run(&self, executable: &Path, limit: Duration) -> Result<RunOutcome> {
        let mut cmd = Command::new(&self.accounting_command);
        cmd.arg("-v").arg(executable);
        if let Some(dir) = executable.parent() {
            cmd.current_dir(dir);
        }

        let mut outcome = run_capped(cmd, limit).await?;
        let (exec_time_ms, memory_kb) = parse_accounting(&outcome.stderr);
        outcome.exec_time_ms = exec_time_ms;
        outcome.memory_kb = memory_kb;
        Ok(outcome)
    }
}

/// Extracts `(user CPU ms, peak RSS kb)` from a `time -v` report.
///
/// Lines are matched by label anywhere in the text; the last match wins.
pub fn parse_accounting(report: &str) -> (Option<u64>, Option<u64>) {
    let mut user_time_ms = None;
    let mut max_rss_kb = None;

    for line in report.lines() {
        if let Some(value) = value_after(line, USER_TIME_LABEL) {
            if let Ok(seconds) = value.parse::<f64>() {
                if seconds.is_finite() && seconds >= 0.0 {
                    user_time_ms = Some((seconds * 1000.0).round() as u64);
                }
            }
        } else if let Some(value) = value_after(line, MAX_RSS_LABEL) {
            if let Ok(kb) = value.parse::<u64>() {
                max_rss_kb = Some(kb);
            }
        }
    }

    (user_time_ms, max_rss_kb)
}

fn value_after<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.find(label)
        .map(|at| line[at + label.len()..].trim())
        .and_then(|rest| rest.split_whitespace().next())
}
