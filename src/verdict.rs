use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::config::DIAGNOSTIC_CLIP_CHARS;
use crate::models::SubmissionResult;
use crate::sandbox::{CaseReport, RunOutcome};

/// Harness status codes
pub const STATUS_PASS: i32 = 0;
pub const STATUS_OUT_OF_RANGE: i32 = 1;
pub const STATUS_CLUE_VIOLATION: i32 = 2;
pub const STATUS_INVALID_SOLUTION: i32 = 3;
pub const STATUS_MISMATCH: i32 = 4;
pub const STATUS_RUNTIME_FAULT: i32 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pending,
    Ac,
    Wa,
    Tle,
    Re,
    Ce,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "PENDING",
            Verdict::Ac => "AC",
            Verdict::Wa => "WA",
            Verdict::Tle => "TLE",
            Verdict::Re => "RE",
            Verdict::Ce => "CE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Verdict::Pending),
            "AC" => Ok(Verdict::Ac),
            "WA" => Ok(Verdict::Wa),
            "TLE" => Ok(Verdict::Tle),
            "RE" => Ok(Verdict::Re),
            "CE" => Ok(Verdict::Ce),
            other => Err(anyhow!("Unknown verdict {other:?}")),
        }
    }
}

/// Every non-zero harness status, runtime faults included, is a wrong answer
pub fn case_verdict(status: i32) -> Verdict {
    if status == STATUS_PASS {
        Verdict::Ac
    } else {
        Verdict::Wa
    }
}

pub fn describe_status(status: i32) -> String {
    match status {
        STATUS_PASS => "passed".to_string(),
        STATUS_OUT_OF_RANGE => "cell out of range 1-9 or grid not 9x9".to_string(),
        STATUS_CLUE_VIOLATION => "a given clue was changed".to_string(),
        STATUS_INVALID_SOLUTION => "a row, column or box is not a permutation of 1-9".to_string(),
        STATUS_MISMATCH => "solution differs from the expected grid".to_string(),
        STATUS_RUNTIME_FAULT => "solve raised an exception".to_string(),
        other => format!("unknown status {other}"),
    }
}

pub fn clip_diagnostic(text: &str) -> String {
    text.chars().take(DIAGNOSTIC_CLIP_CHARS).collect()
}

/// Final verdict of one submission together with what gets stored for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub verdict: Verdict,
    pub results: Vec<SubmissionResult>,
    pub exec_time_ms: Option<i64>,
    pub memory_kb: Option<i64>,
}

impl Resolution {
    pub fn compile_error(first_case_id: Option<i64>) -> Self {
        Self::terminal(
            Verdict::Ce,
            first_case_id,
            "Compilation failed".to_string(),
        )
    }

    pub fn orchestration_error(first_case_id: Option<i64>, error: &anyhow::Error) -> Self {
        Self::terminal(
            Verdict::Re,
            first_case_id,
            clip_diagnostic(&format!("{error:#}")),
        )
    }

    fn terminal(verdict: Verdict, first_case_id: Option<i64>, info: String) -> Self {
        Self {
            verdict,
            results: vec![SubmissionResult {
                case_index: 0,
                test_case_id: first_case_id,
                status: verdict,
                time_ms: None,
                info,
            }],
            exec_time_ms: None,
            memory_kb: None,
        }
    }
}

/// Combines parsed case reports and runner signals into a verdict.
///
/// Rows are recorded in case order and stop at the first failing case. A
/// timeout, or a measured time above `total_limit_ms`, turns the verdict
/// into TLE whatever the cases said. A process that failed without
/// reporting a failing case (crash, overflow, unexpected exit code) is a
/// WA at the first case it did not report, and so is one that exited
/// cleanly without reporting every case.
pub fn resolve(
    reports: &[Option<CaseReport>],
    outcome: &RunOutcome,
    case_ids: &[i64],
    total_limit_ms: u64,
    request_elapsed_ms: u64,
) -> Resolution {
    let case_count = reports.len();
    let mut verdict = Verdict::Ac;
    let mut results = Vec::with_capacity(case_count);

    for (idx, report) in reports.iter().enumerate() {
        let Some(report) = report else {
            break;
        };
        let status = case_verdict(report.status);
        results.push(SubmissionResult {
            case_index: idx as i64,
            test_case_id: case_ids.get(idx).copied(),
            status,
            time_ms: Some(report.time_ms as i64),
            info: if status == Verdict::Ac {
                String::new()
            } else {
                describe_status(report.status)
            },
        });
        if status != Verdict::Ac {
            verdict = status;
            break;
        }
    }

    let over_limit = outcome.timeout
        || outcome.wall_time_ms > total_limit_ms
        || outcome.exec_time_ms.is_some_and(|t| t > total_limit_ms);

    if over_limit {
        if verdict == Verdict::Ac && results.len() < case_count {
            let idx = results.len();
            results.push(SubmissionResult {
                case_index: idx as i64,
                test_case_id: case_ids.get(idx).copied(),
                status: Verdict::Tle,
                time_ms: None,
                info: format!("time limit of {total_limit_ms} ms exceeded"),
            });
        }
        verdict = Verdict::Tle;
    } else if verdict == Verdict::Ac
        && case_count > 0
        && (results.len() < case_count || !outcome.succeeded())
    {
        let info = clip_diagnostic(&failure_info(outcome));
        if results.len() < case_count {
            let idx = results.len();
            results.push(SubmissionResult {
                case_index: idx as i64,
                test_case_id: case_ids.get(idx).copied(),
                status: Verdict::Wa,
                time_ms: None,
                info,
            });
        } else if let Some(last) = results.last_mut() {
            last.status = Verdict::Wa;
            last.info = info;
        }
        verdict = Verdict::Wa;
    }

    Resolution {
        verdict,
        exec_time_ms: Some(attribute_time(reports, &results, outcome, request_elapsed_ms) as i64),
        memory_kb: outcome.memory_kb.map(|kb| kb as i64),
        results,
    }
}

fn failure_info(outcome: &RunOutcome) -> String {
    let headline = if outcome.output_overflow {
        "output limit exceeded".to_string()
    } else {
        match outcome.exit_code {
            Some(0) => "process exited before reporting every case".to_string(),
            Some(code) => format!("process exited with code {code}"),
            None => "process terminated by a signal".to_string(),
        }
    };
    if outcome.stderr.is_empty() {
        headline
    } else {
        format!("{headline}\n{}", outcome.stderr)
    }
}

/// Picks the execution time stored with a submission, first non-zero of:
/// summed AC case times, measured CPU time, slowest reported case, and the
/// wall clock of the whole grading request.
pub fn attribute_time(
    reports: &[Option<CaseReport>],
    results: &[SubmissionResult],
    outcome: &RunOutcome,
    request_elapsed_ms: u64,
) -> u64 {
    let ac_sum: u64 = results
        .iter()
        .filter(|r| r.status == Verdict::Ac)
        .filter_map(|r| r.time_ms)
        .map(|t| t as u64)
        .sum();
    if ac_sum > 0 {
        return ac_sum;
    }

    if let Some(cpu) = outcome.exec_time_ms.filter(|t| *t > 0) {
        return cpu;
    }

    let slowest = reports.iter().flatten().map(|r| r.time_ms).max();
    match slowest {
        Some(t) if t > 0 => t,
        _ => request_elapsed_ms,
    }
}
