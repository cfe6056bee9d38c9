use serde::{Deserialize, Serialize};

use crate::verdict::Verdict;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub id: i64,
    pub name: String,
    pub time_limit_ms: i64,
    pub memory_limit_kb: i64,
}

/// One input/expected pair; `id` order is the processing order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: i64,
    pub problem_id: i64,
    pub input: String,
    pub expected_output: String,
    pub sample: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmissionRequest {
    pub user_id: i64,
    pub problem_id: i64,
    pub source_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub source_code: String,
    pub verdict: Verdict,
    pub exec_time_ms: Option<i64>,
    pub memory_kb: Option<i64>,
    pub created_time: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub case_index: i64,
    pub test_case_id: Option<i64>,
    pub status: Verdict,
    pub time_ms: Option<i64>,
    pub info: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmissionRecord {
    #[serde(flatten)]
    pub submission: Submission,
    pub results: Vec<SubmissionResult>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub total_time_ms: Option<i64>,
    pub total_memory_kb: Option<i64>,
    pub rank: Option<i64>,
}
