#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use sudoku_oj::config::{JudgeConfig, Limits};
use sudoku_oj::database::{self as db, NewTestCase};
use sudoku_oj::judge::Judge;
use sudoku_oj::models::{Problem, SubmissionRequest};
use sudoku_oj::queue::RankingQueue;
use sudoku_oj::sandbox::{RunOutcome, SandboxRunner};
use sudoku_oj::verdict::{Resolution, Verdict};

pub const PUZZLE: &str = "\
530070000
600195000
098000060
800060003
400803001
700020006
060000280
000419005
000080079
";

pub const SOLUTION: &str = "\
534678912
672195348
198342567
859761423
426853791
713924856
961537284
287419635
345286179
";

pub const SOURCE: &str =
    "std::vector<std::vector<int>> solve(std::vector<std::vector<int>> g) { return g; }";

/// Stands in for a real runner and returns a prepared outcome
pub struct ScriptedRunner {
    outcome: Option<RunOutcome>,
}

impl ScriptedRunner {
    pub fn returning(outcome: RunOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Some(outcome),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { outcome: None })
    }
}

#[async_trait]
impl SandboxRunner for ScriptedRunner {
    async fn run(&self, executable: &Path, _limit: Duration) -> anyhow::Result<RunOutcome> {
        assert!(executable.exists(), "runner called before compilation");
        self.outcome
            .clone()
            .ok_or_else(|| anyhow::anyhow!("spawn failed: permission denied"))
    }
}

pub fn passing_run(stdout: &str) -> RunOutcome {
    RunOutcome {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        wall_time_ms: 20,
        ..Default::default()
    }
}

/// Copies the generated source to the binary path, which always succeeds
pub fn copying_compiler() -> Vec<String> {
    ["cp", "%INPUT%", "%OUTPUT%"].map(String::from).to_vec()
}

pub fn judge_config(compile_command: Vec<String>, work_dir: &Path) -> JudgeConfig {
    JudgeConfig {
        compile_command,
        accounting_command: "/nonexistent/time".into(),
        work_dir: Some(work_dir.to_path_buf()),
    }
}

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub pool: SqlitePool,
    pub queue: Arc<RankingQueue>,
    pub case_ids: Vec<i64>,
    pub user_id: i64,
}

impl TestEnv {
    /// Fresh database with problem 1 holding `case_count` copies of the sample
    pub async fn new(case_count: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::init_db(dir.path().join("oj.sqlite3")).await.unwrap();

        add_problem(&pool, 1, case_count).await;
        let case_ids = db::fetch_test_cases(1, &pool)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        let user_id = db::create_user("alice", &pool).await.unwrap().id;

        Self {
            dir,
            pool,
            queue: Arc::new(RankingQueue::new()),
            case_ids,
            user_id,
        }
    }

    pub fn work_dir(&self) -> std::path::PathBuf {
        let work_dir = self.dir.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        work_dir
    }

    pub fn judge(&self, runner: Arc<dyn SandboxRunner>, compile_command: Vec<String>) -> Judge {
        Judge::new(
            self.pool.clone(),
            runner,
            self.queue.clone(),
            judge_config(compile_command, &self.work_dir()),
            Limits {
                compile_timeout_ms: 5_000,
                total_time_limit_ms: 2_000,
                run_grace_ms: 500,
            },
        )
    }

    pub async fn submit(&self, source: &str) -> i64 {
        submit_as(&self.pool, self.user_id, 1, source).await
    }
}

pub async fn add_problem(pool: &SqlitePool, id: i64, case_count: usize) {
    let cases: Vec<NewTestCase> = (0..case_count)
        .map(|i| NewTestCase {
            input: PUZZLE.to_string(),
            expected_output: SOLUTION.to_string(),
            sample: i == 0,
        })
        .collect();
    db::insert_problem(
        &Problem {
            id,
            name: format!("sudoku {id}"),
            time_limit_ms: 1_000,
            memory_limit_kb: 262_144,
        },
        &cases,
        pool,
    )
    .await
    .unwrap();
}

pub async fn submit_as(pool: &SqlitePool, user_id: i64, problem_id: i64, source: &str) -> i64 {
    db::create_submission(
        &SubmissionRequest {
            user_id,
            problem_id,
            source_code: source.to_string(),
        },
        pool,
    )
    .await
    .unwrap()
}

/// Stores a finished AC submission whose result rows carry `case_times`
pub async fn store_accepted(
    pool: &SqlitePool,
    user_id: i64,
    problem_id: i64,
    case_times: &[i64],
    memory_kb: Option<i64>,
) -> i64 {
    store_graded(pool, user_id, problem_id, Verdict::Ac, case_times, memory_kb).await
}

pub async fn store_graded(
    pool: &SqlitePool,
    user_id: i64,
    problem_id: i64,
    verdict: Verdict,
    case_times: &[i64],
    memory_kb: Option<i64>,
) -> i64 {
    let id = submit_as(pool, user_id, problem_id, SOURCE).await;
    let results = case_times
        .iter()
        .enumerate()
        .map(|(idx, t)| sudoku_oj::models::SubmissionResult {
            case_index: idx as i64,
            test_case_id: None,
            status: verdict,
            time_ms: Some(*t),
            info: String::new(),
        })
        .collect();
    let resolution = Resolution {
        verdict,
        results,
        exec_time_ms: Some(case_times.iter().sum()),
        memory_kb,
    };
    db::save_graded_submission(id, &resolution, pool).await.unwrap();
    id
}
