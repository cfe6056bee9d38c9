use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use sqlx::SqlitePool;

use crate::config::{JudgeConfig, Limits};
use crate::database as db;
use crate::models::{Submission, SubmissionRecord, TestCase};
use crate::queue::RankingQueue;
use crate::sandbox::{SandboxRunner, compile, generate_harness, parse_case_reports};
use crate::verdict::{Resolution, Verdict, resolve};

const SOURCE_NAME: &str = "main.cpp";
const EXECUTABLE_NAME: &str = "main";

/// The grading pipeline: harness, compile, run, parse, resolve, persist.
///
/// One call grades one submission strictly in sequence. Each call works in
/// its own temporary directory, removed when the call returns.
pub struct Judge {
    pool: SqlitePool,
    runner: Arc<dyn SandboxRunner>,
    ranking: Arc<RankingQueue>,
    settings: JudgeConfig,
    limits: Limits,
}

impl Judge {
    pub fn new(
        pool: SqlitePool,
        runner: Arc<dyn SandboxRunner>,
        ranking: Arc<RankingQueue>,
        settings: JudgeConfig,
        limits: Limits,
    ) -> Self {
        Self {
            pool,
            runner,
            ranking,
            settings,
            limits,
        }
    }

    /// Grades a stored submission and returns its final record.
    ///
    /// Subprocess and I/O failures become verdicts; only a missing
    /// submission or a failure to persist the verdict is returned as an
    /// error. An AC verdict queues a ranking pass.
    pub async fn grade(&self, submission_id: i64) -> Result<SubmissionRecord> {
        let start_time = Instant::now();

        let submission = db::fetch_submission(submission_id, &self.pool)
            .await?
            .ok_or_else(|| anyhow!("Submission {submission_id} not found"))?;
        if submission.verdict != Verdict::Pending {
            log::warn!(
                "Submission {submission_id} already graded as {}, grading again",
                submission.verdict
            );
        }

        let resolution = match db::fetch_test_cases(submission.problem_id, &self.pool).await {
            Ok(cases) => match self.evaluate(&submission, &cases, start_time).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    log::error!("Grading submission {submission_id} failed: {e:#}");
                    Resolution::orchestration_error(cases.first().map(|c| c.id), &e)
                }
            },
            Err(e) => {
                let e = anyhow::Error::from(e).context("Failed to load test cases");
                log::error!("Grading submission {submission_id} failed: {e:#}");
                Resolution::orchestration_error(None, &e)
            }
        };

        db::save_graded_submission(submission_id, &resolution, &self.pool)
            .await
            .with_context(|| format!("Failed to save verdict of submission {submission_id}"))?;
        log::info!(
            "Submission {submission_id} graded {} in {} ms",
            resolution.verdict,
            start_time.elapsed().as_millis()
        );

        if resolution.verdict == Verdict::Ac {
            self.ranking.request(Some(submission.user_id)).await;
        }

        db::fetch_submission_record(submission_id, &self.pool)
            .await?
            .ok_or_else(|| anyhow!("Submission {submission_id} vanished after grading"))
    }

    async fn evaluate(
        &self,
        submission: &Submission,
        cases: &[TestCase],
        start_time: Instant,
    ) -> Result<Resolution> {
        let program = generate_harness(&submission.source_code, cases)?;

        let workspace = self.create_workspace()?;
        let source_path = workspace.path().join(SOURCE_NAME);
        let executable_path = workspace.path().join(EXECUTABLE_NAME);
        tokio::fs::write(&source_path, program).await?;

        let compilation = compile(
            &self.settings.compile_command,
            &source_path,
            &executable_path,
            self.limits.compile_timeout_ms,
        )
        .await?;
        if !compilation.success {
            return Ok(Resolution::compile_error(cases.first().map(|c| c.id)));
        }

        let limit =
            Duration::from_millis(self.limits.total_time_limit_ms + self.limits.run_grace_ms);
        let outcome = self.runner.run(&executable_path, limit).await?;
        log::debug!(
            "Submission {} run: exit {:?}, timeout {}, overflow {}, cpu {:?} ms, rss {:?} kb",
            submission.id,
            outcome.exit_code,
            outcome.timeout,
            outcome.output_overflow,
            outcome.exec_time_ms,
            outcome.memory_kb
        );

        let reports = parse_case_reports(&outcome.stdout, cases.len());
        let case_ids: Vec<i64> = cases.iter().map(|c| c.id).collect();

        Ok(resolve(
            &reports,
            &outcome,
            &case_ids,
            self.limits.total_time_limit_ms,
            start_time.elapsed().as_millis() as u64,
        ))
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir> {
        let parent = self.work_dir();
        std::fs::create_dir_all(&parent)?;
        tempfile::Builder::new()
            .prefix("sudoku-oj-")
            .tempdir_in(&parent)
            .with_context(|| format!("Failed to create workspace in {}", parent.display()))
    }

    /// Parent directory of the per-submission workspaces
    pub fn work_dir(&self) -> PathBuf {
        self.settings
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
