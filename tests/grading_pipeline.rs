mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::*;
use sudoku_oj::database as db;
use sudoku_oj::sandbox::{OVERFLOW_EXIT_CODE, RunOutcome, SimpleRunner};
use sudoku_oj::verdict::Verdict;

#[tokio::test]
async fn test_all_cases_pass_is_accepted() {
    let env = TestEnv::new(3).await;
    let runner = ScriptedRunner::returning(RunOutcome {
        memory_kb: Some(3_000),
        ..passing_run(
            "CASE 0 STATUS 0 TIME_MS 4\nCASE 1 STATUS 0 TIME_MS 5\nCASE 2 STATUS 0 TIME_MS 6\n",
        )
    });
    let judge = env.judge(runner, copying_compiler());

    let id = env.submit(SOURCE).await;
    let record = judge.grade(id).await.unwrap();

    assert_eq!(record.submission.verdict, Verdict::Ac);
    assert_eq!(record.submission.exec_time_ms, Some(15));
    assert_eq!(record.submission.memory_kb, Some(3_000));
    assert_eq!(record.results.len(), 3);
    assert!(record.results.iter().all(|r| r.status == Verdict::Ac));
    let ids: Vec<Option<i64>> = record.results.iter().map(|r| r.test_case_id).collect();
    assert_eq!(ids, env.case_ids.iter().map(|id| Some(*id)).collect::<Vec<_>>());

    // Acceptance queues a ranking pass for the submitter
    let pending = env.queue.pop_all().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].user_id, Some(env.user_id));
}

#[tokio::test]
async fn test_results_stop_at_first_failure() {
    let env = TestEnv::new(5).await;
    let runner = ScriptedRunner::returning(RunOutcome {
        exit_code: Some(2),
        ..passing_run("CASE 0 STATUS 0 TIME_MS 7\nCASE 1 STATUS 2 TIME_MS 1\n")
    });
    let judge = env.judge(runner, copying_compiler());

    let id = env.submit(SOURCE).await;
    let record = judge.grade(id).await.unwrap();

    assert_eq!(record.submission.verdict, Verdict::Wa);
    let rows: Vec<(i64, Verdict)> = record
        .results
        .iter()
        .map(|r| (r.case_index, r.status))
        .collect();
    assert_eq!(rows, vec![(0, Verdict::Ac), (1, Verdict::Wa)]);
    assert_eq!(record.submission.exec_time_ms, Some(7));

    // Wrong answers never touch the ranking
    assert!(env.queue.is_empty().await);
}

#[tokio::test]
async fn test_timeout_beats_passing_cases() {
    let env = TestEnv::new(2).await;
    let runner = ScriptedRunner::returning(RunOutcome {
        timeout: true,
        exit_code: None,
        ..passing_run("CASE 0 STATUS 0 TIME_MS 1\nCASE 1 STATUS 0 TIME_MS 1\n")
    });
    let judge = env.judge(runner, copying_compiler());

    let record = judge.grade(env.submit(SOURCE).await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Tle);
    assert_eq!(record.results.len(), 2);
}

#[tokio::test]
async fn test_output_overflow_is_not_accepted() {
    let env = TestEnv::new(1).await;
    let runner = ScriptedRunner::returning(RunOutcome {
        output_overflow: true,
        exit_code: Some(OVERFLOW_EXIT_CODE),
        ..passing_run("CASE 0 STATUS 0 TIME_MS 1\n")
    });
    let judge = env.judge(runner, copying_compiler());

    let record = judge.grade(env.submit(SOURCE).await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Wa);
    assert_eq!(record.results.len(), 1);
}

#[tokio::test]
async fn test_compile_failure() {
    let env = TestEnv::new(3).await;
    let judge = env.judge(
        ScriptedRunner::returning(passing_run("")),
        vec!["sh".to_string(), "-c".to_string(), "echo 'secret toolchain detail' >&2; exit 1".to_string()],
    );

    let record = judge.grade(env.submit("not c++").await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Ce);
    assert_eq!(record.submission.exec_time_ms, None);
    assert_eq!(record.results.len(), 1);
    assert_eq!(record.results[0].status, Verdict::Ce);
    assert_eq!(record.results[0].test_case_id, Some(env.case_ids[0]));
    assert!(!record.results[0].info.contains("secret"));
}

#[tokio::test]
async fn test_runner_error_is_runtime_error() {
    let env = TestEnv::new(3).await;
    let judge = env.judge(ScriptedRunner::failing(), copying_compiler());

    let record = judge.grade(env.submit(SOURCE).await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Re);
    assert_eq!(record.results.len(), 1);
    assert_eq!(record.results[0].test_case_id, Some(env.case_ids[0]));
    assert!(record.results[0].info.contains("permission denied"));
}

#[tokio::test]
async fn test_malformed_case_data_is_runtime_error() {
    let env = TestEnv::new(0).await;
    db::insert_problem(
        &sudoku_oj::models::Problem {
            id: 2,
            name: "broken".to_string(),
            time_limit_ms: 1_000,
            memory_limit_kb: 1_024,
        },
        &[db::NewTestCase {
            input: "123".to_string(),
            expected_output: SOLUTION.to_string(),
            sample: false,
        }],
        &env.pool,
    )
    .await
    .unwrap();
    let judge = env.judge(ScriptedRunner::returning(passing_run("")), copying_compiler());

    let id = submit_as(&env.pool, env.user_id, 2, SOURCE).await;
    let record = judge.grade(id).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Re);
    assert!(record.results[0].info.contains("malformed input grid"));
}

#[tokio::test]
async fn test_workspace_is_removed() {
    let env = TestEnv::new(1).await;
    let judge = env.judge(
        ScriptedRunner::returning(passing_run("CASE 0 STATUS 0 TIME_MS 1\n")),
        copying_compiler(),
    );
    judge.grade(env.submit(SOURCE).await).await.unwrap();

    let judge = env.judge(ScriptedRunner::failing(), copying_compiler());
    judge.grade(env.submit(SOURCE).await).await.unwrap();

    let leftovers = std::fs::read_dir(judge.work_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_unknown_submission_is_an_error() {
    let env = TestEnv::new(1).await;
    let judge = env.judge(ScriptedRunner::failing(), copying_compiler());
    assert!(judge.grade(9_999).await.is_err());
}

/// The "compiler" writes a shell script that behaves like a passing harness
#[tokio::test]
async fn test_end_to_end_with_simple_runner() {
    let env = TestEnv::new(2).await;
    let compiler = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '#!/bin/sh\\necho \"CASE 0 STATUS 0 TIME_MS 2\"\\necho \"CASE 1 STATUS 0 TIME_MS 3\"\\n' > \"$1\" && chmod +x \"$1\"".to_string(),
        "sh".to_string(),
        "%OUTPUT%".to_string(),
    ];
    let judge = env.judge(Arc::new(SimpleRunner), compiler);

    let record = judge.grade(env.submit(SOURCE).await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Ac);
    assert_eq!(record.submission.exec_time_ms, Some(5));
    assert_eq!(record.submission.memory_kb, None);
}

#[tokio::test]
async fn test_end_to_end_crash_is_wrong_answer() {
    let env = TestEnv::new(3).await;
    let compiler = vec![
        "sh".to_string(),
        "-c".to_string(),
        "printf '#!/bin/sh\\necho \"CASE 0 STATUS 0 TIME_MS 2\"\\nkill -SEGV $$\\n' > \"$1\" && chmod +x \"$1\"".to_string(),
        "sh".to_string(),
        "%OUTPUT%".to_string(),
    ];
    let judge = env.judge(Arc::new(SimpleRunner), compiler);

    let record = judge.grade(env.submit(SOURCE).await).await.unwrap();
    assert_eq!(record.submission.verdict, Verdict::Wa);
    let rows: Vec<(i64, Verdict)> = record
        .results
        .iter()
        .map(|r| (r.case_index, r.status))
        .collect();
    assert_eq!(rows, vec![(0, Verdict::Ac), (1, Verdict::Wa)]);
}
