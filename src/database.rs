use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::ProblemConfig;
use crate::create_timestamp;
use crate::models::{
    Problem, Submission, SubmissionRecord, SubmissionRequest, SubmissionResult, TestCase, User,
};
use crate::verdict::{Resolution, Verdict};

const DATABASE_NAME: &str = "sudoku-oj.sqlite3";

pub fn get_db_path() -> anyhow::Result<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "sudoku-oj")
        .context("Unable to find user directory")?;
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).context("Failed to create local data dir")?;

    Ok(data_dir.join(DATABASE_NAME))
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display()); // rwc = read/write/create
    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .min_connections(0)
        .connect(&db_url)
        .await?;

    // PRAGMA statements cannot run inside a transaction
    for pragma_sql in &[
        "PRAGMA foreign_keys = ON;",
        "PRAGMA busy_timeout = 5000;",
        "PRAGMA journal_mode = WAL;",
        "PRAGMA synchronous = NORMAL;",
    ] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id               INTEGER PRIMARY KEY,
            name             TEXT    NOT NULL UNIQUE,
            total_time_ms    INTEGER,
            total_memory_kb  INTEGER,
            rank             INTEGER
        );",
        r"
        CREATE TABLE IF NOT EXISTS problems (
            id               INTEGER PRIMARY KEY,
            name             TEXT    NOT NULL,
            time_limit_ms    INTEGER NOT NULL,
            memory_limit_kb  INTEGER NOT NULL
        );",
        r"
        CREATE TABLE IF NOT EXISTS test_cases (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            problem_id       INTEGER NOT NULL,
            input            TEXT    NOT NULL,
            expected_output  TEXT    NOT NULL,
            is_sample        INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (problem_id) REFERENCES problems (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS submissions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id          INTEGER NOT NULL,
            problem_id       INTEGER NOT NULL,
            source_code      TEXT    NOT NULL,
            verdict          TEXT    NOT NULL,
            exec_time_ms     INTEGER,
            memory_kb        INTEGER,
            created_time     TEXT    NOT NULL,
            updated_time     TEXT    NOT NULL,
            FOREIGN KEY (user_id)    REFERENCES users (id),
            FOREIGN KEY (problem_id) REFERENCES problems (id)
        );",
        "CREATE INDEX IF NOT EXISTS idx_submissions_verdict ON submissions(verdict, user_id, problem_id);",
        r"
        CREATE TABLE IF NOT EXISTS submission_results (
            submission_id    INTEGER NOT NULL,
            case_index       INTEGER NOT NULL,
            test_case_id     INTEGER,
            status           TEXT    NOT NULL,
            time_ms          INTEGER,
            info             TEXT    NOT NULL DEFAULT '',
            PRIMARY KEY (submission_id, case_index),
            FOREIGN KEY (submission_id) REFERENCES submissions (id),
            FOREIGN KEY (test_case_id)  REFERENCES test_cases (id)
        );",
        "INSERT OR IGNORE INTO users (id, name) VALUES (0, 'root');",
    ] {
        sqlx::query(sql).execute(tx.as_mut()).await?;
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // Remove WAL and SHM files (ignore errors as they might not exist)
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}

/// A test case before it has been given an id
#[derive(Debug, Clone)]
pub struct NewTestCase {
    pub input: String,
    pub expected_output: String,
    pub sample: bool,
}

/// Inserts every configured problem that is not in the database yet.
///
/// Problems are immutable, so an existing id is left untouched even if the
/// configuration changed.
pub async fn seed_problems(problems: &[ProblemConfig], pool: &SqlitePool) -> anyhow::Result<()> {
    for config in problems {
        if fetch_problem(config.id, pool).await?.is_some() {
            log::debug!("Problem {} already present, not reseeding", config.id);
            continue;
        }

        let mut cases = Vec::with_capacity(config.cases.len());
        for case in &config.cases {
            cases.push(NewTestCase {
                input: fs::read_to_string(&case.input_file)
                    .with_context(|| format!("Failed to read {}", case.input_file))?,
                expected_output: fs::read_to_string(&case.answer_file)
                    .with_context(|| format!("Failed to read {}", case.answer_file))?,
                sample: case.sample,
            });
        }

        let problem = Problem {
            id: config.id,
            name: config.name.clone(),
            time_limit_ms: config.time_limit_ms,
            memory_limit_kb: config.memory_limit_kb,
        };
        insert_problem(&problem, &cases, pool).await?;
        log::info!(
            "Seeded problem {} ({}) with {} cases",
            problem.id,
            problem.name,
            cases.len()
        );
    }
    Ok(())
}

pub async fn insert_problem(
    problem: &Problem,
    cases: &[NewTestCase],
    pool: &SqlitePool,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO problems (id, name, time_limit_ms, memory_limit_kb) VALUES (?, ?, ?, ?)",
    )
    .bind(problem.id)
    .bind(&problem.name)
    .bind(problem.time_limit_ms)
    .bind(problem.memory_limit_kb)
    .execute(tx.as_mut())
    .await?;

    for case in cases {
        sqlx::query(
            "INSERT INTO test_cases (problem_id, input, expected_output, is_sample) VALUES (?, ?, ?, ?)",
        )
        .bind(problem.id)
        .bind(&case.input)
        .bind(&case.expected_output)
        .bind(case.sample)
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await
}

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: i64,
    name: String,
    time_limit_ms: i64,
    memory_limit_kb: i64,
}

pub async fn fetch_problem(id: i64, pool: &SqlitePool) -> sqlx::Result<Option<Problem>> {
    let row = sqlx::query_as::<_, ProblemRow>(
        "SELECT id, name, time_limit_ms, memory_limit_kb FROM problems WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Problem {
        id: r.id,
        name: r.name,
        time_limit_ms: r.time_limit_ms,
        memory_limit_kb: r.memory_limit_kb,
    }))
}

#[derive(sqlx::FromRow)]
struct TestCaseRow {
    id: i64,
    problem_id: i64,
    input: String,
    expected_output: String,
    is_sample: bool,
}

/// Test cases of a problem in processing order
pub async fn fetch_test_cases(problem_id: i64, pool: &SqlitePool) -> sqlx::Result<Vec<TestCase>> {
    let rows = sqlx::query_as::<_, TestCaseRow>(
        r"
        SELECT id, problem_id, input, expected_output, is_sample
        FROM test_cases
        WHERE problem_id = ?
        ORDER BY id
        ",
    )
    .bind(problem_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| TestCase {
            id: r.id,
            problem_id: r.problem_id,
            input: r.input,
            expected_output: r.expected_output,
            sample: r.is_sample,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    total_time_ms: Option<i64>,
    total_memory_kb: Option<i64>,
    rank: Option<i64>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            name: r.name,
            total_time_ms: r.total_time_ms,
            total_memory_kb: r.total_memory_kb,
            rank: r.rank,
        }
    }
}

pub async fn find_user(id: i64, pool: &SqlitePool) -> sqlx::Result<bool> {
    let result = sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(result.is_some())
}

/// Create a new user with auto-generated ID
pub async fn create_user(name: &str, pool: &SqlitePool) -> sqlx::Result<User> {
    let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(User {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        total_time_ms: None,
        total_memory_kb: None,
        rank: None,
    })
}

pub async fn list_users(pool: &SqlitePool) -> sqlx::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, total_time_ms, total_memory_kb, rank FROM users ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

/// Ranked users only, best first
pub async fn fetch_ranklist(pool: &SqlitePool) -> sqlx::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(
        r"
        SELECT id, name, total_time_ms, total_memory_kb, rank
        FROM users
        WHERE rank IS NOT NULL
        ORDER BY rank
        ",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

/// Creates a PENDING submission and returns its id
pub async fn create_submission(request: &SubmissionRequest, pool: &SqlitePool) -> sqlx::Result<i64> {
    let now = create_timestamp();

    let result = sqlx::query(
        r"
        INSERT INTO submissions (user_id, problem_id, source_code, verdict, created_time, updated_time)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(request.user_id)
    .bind(request.problem_id)
    .bind(&request.source_code)
    .bind(Verdict::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: i64,
    user_id: i64,
    problem_id: i64,
    source_code: String,
    verdict: String,
    exec_time_ms: Option<i64>,
    memory_kb: Option<i64>,
    created_time: String,
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    case_index: i64,
    test_case_id: Option<i64>,
    status: String,
    time_ms: Option<i64>,
    info: String,
}

fn decode_verdict(raw: &str) -> sqlx::Result<Verdict> {
    raw.parse::<Verdict>()
        .map_err(|e| sqlx::Error::Decode(e.into()))
}

pub async fn fetch_submission(id: i64, pool: &SqlitePool) -> sqlx::Result<Option<Submission>> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r"
        SELECT id, user_id, problem_id, source_code, verdict, exec_time_ms, memory_kb, created_time
        FROM submissions
        WHERE id = ?
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(Submission {
        id: row.id,
        user_id: row.user_id,
        problem_id: row.problem_id,
        source_code: row.source_code,
        verdict: decode_verdict(&row.verdict)?,
        exec_time_ms: row.exec_time_ms,
        memory_kb: row.memory_kb,
        created_time: row.created_time,
    }))
}

pub async fn fetch_submission_results(
    submission_id: i64,
    pool: &SqlitePool,
) -> sqlx::Result<Vec<SubmissionResult>> {
    let rows = sqlx::query_as::<_, ResultRow>(
        r"
        SELECT case_index, test_case_id, status, time_ms, info
        FROM submission_results
        WHERE submission_id = ?
        ORDER BY case_index
        ",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(SubmissionResult {
                case_index: r.case_index,
                test_case_id: r.test_case_id,
                status: decode_verdict(&r.status)?,
                time_ms: r.time_ms,
                info: r.info,
            })
        })
        .collect()
}

pub async fn fetch_submission_record(
    id: i64,
    pool: &SqlitePool,
) -> sqlx::Result<Option<SubmissionRecord>> {
    let Some(submission) = fetch_submission(id, pool).await? else {
        return Ok(None);
    };
    let results = fetch_submission_results(id, pool).await?;
    Ok(Some(SubmissionRecord {
        submission,
        results,
    }))
}

/// Stores the final verdict, time, memory and result rows in one transaction
pub async fn save_graded_submission(
    id: i64,
    resolution: &Resolution,
    pool: &SqlitePool,
) -> sqlx::Result<()> {
    let now = create_timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
        UPDATE submissions
        SET verdict = ?, exec_time_ms = ?, memory_kb = ?, updated_time = ?
        WHERE id = ?
        ",
    )
    .bind(resolution.verdict.as_str())
    .bind(resolution.exec_time_ms)
    .bind(resolution.memory_kb)
    .bind(&now)
    .bind(id)
    .execute(tx.as_mut())
    .await?;

    sqlx::query("DELETE FROM submission_results WHERE submission_id = ?")
        .bind(id)
        .execute(tx.as_mut())
        .await?;

    for row in &resolution.results {
        sqlx::query(
            r"
            INSERT INTO submission_results (submission_id, case_index, test_case_id, status, time_ms, info)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(id)
        .bind(row.case_index)
        .bind(row.test_case_id)
        .bind(row.status.as_str())
        .bind(row.time_ms)
        .bind(&row.info)
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Resolution;

    async fn test_pool(dir: &tempfile::TempDir) -> SqlitePool {
        init_db(dir.path().join("test.sqlite3")).await.unwrap()
    }

    fn problem(id: i64) -> Problem {
        Problem {
            id,
            name: format!("problem {id}"),
            time_limit_ms: 1000,
            memory_limit_kb: 65536,
        }
    }

    fn new_case(digit: char) -> NewTestCase {
        NewTestCase {
            input: digit.to_string().repeat(81),
            expected_output: digit.to_string().repeat(81),
            sample: digit == '1',
        }
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        init_db(&path).await.unwrap().close().await;
        let pool = init_db(&path).await.unwrap();
        let users = list_users(&pool).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "root");
    }

    #[tokio::test]
    async fn test_problem_and_cases_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;

        insert_problem(&problem(3), &[new_case('1'), new_case('2')], &pool)
            .await
            .unwrap();

        assert_eq!(fetch_problem(3, &pool).await.unwrap(), Some(problem(3)));
        assert_eq!(fetch_problem(4, &pool).await.unwrap(), None);

        let cases = fetch_test_cases(3, &pool).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases[0].id < cases[1].id);
        assert!(cases[0].sample);
        assert!(cases[1].input.starts_with('2'));
    }

    #[tokio::test]
    async fn test_seed_skips_existing_problem() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let input = dir.path().join("1.in");
        fs::write(&input, "5".repeat(81)).unwrap();

        let config = ProblemConfig {
            id: 1,
            name: "seeded".to_string(),
            time_limit_ms: 1000,
            memory_limit_kb: 1024,
            cases: vec![crate::config::ProblemCaseConfig {
                input_file: input.display().to_string(),
                answer_file: input.display().to_string(),
                sample: false,
            }],
        };
        seed_problems(std::slice::from_ref(&config), &pool).await.unwrap();
        seed_problems(&[config], &pool).await.unwrap();

        assert_eq!(fetch_test_cases(1, &pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submission_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        insert_problem(&problem(1), &[new_case('1')], &pool).await.unwrap();
        let user = create_user("alice", &pool).await.unwrap();
        assert!(find_user(user.id, &pool).await.unwrap());

        let id = create_submission(
            &SubmissionRequest {
                user_id: user.id,
                problem_id: 1,
                source_code: "int x;".to_string(),
            },
            &pool,
        )
        .await
        .unwrap();

        let pending = fetch_submission_record(id, &pool).await.unwrap().unwrap();
        assert_eq!(pending.submission.verdict, Verdict::Pending);
        assert_eq!(pending.submission.exec_time_ms, None);
        assert!(pending.results.is_empty());

        let case_id = fetch_test_cases(1, &pool).await.unwrap()[0].id;
        save_graded_submission(id, &Resolution::compile_error(Some(case_id)), &pool)
            .await
            .unwrap();

        let graded = fetch_submission_record(id, &pool).await.unwrap().unwrap();
        assert_eq!(graded.submission.verdict, Verdict::Ce);
        assert_eq!(graded.results.len(), 1);
        assert_eq!(graded.results[0].test_case_id, Some(case_id));
        assert_eq!(graded.results[0].status, Verdict::Ce);

        assert!(fetch_submission_record(id + 1, &pool).await.unwrap().is_none());
    }
}
