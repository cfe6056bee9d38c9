use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use sudoku_oj::config::{CliArgs, Config};
use sudoku_oj::database as db;
use sudoku_oj::judge::Judge;
use sudoku_oj::queue::RankingQueue;
use sudoku_oj::sandbox::create_sandbox_runner;
use sudoku_oj::web_server::build_server;
use sudoku_oj::worker::ranking_worker;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let limits = cli.limits();

    let Config {
        server: server_config,
        judge: judge_config,
        problems: problem_config,
    } = cli.to_config().expect("Failed to load configuration");

    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => db::get_db_path().expect("Failed to resolve database path"),
    };

    if cli.flush_data {
        db::remove_db(&db_path);
    }

    let db_pool = db::init_db(&db_path)
        .await
        .expect("Failed to initialize database");

    db::seed_problems(&problem_config, &db_pool)
        .await
        .expect("Failed to seed problems");

    log::info!(
        "Limits: compile {} ms, total run {} ms (+{} ms grace)",
        limits.compile_timeout_ms,
        limits.total_time_limit_ms,
        limits.run_grace_ms
    );

    let runner = create_sandbox_runner(&judge_config.accounting_command);
    let ranking_queue = Arc::new(RankingQueue::new());
    let judge = Arc::new(Judge::new(
        db_pool.clone(),
        runner,
        ranking_queue.clone(),
        judge_config,
        limits,
    ));
    let shutdown_token = CancellationToken::new();

    // ======= PREPARATION END, EXECUTION START =======

    let mut ranking_task = tokio::spawn(ranking_worker(
        db_pool.clone(),
        ranking_queue.clone(),
        shutdown_token.clone(),
    ));

    // Ranks may be stale if the previous run stopped mid-way
    ranking_queue.request(None).await;

    let server = build_server(server_config, db_pool, judge, ranking_queue)
        .expect("Failed to build server");

    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    // ===== EXECUTION END, WAITING FOR SHUTDOWN ======

    let mut worker_finished = false;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
        res_worker = &mut ranking_task => {
            log::error!("Ranking worker terminated unexpectedly: {:?}", res_worker);
            worker_finished = true;
        }
    }

    // 1. Shutdown actix-web server gracefully
    server_handle.stop(true).await;

    // 2. Broadcast shutdown signal to the ranking worker
    shutdown_token.cancel();

    // 3. Wait until it terminates
    if !worker_finished {
        log::info!("Shutdown signal sent to ranking worker, waiting for it to finish...");
        match ranking_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Ranking worker finished with error: {e:#}"),
            Err(e) if e.is_panic() => log::error!("Ranking worker panicked: {:?}", e),
            Err(e) => log::error!("Ranking worker handle finished with error: {:?}", e),
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}
