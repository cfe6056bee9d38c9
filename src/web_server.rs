use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::ServerConfig;
use crate::judge::Judge;
use crate::queue::RankingQueue;
use crate::routes::{
    compare_grids_handler, get_ranklist_handler, get_submission_handler, get_users_handler,
    json_error_handler, post_submission_handler, post_user_handler, recompute_ranklist_handler,
};

/// Registers every route; shared by the server and the HTTP tests
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(post_user_handler)
        .service(get_users_handler)
        .service(post_submission_handler)
        .service(get_submission_handler)
        .service(recompute_ranklist_handler)
        .service(get_ranklist_handler)
        .service(compare_grids_handler);
}

pub fn build_server(
    server_config: ServerConfig,
    db_pool: SqlitePool,
    judge: Arc<Judge>,
    ranking_queue: Arc<RankingQueue>,
) -> std::io::Result<Server> {
    let db_pool = web::Data::new(db_pool);
    let judge = web::Data::from(judge);
    let ranking_queue = web::Data::from(ranking_queue);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(judge.clone())
            .app_data(ranking_queue.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}
