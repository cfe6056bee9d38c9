use actix_web::{HttpResponse, Responder, get, post, web};
use sqlx::sqlite::SqlitePool;

use super::{external_error, internal_error};
use crate::database as db;
use crate::queue::RankingQueue;

#[get("/ranklist")]
pub async fn get_ranklist_handler(pool: web::Data<SqlitePool>) -> impl Responder {
    match db::fetch_ranklist(&pool).await {
        Ok(ranklist) => HttpResponse::Ok().json(ranklist),
        Err(e) => {
            log::error!("Failed to get ranklist: {e}");
            external_error()
        }
    }
}

/// Runs a full ranking pass and waits for it
#[post("/ranklist/recompute")]
pub async fn recompute_ranklist_handler(queue: web::Data<RankingQueue>) -> impl Responder {
    match queue.request_blocking(None).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => {
            log::error!("Ranking recomputation request failed: {e:#}");
            internal_error()
        }
    }
}
