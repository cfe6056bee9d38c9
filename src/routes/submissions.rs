use actix_web::{HttpResponse, Responder, get, post, web};
use sqlx::sqlite::SqlitePool;

use super::{external_error, internal_error, not_found};
use crate::database as db;
use crate::judge::Judge;
use crate::models::SubmissionRequest;

/// Stores the submission as PENDING and grades it before responding
#[post("/submissions")]
pub async fn post_submission_handler(
    pool: web::Data<SqlitePool>,
    judge: web::Data<Judge>,
    body: web::Json<SubmissionRequest>,
) -> impl Responder {
    match db::find_user(body.user_id, &pool).await {
        Ok(true) => {}
        Ok(false) => return not_found(format!("User {} not found.", body.user_id)),
        Err(e) => {
            log::error!("Failed to check user existence: {e}");
            return external_error();
        }
    }

    match db::fetch_problem(body.problem_id, &pool).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(format!("Problem {} not found.", body.problem_id)),
        Err(e) => {
            log::error!("Failed to check problem existence: {e}");
            return external_error();
        }
    }

    let submission_id = match db::create_submission(&body, &pool).await {
        Ok(id) => {
            log::info!("Inserted submission {id} into database");
            id
        }
        Err(e) => {
            log::error!("Failed to insert submission into database: {e}");
            return external_error();
        }
    };

    match judge.grade(submission_id).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => {
            log::error!("Failed to grade submission {submission_id}: {e:#}");
            internal_error()
        }
    }
}

#[get("/submissions/{id}")]
pub async fn get_submission_handler(
    path: web::Path<i64>,
    pool: web::Data<SqlitePool>,
) -> impl Responder {
    let id = path.into_inner();
    match db::fetch_submission_record(id, &pool).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => not_found(format!("Submission {id} not found.")),
        Err(e) => {
            log::error!("Failed to fetch submission {id}: {e}");
            external_error()
        }
    }
}
