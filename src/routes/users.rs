use actix_web::{HttpResponse, Responder, get, post, web};
use serde::Deserialize;
use sqlx::sqlite::SqlitePool;

use super::{external_error, invalid_argument};
use crate::database as db;

#[derive(Deserialize, Debug)]
pub struct CreateUserRequest {
    pub name: String,
}

#[post("/users")]
pub async fn post_user_handler(
    pool: web::Data<SqlitePool>,
    body: web::Json<CreateUserRequest>,
) -> impl Responder {
    let name = body.name.trim();
    if name.is_empty() {
        return invalid_argument("User name must not be empty".to_string());
    }

    match db::create_user(name, &pool).await {
        Ok(user) => {
            log::info!("Created user {} ({})", user.id, user.name);
            HttpResponse::Ok().json(user)
        }
        Err(e)
            if e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation()) =>
        {
            invalid_argument(format!("User name '{name}' already exists."))
        }
        Err(e) => {
            log::error!("Failed to create user: {e}");
            external_error()
        }
    }
}

#[get("/users")]
pub async fn get_users_handler(pool: web::Data<SqlitePool>) -> impl Responder {
    match db::list_users(&pool).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => {
            log::error!("Failed to fetch users: {e}");
            external_error()
        }
    }
}
