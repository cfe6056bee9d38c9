use actix_web::{HttpResponse, Responder, post, web};
use serde::Deserialize;

use crate::grid::compare_grids;

#[derive(Deserialize, Debug)]
pub struct CompareRequest {
    pub expected: String,
    pub actual: String,
}

#[post("/grids/compare")]
pub async fn compare_grids_handler(body: web::Json<CompareRequest>) -> impl Responder {
    HttpResponse::Ok().json(compare_grids(&body.expected, &body.actual))
}
