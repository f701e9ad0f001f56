//! Liveness endpoint for deployment probes

use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

pub struct HealthService;

impl HealthService {
    pub async fn liveness() -> impl Responder {
        HttpResponse::Ok().json(json!({ "status": "ok" }))
    }
}

pub fn health_routes() -> actix_web::Scope {
    web::scope("/healthz").route("", web::get().to(HealthService::liveness))
}
