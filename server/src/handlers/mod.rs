use crate::connection::ws_index;
use crate::handlers::sessions::configure_session_handlers;
use actix_web::{web, HttpResponse};
use serde_json::json;

mod sessions;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)))
        .service(web::resource("/health").route(web::get().to(health)));

    configure_session_handlers(cfg);
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
