pub mod navigation;

use actix_web::web;
use std::sync::Arc;
use crate::engine::EngineRegistry;

pub struct AppState {
    pub registry: Arc<EngineRegistry>,
    pub jwt_secret: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/v1/navigation")
            .route(web::get().to(navigation::get_navigation)),
    )
    .service(
        web::resource("/v1/navigation/status")
            .route(web::get().to(navigation::get_status)),
    )
    .service(
        web::resource("/v1/navigation/drag/start")
            .route(web::post().to(navigation::drag_start)),
    )
    .service(
        web::resource("/v1/navigation/drag/over")
            .route(web::post().to(navigation::drag_over)),
    )
    .service(
        web::resource("/v1/navigation/drag/cancel")
            .route(web::post().to(navigation::drag_cancel)),
    )
    .service(
        web::resource("/v1/navigation/drag/end")
            .route(web::post().to(navigation::drag_end)),
    )
    .service(
        web::resource("/v1/navigation/move")
            .route(web::post().to(navigation::move_to_section)),
    )
    .service(
        web::resource("/v1/navigation/reorder")
            .route(web::post().to(navigation::reorder_section)),
    )
    .service(
        web::resource("/v1/navigation/visibility")
            .route(web::post().to(navigation::toggle_visibility)),
    )
    .service(
        web::resource("/v1/navigation/rename")
            .route(web::post().to(navigation::rename_department)),
    )
    .service(
        web::resource("/v1/navigation/reset")
            .route(web::post().to(navigation::reset)),
    )
    .service(
        web::resource("/v1/navigation/undo")
            .route(web::post().to(navigation::undo)),
    )
    .service(
        web::resource("/v1/navigation/retry")
            .route(web::post().to(navigation::retry)),
    );
}
