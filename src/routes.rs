use actix_web::{HttpResponse, middleware::from_fn, web};
use utoipa::OpenApi;

use crate::{
    api::{recognition, status, sync},
    auth::middleware::auth_middleware,
    docs::ApiDoc,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Public routes
    cfg.service(web::resource("/api-doc/openapi.json").route(web::get().to(openapi_json)));

    // Protected routes
    cfg.service(
        web::scope("/api")
            .wrap(from_fn(auth_middleware))
            // /api/recognition
            .service(
                web::resource("/recognition")
                    .route(web::post().to(recognition::report_recognition)),
            )
            // /api/status
            .service(web::resource("/status").route(web::get().to(status::get_status)))
            // /api/summary
            .service(web::resource("/summary").route(web::get().to(status::get_summary)))
            .service(
                web::scope("/sync")
                    // /api/sync
                    .service(web::resource("").route(web::post().to(sync::trigger_sync)))
                    // /api/sync/failures
                    .service(
                        web::resource("/failures").route(web::get().to(sync::list_failures)),
                    ),
            ),
    );
}

async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
