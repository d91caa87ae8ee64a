use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::AppState;
use crate::model::sync::{EVENT_SYNC_FAILED, SystemEvent};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FailureQuery {
    /// Most recent first, default 50, at most 500.
    pub limit: Option<i64>,
}

/// Run a sync pass now
#[utoipa::path(
    post,
    path = "/api/sync",
    responses(
        (status = 202, description = "Sync task woken", body = Object, example = json!({
            "message": "sync scheduled"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Sync task stopped")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn trigger_sync(state: web::Data<AppState>) -> impl Responder {
    if !state.sync.is_running() {
        return HttpResponse::ServiceUnavailable().json(json!({ "message": "sync task stopped" }));
    }
    info!("Manual sync requested");
    state.sync.wake();
    HttpResponse::Accepted().json(json!({ "message": "sync scheduled" }))
}

/// Permanent sync failures
#[utoipa::path(
    get,
    path = "/api/sync/failures",
    params(FailureQuery),
    responses(
        (status = 200, description = "Records that exhausted their retries", body = [SystemEvent]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Local buffer unreadable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn list_failures(
    state: web::Data<AppState>,
    query: web::Query<FailureQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    match state.buffer.events(EVENT_SYNC_FAILED, limit).await {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => {
            error!(error = %e, "Could not read sync failures");
            HttpResponse::InternalServerError().json(json!({ "message": "local buffer unavailable" }))
        }
    }
}
