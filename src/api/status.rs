use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::kiosk::LastEvent;
use crate::model::attendance::BufferId;
use crate::sync::engine::LAST_SYNC_KEY;

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub central_online: bool,
    #[schema(example = 3)]
    pub pending: i64,
    /// Buffer ids excluded from automatic sync.
    pub permanently_failed: Vec<BufferId>,
    #[schema(example = "2026-03-02 08:35:00")]
    pub last_sync_at: Option<String>,
    #[schema(example = "TrackSite-Device")]
    pub device_name: String,
    pub project_id: Option<i64>,
    pub last_event: Option<LastEvent>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = 42)]
    pub present: i64,
    #[schema(example = 17)]
    pub completed: i64,
}

/// Device status
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Current device status", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Local buffer unreadable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Status"
)]
pub async fn get_status(state: web::Data<AppState>) -> impl Responder {
    let pending = match state.buffer.pending_count().await {
        Ok(count) => count,
        Err(e) => {
            error!(error = %e, "Could not count pending buffer rows");
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "local buffer unavailable" }));
        }
    };
    let last_sync_at = state.buffer.device_config(LAST_SYNC_KEY).await.unwrap_or_else(|e| {
        warn!(error = %e, "Could not read last sync time");
        None
    });

    HttpResponse::Ok().json(StatusResponse {
        central_online: state.central.is_online(),
        pending,
        permanently_failed: state.engine.permanently_failed(),
        last_sync_at,
        device_name: state.device_name.clone(),
        project_id: state.project_id,
        last_event: state.last_event.borrow().clone(),
    })
}

/// Today's attendance summary
#[utoipa::path(
    get,
    path = "/api/summary",
    responses(
        (status = 200, description = "Present and completed counts for today", body = SummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Central store unreachable", body = Object, example = json!({
            "message": "central store unreachable"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Status"
)]
pub async fn get_summary(state: web::Data<AppState>) -> impl Responder {
    let today = Local::now().date_naive();

    if !state.central.is_online() && !state.central.probe().await {
        return HttpResponse::ServiceUnavailable()
            .json(json!({ "message": "central store unreachable" }));
    }

    match state.central.daily_summary(today, state.project_id).await {
        Ok(summary) => HttpResponse::Ok().json(SummaryResponse {
            date: today,
            present: summary.present,
            completed: summary.completed,
        }),
        Err(e) if e.is_connectivity() => HttpResponse::ServiceUnavailable()
            .json(json!({ "message": "central store unreachable" })),
        Err(e) => {
            error!(error = %e, "Daily summary failed");
            HttpResponse::InternalServerError().json(json!({ "message": "summary unavailable" }))
        }
    }
}
