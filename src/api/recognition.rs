use std::time::Instant;

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::model::attendance::WorkerId;
use crate::model::identity::IdentityEvent;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecognitionRequest {
    #[schema(example = 7)]
    pub worker_id: WorkerId,
    /// Match confidence in [0, 1]; treated as 1.0 when omitted.
    #[schema(example = 0.82)]
    pub confidence: Option<f32>,
}

/// Report a recognized worker
#[utoipa::path(
    post,
    path = "/api/recognition",
    request_body = RecognitionRequest,
    responses(
        (status = 202, description = "Recognition queued", body = Object, example = json!({
            "message": "queued"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Foreground queue full or stopped", body = Object, example = json!({
            "message": "recognition queue is full"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Recognition"
)]
pub async fn report_recognition(
    state: web::Data<AppState>,
    payload: web::Json<RecognitionRequest>,
) -> impl Responder {
    let event = IdentityEvent {
        worker_id: payload.worker_id,
        confidence: payload.confidence.unwrap_or(1.0),
        at: Instant::now(),
    };

    match state.events.try_send(event) {
        Ok(()) => HttpResponse::Accepted().json(json!({ "message": "queued" })),
        Err(TrySendError::Full(_)) => {
            warn!(worker_id = payload.worker_id, "Recognition dropped, queue full");
            HttpResponse::ServiceUnavailable().json(json!({ "message": "recognition queue is full" }))
        }
        Err(TrySendError::Closed(_)) => {
            HttpResponse::ServiceUnavailable().json(json!({ "message": "kiosk is not running" }))
        }
    }
}
