mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use chrono::Local;
use common::{at, harness, Harness};
use secrecy::SecretString;
use serde_json::{Value, json};
use site_attendance::api::AppState;
use site_attendance::model::identity::IdentityEvent;
use site_attendance::model::sync::EVENT_SYNC_FAILED;
use site_attendance::routes;
use site_attendance::sync::{self, SyncEngine};
use tokio::sync::{mpsc, watch};

fn state(h: &Harness, queue: usize, token: Option<&str>) -> (AppState, mpsc::Receiver<IdentityEvent>) {
    let engine = Arc::new(SyncEngine::new(
        h.buffer.clone(),
        h.central.clone(),
        Vec::new(),
        3,
    ));
    let (sync, _task) = sync::worker::spawn(
        engine.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    let (events, events_rx) = mpsc::channel(queue);
    let (_, last_event) = watch::channel(None);

    let state = AppState {
        central: h.central.clone(),
        buffer: h.buffer.clone(),
        engine,
        sync,
        events,
        last_event,
        device_name: "Gate-North".to_string(),
        project_id: Some(4),
        api_token: token.map(|t| SecretString::from(t.to_string())),
    };
    (state, events_rx)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn recognition_is_queued_for_the_kiosk() {
    let h = harness().await;
    let (state, mut rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/recognition")
        .set_json(json!({"worker_id": 7, "confidence": 0.8}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.worker_id, 7);
    assert!((event.confidence - 0.8).abs() < f32::EPSILON);
}

#[actix_web::test]
async fn full_queue_is_reported_as_unavailable() {
    let h = harness().await;
    let (state, _rx) = state(&h, 1, None);
    let app = app!(state);

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/recognition")
            .set_json(json!({"worker_id": 7}))
            .to_request();
        statuses.push(test::call_service(&app, req).await.status());
    }
    assert_eq!(statuses, vec![StatusCode::ACCEPTED, StatusCode::SERVICE_UNAVAILABLE]);
}

#[actix_web::test]
async fn stopped_kiosk_is_reported_as_unavailable() {
    let h = harness().await;
    let (state, rx) = state(&h, 4, None);
    drop(rx);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/recognition")
        .set_json(json!({"worker_id": 7}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn configured_token_is_required() {
    let h = harness().await;
    let (state, _rx) = state(&h, 4, Some("s3cret"));
    let app = app!(state);

    let missing = test::TestRequest::get().uri("/api/status").to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::UNAUTHORIZED);

    let wrong = test::TestRequest::get()
        .uri("/api/status")
        .insert_header(("Authorization", "Bearer nope"))
        .to_request();
    assert_eq!(test::call_service(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);

    let prefix = test::TestRequest::get()
        .uri("/api/status")
        .insert_header(("Authorization", "Bearer s3cre"))
        .to_request();
    assert_eq!(test::call_service(&app, prefix).await.status(), StatusCode::UNAUTHORIZED);

    let not_bearer = test::TestRequest::get()
        .uri("/api/status")
        .insert_header(("Authorization", "s3cret"))
        .to_request();
    assert_eq!(test::call_service(&app, not_bearer).await.status(), StatusCode::UNAUTHORIZED);

    let good = test::TestRequest::get()
        .uri("/api/status")
        .insert_header(("Authorization", "Bearer s3cret"))
        .to_request();
    assert_eq!(test::call_service(&app, good).await.status(), StatusCode::OK);

    // the OpenAPI document stays public
    let docs = test::TestRequest::get().uri("/api-doc/openapi.json").to_request();
    assert_eq!(test::call_service(&app, docs).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn status_reports_buffered_work() {
    let h = harness().await;
    h.go_offline().await;
    h.machine.process(7, at(8, 0, 0)).await;
    h.machine.process(9, at(8, 0, 0)).await;
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["central_online"], json!(false));
    assert_eq!(body["pending"], json!(2));
    assert_eq!(body["permanently_failed"], json!([]));
    assert_eq!(body["device_name"], json!("Gate-North"));
    assert_eq!(body["project_id"], json!(4));
    assert_eq!(body["last_event"], Value::Null);
}

#[actix_web::test]
async fn summary_counts_todays_workers() {
    let h = harness().await;
    let today = Local::now().date_naive();
    h.machine.process(7, today.and_hms_opt(7, 0, 0).unwrap()).await;
    h.machine.process(7, today.and_hms_opt(15, 0, 0).unwrap()).await;
    h.machine.process(9, today.and_hms_opt(7, 5, 0).unwrap()).await;
    h.store.add_worker(Some(4), common::worker(7, "Ana"));
    h.store.add_worker(Some(4), common::worker(9, "Ben"));
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/summary").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["present"], json!(2));
    assert_eq!(body["completed"], json!(1));
    assert_eq!(body["date"], json!(today.to_string()));
}

#[actix_web::test]
async fn summary_needs_the_central_store() {
    let h = harness().await;
    h.go_offline().await;
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/summary").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn manual_sync_is_accepted() {
    let h = harness().await;
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/sync").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[actix_web::test]
async fn manual_sync_after_stop_is_refused() {
    let h = harness().await;
    let (state, _rx) = state(&h, 4, None);
    state.sync.stop();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/sync").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn sync_failures_are_listed_newest_first() {
    let h = harness().await;
    h.buffer
        .record_event(EVENT_SYNC_FAILED, "buffer_id=1 worker_id=7")
        .await
        .unwrap();
    h.buffer
        .record_event(EVENT_SYNC_FAILED, "buffer_id=2 worker_id=9")
        .await
        .unwrap();
    h.buffer.record_event("startup", "device started").await.unwrap();
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/sync/failures?limit=10")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["description"], json!("buffer_id=2 worker_id=9"));
    assert_eq!(events[0]["event_type"], json!("sync_failed"));
}

#[actix_web::test]
async fn openapi_document_lists_the_operator_paths() {
    let h = harness().await;
    let (state, _rx) = state(&h, 4, None);
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api-doc/openapi.json").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    for path in ["/api/recognition", "/api/status", "/api/summary", "/api/sync", "/api/sync/failures"] {
        assert!(body["paths"].get(path).is_some(), "missing {path}");
    }
}
