use crate::api::recognition::RecognitionRequest;
use crate::api::status::{StatusResponse, SummaryResponse};
use crate::api::sync::FailureQuery;
use crate::kiosk::LastEvent;
use crate::model::sync::{SyncReport, SystemEvent};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Site Attendance Device API",
        version = "1.0.0",
        description = r#"
## Site Attendance Device

Operator and ingress API of a construction-site attendance kiosk.

### Key Features
- **Recognition ingress**
  - The identity source reports recognized workers; the kiosk debounces them into time-in / time-out events
- **Status**
  - Central store reachability, buffered records waiting for sync, last outcome
- **Sync**
  - Manual sync trigger and the list of records that exhausted their retries

### Security
When the device has `API_TOKEN` configured every `/api` endpoint requires
`Authorization: Bearer <token>`.
"#,
    ),
    paths(
        crate::api::recognition::report_recognition,
        crate::api::status::get_status,
        crate::api::status::get_summary,
        crate::api::sync::trigger_sync,
        crate::api::sync::list_failures
    ),
    components(
        schemas(
            RecognitionRequest,
            StatusResponse,
            SummaryResponse,
            LastEvent,
            FailureQuery,
            SyncReport,
            SystemEvent
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Recognition", description = "Identity source ingress"),
        (name = "Status", description = "Device status and daily summary"),
        (name = "Sync", description = "Local buffer synchronization"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
