pub mod recognition;
pub mod status;
pub mod sync;

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::{mpsc, watch};

use crate::kiosk::LastEvent;
use crate::model::identity::IdentityEvent;
use crate::store::{CentralHandle, LocalBuffer};
use crate::sync::{SyncEngine, SyncHandle};

/// Shared handles for the operator API.
#[derive(Clone)]
pub struct AppState {
    pub central: Arc<CentralHandle>,
    pub buffer: LocalBuffer,
    pub engine: Arc<SyncEngine>,
    pub sync: SyncHandle,
    pub events: mpsc::Sender<IdentityEvent>,
    pub last_event: watch::Receiver<Option<LastEvent>>,
    pub device_name: String,
    pub project_id: Option<i64>,
    pub api_token: Option<SecretString>,
}
