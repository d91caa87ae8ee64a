pub mod engine;
pub mod http;
pub mod retry;
pub mod transport;
pub mod worker;

pub use engine::{ReferenceData, SyncEngine};
pub use http::ApiTransport;
pub use transport::{DirectTransport, SyncTransport};
pub use worker::SyncHandle;
