pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod docs;
pub mod error;
pub mod gate;
pub mod kiosk;
pub mod model;
pub mod routes;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
