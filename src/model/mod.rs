pub mod attendance;
pub mod identity;
pub mod sync;
