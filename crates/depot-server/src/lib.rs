//! HTTP surface of the depot file service.

pub mod error;
pub mod server;

pub use error::{ApiError, status_for};
pub use server::{DepotServer, shutdown_signal};
