//! HTTP API module.
//!
//! This module provides the HTTP server, its JSON bodies and the broadcast
//! logger shared with the ETL pipeline.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
