//! SLA Sentinel backend
//!
//! Recurring deadline monitoring for long-lived business documents: a
//! fixed-delay job scheduler coordinated across instances through Redis locks,
//! an SLA evaluator covering seven document kinds, and a notification
//! dispatcher that stores alerts and pushes them to connected clients.

use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod notifications;
pub mod sla;
pub mod websocket;

pub use error::{StoreError, StoreResult};


pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub ws_manager: Arc<websocket::WsManager>,
    pub directory: Arc<dyn notifications::RoleDirectory>,
}
