//! Bookshelf book lending server
//!
//! A REST JSON API where authors publish books, owners stock them in
//! libraries at a per-borrow charge, and readers borrow and return copies.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod i18n;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use routes::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
