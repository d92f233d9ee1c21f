//! Book Lending Server
//!
//! REST JSON API for a book inventory with per-user lending rules and
//! per-client rate limiting.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub rate_limiter: rate_limit::RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> Self {
        let services = services::Services::new(repository, &config);
        let rate_limiter = rate_limit::RateLimiter::from_config(&config.rate_limit);

        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            rate_limiter,
        }
    }
}
