//! Billing backend for non-submetered rental units.
//!
//! Landlords review each unit's monthly bill, adjust it with additional
//! charges and discounts, save it and approve it for the tenant.

pub mod billing;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::cache::AppCache;
use crate::config::AppConfig;
use crate::middleware::build_cors_layer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig) -> Self {
        Self {
            db,
            cache: AppCache::from_config(&config),
            config: Arc::new(config),
        }
    }
}

/// Build the application with its middleware stack
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
