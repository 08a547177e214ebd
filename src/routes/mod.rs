//! Application router

use axum::{routing::get, Router};

use crate::billing;
use crate::AppState;

pub mod health;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(billing::router())
}
