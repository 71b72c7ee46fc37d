//! REST endpoint handlers organized by resource.

pub mod alerts;
pub mod scans;
pub mod stores;
pub mod system;
pub mod webhooks;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(stores::routes())
        .merge(scans::routes())
        .merge(webhooks::routes())
        .merge(alerts::routes())
}
