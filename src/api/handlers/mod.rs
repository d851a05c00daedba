//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod premium;
pub mod system;
pub mod views;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes.
pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(views::routes())
        .merge(premium::routes(upload_max_bytes))
        .merge(admin::routes())
}
