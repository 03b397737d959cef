/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # API Routes Aggregator Module
//!
//! Merges the per-provider routers and adds the health check endpoints.
//! Webhook and completion endpoints are server-to-server: the unguessable
//! hook record id and the encrypted notification token are the
//! authenticators, no session machinery applies.

pub mod github;
pub mod gitlab;

use axum::{response::IntoResponse, routing::get, Router};
use hyper::StatusCode;

use crate::state::AppState;

/// Configures and returns the main application router.
pub fn configure_api_routes() -> Router<AppState> {
    Router::new()
        .merge(github::configure_routes())
        .merge(gitlab::configure_routes())
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

/// Health check endpoint handler.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready check endpoint handler.
async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}
