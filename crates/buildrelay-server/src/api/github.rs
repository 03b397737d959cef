/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # GitHub API Module
//!
//! Routes for the two GitHub task kinds: webhook deliveries, completion
//! callbacks, hook configuration, and the OAuth grant callback.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use buildrelay_models::models::github::{GitHubCommitHook, GitHubPrHook, NewGitHubAuthorization};
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RelayError;
use crate::providers::github::{self, client, commit, pr};
use crate::state::AppState;

/// Configures the GitHub routes.
///
/// - POST /github/commit_to_build/webhook/:record_id
/// - POST /github/pr_to_build/webhook/:record_id
/// - POST /github/complete_build/:payload
/// - POST /github/commit_to_build/configure
/// - POST /github/pr_to_build/configure
/// - POST /github/commit_to_build/edit/:record_id
/// - POST /github/pr_to_build/edit/:record_id
/// - GET  /github/callback
pub fn configure_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/github/commit_to_build/webhook/:record_id",
            post(commit_webhook),
        )
        .route("/github/pr_to_build/webhook/:record_id", post(pr_webhook))
        .route("/github/complete_build/:payload", post(complete_build))
        .route("/github/commit_to_build/configure", post(commit_configure))
        .route("/github/pr_to_build/configure", post(pr_configure))
        .route("/github/commit_to_build/edit/:record_id", post(commit_edit))
        .route("/github/pr_to_build/edit/:record_id", post(pr_edit))
        .route("/github/callback", get(oauth_callback))
}

fn delivery_headers(headers: &HeaderMap) -> commit::DeliveryHeaders {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    commit::DeliveryHeaders {
        delivery: header("X-GitHub-Delivery"),
        event: header("X-GitHub-Event"),
    }
}

async fn commit_webhook(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<commit::PushEvent>,
) -> Result<String, RelayError> {
    let hook = state
        .dal
        .github()
        .get_commit_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    commit::handle_webhook(&state, &hook, &delivery_headers(&headers), payload).await
}

async fn pr_webhook(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<pr::PullRequestEvent>,
) -> Result<String, RelayError> {
    let hook = state
        .dal
        .github()
        .get_pr_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    pr::handle_webhook(&state, &hook, &delivery_headers(&headers), payload).await
}

async fn complete_build(
    State(state): State<AppState>,
    Path(payload): Path<String>,
    Json(body): Json<github::CompletionBody>,
) -> Result<String, RelayError> {
    let token: github::NotifyPayload = state.codec.decode(&payload).map_err(|e| {
        warn!("Rejected GitHub completion callback: {}", e);
        RelayError::InvalidToken
    })?;
    github::complete_build(&state, token, body).await
}

/// Configure request: the relay user's name and the repository to bind.
#[derive(Deserialize)]
struct ConfigureBody {
    username: String,
    repo: String,
}

fn require_github(state: &AppState) -> Result<(), RelayError> {
    if state.settings.github.enabled() {
        Ok(())
    } else {
        Err(RelayError::NotFound(
            "GitHub support is not configured".to_string(),
        ))
    }
}

fn lookup_user(state: &AppState, username: &str) -> Result<Uuid, RelayError> {
    Ok(state
        .dal
        .users()
        .get_by_username(username)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown user {}", username)))?
        .id)
}

async fn commit_configure(
    State(state): State<AppState>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitHubCommitHook>, RelayError> {
    require_github(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = commit::configure(&state, user_id, &body.repo).await?;
    Ok(Json(record))
}

async fn pr_configure(
    State(state): State<AppState>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitHubPrHook>, RelayError> {
    require_github(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = pr::configure(&state, user_id, &body.repo).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct CommitEditBody {
    #[serde(default)]
    secrets: bool,
}

async fn commit_edit(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<CommitEditBody>,
) -> Result<Json<GitHubCommitHook>, RelayError> {
    let hook = state
        .dal
        .github()
        .get_commit_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    Ok(Json(commit::edit(&state, &hook, body.secrets)?))
}

#[derive(Deserialize)]
struct PrEditBody {
    #[serde(default)]
    automerge: bool,
    #[serde(default)]
    secrets: bool,
}

async fn pr_edit(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<PrEditBody>,
) -> Result<Json<GitHubPrHook>, RelayError> {
    let hook = state
        .dal
        .github()
        .get_pr_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    Ok(Json(pr::edit(&state, &hook, body.automerge, body.secrets).await?))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: String,
    username: String,
}

/// OAuth callback: exchanges the code and stores the grant. The login
/// handshake itself happens upstream; the relay user arrives as a query
/// parameter appended by that layer.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, RelayError> {
    require_github(&state)?;
    let user_id = lookup_user(&state, &query.username)?;
    let github = &state.settings.github;
    let client_id = github.client_id.as_deref().unwrap_or_default();
    let client_secret = github.client_secret.as_deref().unwrap_or_default();

    let token = client::exchange_code(&state.http, client_id, client_secret, &query.code).await?;
    let new_auth = NewGitHubAuthorization {
        user_id,
        scopes: token.scope,
        oauth_token: token.access_token,
    };
    state.dal.github().upsert_authorization(&new_auth)?;
    info!("Stored GitHub authorization for {}", query.username);
    Ok("GitHub authorization saved".to_string())
}
