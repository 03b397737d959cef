/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # GitLab API Module
//!
//! Routes for the two GitLab task kinds. Everything configuration-shaped
//! carries the upstream host, since grants and projects are per-instance.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use buildrelay_models::models::gitlab::{GitLabCommitHook, GitLabMrHook, NewGitLabAuthorization};
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RelayError;
use crate::providers::gitlab::{self, client, commit, mr};
use crate::state::AppState;

/// Configures the GitLab routes.
///
/// - POST /gitlab/commit_to_build/webhook/:record_id
/// - POST /gitlab/mr_to_build/webhook/:record_id
/// - POST /gitlab/complete_build/:payload
/// - POST /gitlab/commit_to_build/configure[/:upstream]
/// - POST /gitlab/mr_to_build/configure[/:upstream]
/// - POST /gitlab/commit_to_build/edit/:record_id
/// - POST /gitlab/mr_to_build/edit/:record_id
/// - GET  /gitlab/callback/:upstream
///
/// Configure without an upstream falls back to the canonical instance.
pub fn configure_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/gitlab/commit_to_build/webhook/:record_id",
            post(commit_webhook),
        )
        .route("/gitlab/mr_to_build/webhook/:record_id", post(mr_webhook))
        .route("/gitlab/complete_build/:payload", post(complete_build))
        .route(
            "/gitlab/commit_to_build/configure/:upstream",
            post(commit_configure),
        )
        .route("/gitlab/mr_to_build/configure/:upstream", post(mr_configure))
        .route(
            "/gitlab/commit_to_build/configure",
            post(commit_configure_default),
        )
        .route("/gitlab/mr_to_build/configure", post(mr_configure_default))
        .route("/gitlab/commit_to_build/edit/:record_id", post(commit_edit))
        .route("/gitlab/mr_to_build/edit/:record_id", post(mr_edit))
        .route("/gitlab/callback/:upstream", get(oauth_callback))
}

fn event_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Gitlab-Event")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

async fn commit_webhook(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<commit::PushEvent>,
) -> Result<String, RelayError> {
    let hook = state
        .dal
        .gitlab()
        .get_commit_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    commit::handle_webhook(&state, &hook, event_header(&headers), payload).await
}

async fn mr_webhook(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<mr::MergeRequestEvent>,
) -> Result<String, RelayError> {
    let hook = state
        .dal
        .gitlab()
        .get_mr_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    mr::handle_webhook(&state, &hook, event_header(&headers), payload).await
}

async fn complete_build(
    State(state): State<AppState>,
    Path(payload): Path<String>,
    Json(body): Json<gitlab::CompletionBody>,
) -> Result<String, RelayError> {
    let token: gitlab::NotifyPayload = state.codec.decode(&payload).map_err(|e| {
        warn!("Rejected GitLab completion callback: {}", e);
        RelayError::InvalidToken
    })?;
    gitlab::complete_build(&state, token, body).await
}

/// Configure request: the relay user's name and the project to bind.
#[derive(Deserialize)]
struct ConfigureBody {
    username: String,
    repo_id: i64,
}

fn require_gitlab(state: &AppState) -> Result<(), RelayError> {
    if state.settings.gitlab.enabled {
        Ok(())
    } else {
        Err(RelayError::NotFound(
            "GitLab support is not configured".to_string(),
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

fn default_upstream(state: &AppState) -> Result<String, RelayError> {
    state.settings.gitlab.default_upstream().ok_or_else(|| {
        RelayError::NotFound("No canonical GitLab instance configured".to_string())
    })
}

async fn commit_configure(
    State(state): State<AppState>,
    Path(upstream): Path<String>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitLabCommitHook>, RelayError> {
    require_gitlab(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = commit::configure(&state, user_id, &upstream, body.repo_id).await?;
    Ok(Json(record))
}

async fn commit_configure_default(
    State(state): State<AppState>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitLabCommitHook>, RelayError> {
    require_gitlab(&state)?;
    let upstream = default_upstream(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = commit::configure(&state, user_id, &upstream, body.repo_id).await?;
    Ok(Json(record))
}

async fn mr_configure(
    State(state): State<AppState>,
    Path(upstream): Path<String>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitLabMrHook>, RelayError> {
    require_gitlab(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = mr::configure(&state, user_id, &upstream, body.repo_id).await?;
    Ok(Json(record))
}

async fn mr_configure_default(
    State(state): State<AppState>,
    Json(body): Json<ConfigureBody>,
) -> Result<Json<GitLabMrHook>, RelayError> {
    require_gitlab(&state)?;
    let upstream = default_upstream(&state)?;
    let user_id = lookup_user(&state, &body.username)?;
    let record = mr::configure(&state, user_id, &upstream, body.repo_id).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct EditBody {
    #[serde(default)]
    secrets: bool,
}

async fn commit_edit(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<EditBody>,
) -> Result<Json<GitLabCommitHook>, RelayError> {
    let hook = state
        .dal
        .gitlab()
        .get_commit_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    Ok(Json(commit::edit(&state, &hook, body.secrets)?))
}

async fn mr_edit(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<EditBody>,
) -> Result<Json<GitLabMrHook>, RelayError> {
    let hook = state
        .dal
        .gitlab()
        .get_mr_hook(record_id)?
        .ok_or_else(|| RelayError::NotFound(format!("Unknown hook {}", record_id)))?;
    Ok(Json(mr::edit(&state, &hook, body.secrets)?))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: String,
    username: String,
}

/// OAuth callback for one upstream instance: exchanges the code with that
/// instance's configured client credentials and stores the grant.
async fn oauth_callback(
    State(state): State<AppState>,
    Path(upstream): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, RelayError> {
    require_gitlab(&state)?;
    let user_id = lookup_user(&state, &query.username)?;
    let instance = state.settings.gitlab.instance(&upstream).ok_or_else(|| {
        RelayError::NotFound(format!("Unknown GitLab instance {}", upstream))
    })?;

    let redirect_uri = format!("{}/gitlab/callback/{}", state.settings.server.origin, upstream);
    let token = client::exchange_code(
        &state.http,
        &upstream,
        &instance.client_id,
        &instance.client_secret,
        &query.code,
        &redirect_uri,
    )
    .await?;
    let new_auth = NewGitLabAuthorization {
        user_id,
        upstream: upstream.clone(),
        oauth_token: token.access_token,
    };
    state.dal.gitlab().upsert_authorization(&new_auth)?;
    info!("Stored GitLab authorization for {} on {}", query.username, upstream);
    Ok(format!("GitLab authorization saved for {}", upstream))
}
