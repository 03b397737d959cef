/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitHub push events into build jobs.

use std::collections::BTreeMap;

use buildrelay_models::models::github::{GitHubCommitHook, NewGitHubCommitHook};
use buildrelay_models::models::tasks::NewTask;
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RelayError;
use crate::providers::github::{authenticate, submit_github_build, SubmitParams};
use crate::providers::TaskKind;
use crate::state::AppState;

/// The push webhook fields the relay consumes.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub head_commit: Option<HeadCommit>,
    pub repository: Option<EventRepo>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeadCommit {
    pub id: Option<String>,
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventRepo {
    pub full_name: String,
}

/// Delivery metadata GitHub sends alongside the payload.
#[derive(Debug, Default)]
pub struct DeliveryHeaders {
    pub delivery: Option<String>,
    pub event: Option<String>,
}

/// Handles one push delivery for a commit hook.
pub async fn handle_webhook(
    state: &AppState,
    hook: &GitHubCommitHook,
    headers: &DeliveryHeaders,
    payload: PushEvent,
) -> Result<String, RelayError> {
    let (commit, repository, git_ref) = match (payload.head_commit, payload.repository, payload.git_ref)
    {
        (Some(c), Some(r), Some(g)) => (c, r, g),
        _ => {
            return Err(RelayError::Validation(
                "Got request, but it has no commits".to_string(),
            ))
        }
    };
    let sha = match commit.sha.or(commit.id) {
        Some(sha) => sha,
        None => {
            return Err(RelayError::Validation(
                "Got request, but it has no commits".to_string(),
            ))
        }
    };

    let mut env = BTreeMap::new();
    if let Some(delivery) = &headers.delivery {
        env.insert("GITHUB_DELIVERY".to_string(), delivery.clone());
    }
    if let Some(event) = &headers.event {
        env.insert("GITHUB_EVENT".to_string(), event.clone());
    }
    env.insert("GITHUB_REF".to_string(), git_ref);
    env.insert("GITHUB_REPO".to_string(), repository.full_name.clone());

    submit_github_build(
        state,
        SubmitParams {
            user_id: hook.user_id,
            head_full_name: repository.full_name.clone(),
            base_full_name: repository.full_name,
            sha,
            secrets: hook.secrets,
            env,
            pr: None,
            automerge: None,
        },
    )
    .await
}

/// Creates the task, the hook record, and the provider webhook for one
/// repository. The record starts with the `-1` webhook sentinel and gets the
/// real id once GitHub confirms registration; a failure after the rows are
/// written leaves them for manual cleanup.
pub async fn configure(
    state: &AppState,
    user_id: Uuid,
    repo_full_name: &str,
) -> Result<GitHubCommitHook, RelayError> {
    let (_, client) = authenticate(state, user_id)?;
    let repo = client.get_repo(repo_full_name).await?;

    let task = NewTask::new(
        user_id,
        format!("{}::{}", repo.full_name, TaskKind::GithubCommitToBuild.name()),
        TaskKind::GithubCommitToBuild.name().to_string(),
    )
    .map_err(RelayError::Validation)?;
    let task = state.dal.tasks().create(&task)?;

    let record = NewGitHubCommitHook::new(user_id, task.id, repo.full_name.clone())
        .map_err(RelayError::Validation)?;
    let record = state.dal.github().create_commit_hook(&record)?;

    let callback = format!(
        "{}/github/commit_to_build/webhook/{}",
        state.settings.server.origin, record.id
    );
    let webhook_id = client
        .create_hook(&repo.full_name, &callback, &["push"])
        .await?;
    state
        .dal
        .github()
        .set_commit_hook_webhook_id(record.id, webhook_id)?;
    info!(
        "Registered GitHub push webhook {} for {}",
        webhook_id, repo.full_name
    );

    state
        .dal
        .github()
        .get_commit_hook(record.id)?
        .ok_or_else(|| RelayError::Internal("hook record vanished".to_string()))
}

/// Updates the `secrets` flag on an existing hook.
pub fn edit(
    state: &AppState,
    hook: &GitHubCommitHook,
    secrets: bool,
) -> Result<GitHubCommitHook, RelayError> {
    let mut updated = hook.clone();
    updated.secrets = secrets;
    Ok(state.dal.github().update_commit_hook(hook.id, &updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_event_requires_commit_fields() {
        let payload: PushEvent = serde_json::from_str(r#"{"ref": "refs/heads/main"}"#).unwrap();
        assert!(payload.head_commit.is_none());
        assert!(payload.repository.is_none());
    }

    #[test]
    fn test_push_event_accepts_id_or_sha() {
        let payload: PushEvent = serde_json::from_str(
            r#"{
                "head_commit": {"id": "abc123"},
                "repository": {"full_name": "owner/repo"},
                "ref": "refs/heads/main"
            }"#,
        )
        .unwrap();
        let commit = payload.head_commit.unwrap();
        assert_eq!(commit.sha.or(commit.id).as_deref(), Some("abc123"));
    }
}
