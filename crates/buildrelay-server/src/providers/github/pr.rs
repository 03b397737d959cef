/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitHub pull request events into build jobs.
//!
//! Only `opened` and `synchronize` actions carry new commits; every other
//! action is acknowledged without building. Secrets are forced off when the
//! base repository is public, regardless of the hook's flag.

use std::collections::BTreeMap;

use buildrelay_models::models::github::{GitHubPrHook, NewGitHubPrHook};
use buildrelay_models::models::tasks::NewTask;
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RelayError;
use crate::providers::github::commit::DeliveryHeaders;
use crate::providers::github::{authenticate, submit_github_build, SubmitParams};
use crate::providers::TaskKind;
use crate::state::AppState;

const BUILDING_ACTIONS: [&str; 2] = ["opened", "synchronize"];

/// The pull_request webhook fields the relay consumes.
#[derive(Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: Option<String>,
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: i64,
    pub title: String,
    pub head: PrRef,
    pub base: PrRef,
}

#[derive(Debug, Deserialize)]
pub struct PrRef {
    pub sha: String,
    pub repo: PrRepo,
}

#[derive(Debug, Deserialize)]
pub struct PrRepo {
    pub full_name: String,
    pub private: bool,
}

pub fn action_builds(action: &str) -> bool {
    BUILDING_ACTIONS.contains(&action)
}

/// Handles one pull_request delivery for a PR hook.
pub async fn handle_webhook(
    state: &AppState,
    hook: &GitHubPrHook,
    headers: &DeliveryHeaders,
    payload: PullRequestEvent,
) -> Result<String, RelayError> {
    let (action, pr) = match (payload.action, payload.pull_request) {
        (Some(a), Some(p)) => (a, p),
        _ => {
            return Err(RelayError::Validation(
                "Got request, but it has no commits".to_string(),
            ))
        }
    };
    if !action_builds(&action) {
        return Err(RelayError::Validation(
            "Got update, but there are no new commits".to_string(),
        ));
    }

    let secrets = hook.secrets && pr.base.repo.private;

    let mut env = BTreeMap::new();
    if let Some(delivery) = &headers.delivery {
        env.insert("GITHUB_DELIVERY".to_string(), delivery.clone());
    }
    if let Some(event) = &headers.event {
        env.insert("GITHUB_EVENT".to_string(), event.clone());
    }
    env.insert("GITHUB_PR_NUMBER".to_string(), pr.number.to_string());
    env.insert("GITHUB_PR_TITLE".to_string(), pr.title.clone());
    env.insert(
        "GITHUB_BASE_REPO".to_string(),
        pr.base.repo.full_name.clone(),
    );
    env.insert(
        "GITHUB_HEAD_REPO".to_string(),
        pr.head.repo.full_name.clone(),
    );

    submit_github_build(
        state,
        SubmitParams {
            user_id: hook.user_id,
            head_full_name: pr.head.repo.full_name,
            base_full_name: pr.base.repo.full_name,
            sha: pr.head.sha,
            secrets,
            env,
            pr: Some(pr.number),
            automerge: Some(hook.automerge),
        },
    )
    .await
}

/// Creates the task, the hook record, and the provider webhook for one
/// repository's pull requests.
pub async fn configure(
    state: &AppState,
    user_id: Uuid,
    repo_full_name: &str,
) -> Result<GitHubPrHook, RelayError> {
    let (_, client) = authenticate(state, user_id)?;
    let repo = client.get_repo(repo_full_name).await?;

    let task = NewTask::new(
        user_id,
        format!("{}::{}", repo.full_name, TaskKind::GithubPrToBuild.name()),
        TaskKind::GithubPrToBuild.name().to_string(),
    )
    .map_err(RelayError::Validation)?;
    let task = state.dal.tasks().create(&task)?;

    let record = NewGitHubPrHook::new(user_id, task.id, repo.full_name.clone(), repo.private)
        .map_err(RelayError::Validation)?;
    let record = state.dal.github().create_pr_hook(&record)?;

    let callback = format!(
        "{}/github/pr_to_build/webhook/{}",
        state.settings.server.origin, record.id
    );
    let webhook_id = client
        .create_hook(&repo.full_name, &callback, &["pull_request"])
        .await?;
    state
        .dal
        .github()
        .set_pr_hook_webhook_id(record.id, webhook_id)?;
    info!(
        "Registered GitHub pull_request webhook {} for {}",
        webhook_id, repo.full_name
    );

    state
        .dal
        .github()
        .get_pr_hook(record.id)?
        .ok_or_else(|| RelayError::Internal("hook record vanished".to_string()))
}

/// Updates the behavioral flags on an existing hook. The repository's
/// current visibility is re-checked so `secrets` cannot stay on after a
/// repo goes public.
pub async fn edit(
    state: &AppState,
    hook: &GitHubPrHook,
    automerge: bool,
    secrets: bool,
) -> Result<GitHubPrHook, RelayError> {
    let (_, client) = authenticate(state, hook.user_id)?;
    let repo = client.get_repo(&hook.repo).await?;

    let mut updated = hook.clone();
    updated.automerge = automerge;
    updated.private = repo.private;
    updated.secrets = secrets && repo.private;
    Ok(state.dal.github().update_pr_hook(hook.id, &updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_filter() {
        assert!(action_builds("opened"));
        assert!(action_builds("synchronize"));
        assert!(!action_builds("closed"));
        assert!(!action_builds("labeled"));
        assert!(!action_builds("edited"));
    }

    #[test]
    fn test_event_parses_head_and_base() {
        let payload: PullRequestEvent = serde_json::from_str(
            r#"{
                "action": "opened",
                "pull_request": {
                    "number": 12,
                    "title": "Add feature",
                    "head": {"sha": "aaa", "repo": {"full_name": "fork/repo", "private": false}},
                    "base": {"sha": "bbb", "repo": {"full_name": "owner/repo", "private": true}}
                }
            }"#,
        )
        .unwrap();
        let pr = payload.pull_request.unwrap();
        assert_eq!(pr.head.repo.full_name, "fork/repo");
        assert!(pr.base.repo.private);
    }
}
