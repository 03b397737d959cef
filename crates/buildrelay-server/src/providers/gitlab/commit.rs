/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitLab push events into build jobs.

use std::collections::BTreeMap;

use buildrelay_models::models::gitlab::{GitLabCommitHook, NewGitLabCommitHook};
use buildrelay_models::models::tasks::NewTask;
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::builds::summary;
use crate::error::RelayError;
use crate::providers::gitlab::{authenticate, submit_gitlab_build, SubmitParams};
use crate::providers::TaskKind;
use crate::state::AppState;

/// The push webhook fields the relay consumes.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub after: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

/// Handles one push delivery for a commit hook.
pub async fn handle_webhook(
    state: &AppState,
    hook: &GitLabCommitHook,
    event_header: Option<String>,
    payload: PushEvent,
) -> Result<String, RelayError> {
    let (after, git_ref) = match (payload.after, payload.git_ref) {
        (Some(a), Some(g)) => (a, g),
        _ => return Err(RelayError::Validation("Unexpected hook payload".to_string())),
    };

    let mut env = BTreeMap::new();
    env.insert("GITLAB_REPOSITORY".to_string(), hook.repo_name.clone());
    if let Some(event) = event_header {
        env.insert("GITLAB_EVENT".to_string(), event);
    }
    env.insert("GITLAB_REF".to_string(), git_ref);

    let urls = submit_gitlab_build(
        state,
        SubmitParams {
            user_id: hook.user_id,
            upstream: hook.upstream.clone(),
            project_id: hook.repo_id,
            source_project_id: None,
            sha: after,
            secrets: hook.secrets,
            env,
        },
    )
    .await?;
    match urls {
        Some(urls) => Ok(summary(&urls)),
        None => Ok("There are no build manifests in this repository.".to_string()),
    }
}

/// Creates the task, the hook record, and the provider webhook for one
/// project's pushes.
pub async fn configure(
    state: &AppState,
    user_id: Uuid,
    upstream: &str,
    project_id: i64,
) -> Result<GitLabCommitHook, RelayError> {
    let (_, client) = authenticate(state, user_id, upstream)?;
    let project = client.get_project(project_id).await?;

    let task = NewTask::new(
        user_id,
        format!(
            "{}::{}",
            project.name_with_namespace,
            TaskKind::GitlabCommitToBuild.name()
        ),
        TaskKind::GitlabCommitToBuild.name().to_string(),
    )
    .map_err(RelayError::Validation)?;
    let task = state.dal.tasks().create(&task)?;

    let record = NewGitLabCommitHook::new(
        user_id,
        task.id,
        project.name_with_namespace.clone(),
        project.id,
        project.web_url.clone(),
        upstream.to_string(),
    )
    .map_err(RelayError::Validation)?;
    let record = state.dal.gitlab().create_commit_hook(&record)?;

    let callback = format!(
        "{}/gitlab/commit_to_build/webhook/{}",
        state.settings.server.origin, record.id
    );
    let webhook_id = client.create_hook(project.id, &callback, true, false).await?;
    state
        .dal
        .gitlab()
        .set_commit_hook_webhook_id(record.id, webhook_id)?;
    info!(
        "Registered GitLab push webhook {} for {} on {}",
        webhook_id, project.name_with_namespace, upstream
    );

    state
        .dal
        .gitlab()
        .get_commit_hook(record.id)?
        .ok_or_else(|| RelayError::Internal("hook record vanished".to_string()))
}

/// Updates the `secrets` flag on an existing hook.
pub fn edit(
    state: &AppState,
    hook: &GitLabCommitHook,
    secrets: bool,
) -> Result<GitLabCommitHook, RelayError> {
    let mut updated = hook.clone();
    updated.secrets = secrets;
    Ok(state.dal.gitlab().update_commit_hook(hook.id, &updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_event_requires_after_and_ref() {
        let payload: PushEvent = serde_json::from_str(r#"{"before": "aaa"}"#).unwrap();
        assert!(payload.after.is_none());
        assert!(payload.git_ref.is_none());

        let payload: PushEvent =
            serde_json::from_str(r#"{"after": "bbb", "ref": "refs/heads/main"}"#).unwrap();
        assert_eq!(payload.after.as_deref(), Some("bbb"));
    }
}
