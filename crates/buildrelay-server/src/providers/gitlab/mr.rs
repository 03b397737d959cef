/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitLab merge request events into build jobs.
//!
//! Besides per-manifest commit statuses, a submitted MR gets a job summary
//! appended to its description so the aggregate view lives on the MR page.

use std::collections::BTreeMap;

use buildrelay_models::models::gitlab::{GitLabMrHook, NewGitLabMrHook};
use buildrelay_models::models::tasks::NewTask;
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::builds::summary;
use crate::error::RelayError;
use crate::providers::gitlab::{authenticate, mr_summary, submit_gitlab_build, SubmitParams};
use crate::providers::TaskKind;
use crate::state::AppState;

const BUILDING_ACTIONS: [&str; 3] = ["open", "reopen", "update"];

/// The merge_request webhook fields the relay consumes.
#[derive(Debug, Deserialize)]
pub struct MergeRequestEvent {
    pub object_attributes: Option<ObjectAttributes>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectAttributes {
    pub iid: i64,
    pub title: String,
    pub action: Option<String>,
    pub source: SourceProject,
    pub last_commit: LastCommit,
}

#[derive(Debug, Deserialize)]
pub struct SourceProject {
    pub id: i64,
    #[serde(default)]
    pub name_with_namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LastCommit {
    pub id: String,
}

pub fn action_builds(action: Option<&str>) -> bool {
    match action {
        Some(a) => BUILDING_ACTIONS.contains(&a),
        // Some instances omit the action field; treat that as buildable.
        None => true,
    }
}

/// Handles one merge_request delivery for an MR hook.
pub async fn handle_webhook(
    state: &AppState,
    hook: &GitLabMrHook,
    event_header: Option<String>,
    payload: MergeRequestEvent,
) -> Result<String, RelayError> {
    let attrs = payload
        .object_attributes
        .ok_or_else(|| RelayError::Validation("Unexpected hook payload".to_string()))?;
    if !action_builds(attrs.action.as_deref()) {
        return Err(RelayError::Validation(
            "Got update, but there are no new commits".to_string(),
        ));
    }

    let mut env = BTreeMap::new();
    env.insert("GITLAB_REPOSITORY".to_string(), hook.repo_name.clone());
    if let Some(event) = event_header {
        env.insert("GITLAB_EVENT".to_string(), event);
    }
    env.insert("GITLAB_MR_NUMBER".to_string(), attrs.iid.to_string());
    env.insert("GITLAB_MR_TITLE".to_string(), attrs.title.clone());
    env.insert("GITLAB_BASE_REPO".to_string(), hook.repo_name.clone());
    if let Some(head_name) = &attrs.source.name_with_namespace {
        env.insert("GITLAB_HEAD_REPO".to_string(), head_name.clone());
    }

    let urls = submit_gitlab_build(
        state,
        SubmitParams {
            user_id: hook.user_id,
            upstream: hook.upstream.clone(),
            project_id: hook.repo_id,
            source_project_id: Some(attrs.source.id),
            sha: attrs.last_commit.id,
            secrets: hook.secrets,
            env,
        },
    )
    .await?;
    let urls = match urls {
        Some(urls) => urls,
        None => return Ok("There are no build manifests in this repository.".to_string()),
    };

    // Best-effort: the builds are already running, a description update
    // failure only loses the aggregate view.
    let description_update = async {
        let (_, client) = authenticate(state, hook.user_id, &hook.upstream)?;
        let merge_req = client.get_merge_request(hook.repo_id, attrs.iid).await?;
        let description = format!("{}{}", merge_req.description, mr_summary(&urls));
        client
            .update_merge_request_description(hook.repo_id, attrs.iid, &description)
            .await
    };
    if let Err(e) = description_update.await {
        warn!(
            "Failed to append job summary to MR !{} on {}: {}",
            attrs.iid, hook.upstream, e
        );
    }

    Ok(summary(&urls))
}

/// Creates the task, the hook record, and the provider webhook for one
/// project's merge requests.
pub async fn configure(
    state: &AppState,
    user_id: Uuid,
    upstream: &str,
    project_id: i64,
) -> Result<GitLabMrHook, RelayError> {
    let (_, client) = authenticate(state, user_id, upstream)?;
    let project = client.get_project(project_id).await?;

    let task = NewTask::new(
        user_id,
        format!(
            "{}::{}",
            project.name_with_namespace,
            TaskKind::GitlabMrToBuild.name()
        ),
        TaskKind::GitlabMrToBuild.name().to_string(),
    )
    .map_err(RelayError::Validation)?;
    let task = state.dal.tasks().create(&task)?;

    let record = NewGitLabMrHook::new(
        user_id,
        task.id,
        project.name_with_namespace.clone(),
        project.id,
        project.web_url.clone(),
        upstream.to_string(),
        project.is_private(),
    )
    .map_err(RelayError::Validation)?;
    let record = state.dal.gitlab().create_mr_hook(&record)?;

    let callback = format!(
        "{}/gitlab/mr_to_build/webhook/{}",
        state.settings.server.origin, record.id
    );
    let webhook_id = client.create_hook(project.id, &callback, false, true).await?;
    state
        .dal
        .gitlab()
        .set_mr_hook_webhook_id(record.id, webhook_id)?;
    info!(
        "Registered GitLab merge_request webhook {} for {} on {}",
        webhook_id, project.name_with_namespace, upstream
    );

    state
        .dal
        .gitlab()
        .get_mr_hook(record.id)?
        .ok_or_else(|| RelayError::Internal("hook record vanished".to_string()))
}

/// Updates the `secrets` flag on an existing hook; forced off while the
/// project is public.
pub fn edit(
    state: &AppState,
    hook: &GitLabMrHook,
    secrets: bool,
) -> Result<GitLabMrHook, RelayError> {
    let mut updated = hook.clone();
    updated.secrets = secrets && hook.private;
    Ok(state.dal.gitlab().update_mr_hook(hook.id, &updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_filter() {
        assert!(action_builds(Some("open")));
        assert!(action_builds(Some("update")));
        assert!(action_builds(Some("reopen")));
        assert!(action_builds(None));
        assert!(!action_builds(Some("close")));
        assert!(!action_builds(Some("merge")));
        assert!(!action_builds(Some("approved")));
    }

    #[test]
    fn test_event_parses_object_attributes() {
        let payload: MergeRequestEvent = serde_json::from_str(
            r#"{
                "object_attributes": {
                    "iid": 3,
                    "title": "Fix things",
                    "action": "open",
                    "source": {"id": 9, "name_with_namespace": "group / fork"},
                    "last_commit": {"id": "abc123"}
                }
            }"#,
        )
        .unwrap();
        let attrs = payload.object_attributes.unwrap();
        assert_eq!(attrs.iid, 3);
        assert_eq!(attrs.source.id, 9);
        assert_eq!(attrs.last_commit.id, "abc123");
    }
}
