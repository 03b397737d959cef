/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitLab adapter: push and merge-request events into builds.sr.ht jobs,
//! completion callbacks back into commit statuses. Every call is scoped to
//! an upstream host since GitLab is federated.

pub mod client;
pub mod commit;
pub mod mr;

use std::collections::BTreeMap;

use async_trait::async_trait;
use buildrelay_models::models::gitlab::GitLabAuthorization;
use buildrelay_utils::logging::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builds::{
    self, commit_note, discover_manifests, job_url, prepare_manifests, submit_build,
    BuildSubmission, PrepareContext, RepoFiles, SourceRepo, SubmitObserver,
};
use crate::error::RelayError;
use crate::state::AppState;
use client::GitLabClient;

pub const COMPLETE_BUILD_ROUTE: &str = "/gitlab/complete_build";

/// Correlation fields carried through the completion callback URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub context: String,
    pub oauth_token: String,
    pub project_id: i64,
    pub sha: String,
    pub upstream: String,
    pub username: String,
}

/// Looks up the hook owner's grant for one upstream and builds a client.
pub fn authenticate(
    state: &AppState,
    user_id: Uuid,
    upstream: &str,
) -> Result<(GitLabAuthorization, GitLabClient), RelayError> {
    let auth = state
        .dal
        .gitlab()
        .get_authorization(user_id, upstream)?
        .ok_or_else(|| RelayError::Auth("Invalid authorization for this hook".to_string()))?;
    let client = GitLabClient::new(state.http.clone(), upstream, &auth.oauth_token);
    Ok((auth, client))
}

/// Treats an auth rejection as a revoked grant for this upstream.
pub fn handle_auth_rejection(
    state: &AppState,
    user_id: Uuid,
    upstream: &str,
    err: RelayError,
) -> RelayError {
    if matches!(err, RelayError::Auth(_)) {
        if let Err(db_err) = state.dal.gitlab().delete_authorization(user_id, upstream) {
            error!("Failed to delete stale GitLab authorization: {}", db_err);
        }
    }
    err
}

struct GitLabRepoFiles<'a> {
    client: &'a GitLabClient,
    project_id: i64,
    sha: &'a str,
}

#[async_trait]
impl RepoFiles for GitLabRepoFiles<'_> {
    async fn read_file(&self, path: &str) -> Result<Option<String>, RelayError> {
        self.client.get_file(self.project_id, path, self.sha).await
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, RelayError> {
        self.client.list_tree(self.project_id, path, self.sha).await
    }
}

/// Posts "pending"/"running" statuses on the target project's commit.
/// Failures are logged and swallowed.
struct StatusObserver<'a> {
    client: &'a GitLabClient,
    project_id: i64,
    sha: &'a str,
    builds_origin: &'a str,
    username: &'a str,
}

#[async_trait]
impl SubmitObserver for StatusObserver<'_> {
    async fn preparing(&self, name: &str) {
        let result = self
            .client
            .create_commit_status(
                self.project_id,
                self.sha,
                "pending",
                self.builds_origin,
                None,
                &builds::context(name),
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to set pending status on {}: {}", self.sha, e);
        }
    }

    async fn submitted(&self, name: &str, job_id: i64) {
        let url = job_url(self.builds_origin, self.username, job_id);
        let result = self
            .client
            .create_commit_status(
                self.project_id,
                self.sha,
                "running",
                &url,
                None,
                &builds::context(name),
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to set running status on {}: {}", self.sha, e);
        }
    }
}

/// Inputs to the shared submission pipeline, after payload extraction.
pub struct SubmitParams {
    pub user_id: Uuid,
    pub upstream: String,
    /// Target project: owns the hook, shows the statuses.
    pub project_id: i64,
    /// Source project when the event comes from a fork MR.
    pub source_project_id: Option<i64>,
    pub sha: String,
    pub secrets: bool,
    pub env: BTreeMap<String, String>,
}

/// The pipeline shared by both GitLab task kinds. Returns `None` when the
/// repository carries no build manifests.
pub async fn submit_gitlab_build(
    state: &AppState,
    params: SubmitParams,
) -> Result<Option<Vec<(String, String)>>, RelayError> {
    let user = state
        .dal
        .users()
        .get(params.user_id)?
        .ok_or_else(|| RelayError::NotFound("unknown user".to_string()))?;
    let (auth, client) = authenticate(state, params.user_id, &params.upstream)?;

    let pipeline = async {
        let project = client.get_project(params.project_id).await?;
        let source = match params.source_project_id {
            Some(id) if id != project.id => Some(client.get_project(id).await?),
            _ => None,
        };
        let head_project = source.as_ref().unwrap_or(&project);
        let commit = client.get_commit(head_project.id, &params.sha).await?;

        let files = GitLabRepoFiles {
            client: &client,
            project_id: head_project.id,
            sha: &commit.id,
        };
        let raw = match discover_manifests(&files).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let head_source = SourceRepo {
            name: head_project.name.clone(),
            clone_url: head_project.http_url_to_repo.clone(),
            ssh_url: head_project.ssh_url_to_repo.clone(),
            private: head_project.is_private(),
        };
        let base_source = SourceRepo {
            name: project.name.clone(),
            clone_url: project.http_url_to_repo.clone(),
            ssh_url: project.ssh_url_to_repo.clone(),
            private: project.is_private(),
        };
        let ctx = PrepareContext {
            head: &head_source,
            base: &base_source,
            revision: &commit.id,
            env: &params.env,
        };
        let manifests = prepare_manifests(raw, &ctx, |name| {
            let payload = NotifyPayload {
                context: builds::context(name),
                oauth_token: auth.oauth_token.clone(),
                project_id: project.id,
                sha: commit.id.clone(),
                upstream: params.upstream.clone(),
                username: user.username.clone(),
            };
            state
                .codec
                .notify_url(&state.settings.server.origin, COMPLETE_BUILD_ROUTE, &payload)
                .map_err(|e| RelayError::Internal(e.to_string()))
        })?;

        let note = commit_note(
            &commit.message,
            &commit.id,
            &format!("{}/commit/{}", project.web_url, commit.id),
            &commit.committer_name,
            &commit.committer_email,
        );
        let observer = StatusObserver {
            client: &client,
            project_id: project.id,
            sha: &commit.id,
            builds_origin: &state.settings.builds.origin,
            username: &user.username,
        };
        let submission = BuildSubmission {
            tags: vec![project.name.clone()],
            manifests,
            oauth_token: &user.oauth_token,
            username: &user.username,
            note: Some(&note),
            secrets: params.secrets,
        };
        let urls = submit_build(
            &state.http,
            &state.settings.builds.origin,
            &submission,
            &observer,
        )
        .await?;
        Ok(Some(urls))
    };

    pipeline
        .await
        .map_err(|e| handle_auth_rejection(state, params.user_id, &params.upstream, e))
}

/// Body posted by builds.sr.ht when a job finishes.
#[derive(Debug, Deserialize)]
pub struct CompletionBody {
    pub id: i64,
    pub status: String,
}

/// Relays a completion callback back to the originating upstream as a
/// commit status.
pub async fn complete_build(
    state: &AppState,
    payload: NotifyPayload,
    body: CompletionBody,
) -> Result<String, RelayError> {
    let client = GitLabClient::new(state.http.clone(), &payload.upstream, &payload.oauth_token);
    let succeeded = body.status == "success";
    let url = job_url(&state.settings.builds.origin, &payload.username, body.id);

    let status = client
        .create_commit_status(
            payload.project_id,
            &payload.sha,
            if succeeded { "success" } else { "failed" },
            &url,
            Some(if succeeded {
                "completed successfully"
            } else {
                "failed"
            }),
            &payload.context,
        )
        .await;
    if let Err(e) = status {
        warn!("Failed to relay completion status to {}: {}", payload.upstream, e);
        return Ok("Error updating GitLab status".to_string());
    }
    Ok(format!("Sent build status to {}", payload.upstream))
}

/// Markdown block appended to a merge request's description listing the
/// jobs submitted for it.
pub fn mr_summary(urls: &[(String, String)]) -> String {
    let lines: Vec<String> = urls
        .iter()
        .map(|(n, u)| format!("[{}]({}): :clock1: running", n, u))
        .collect();
    format!("\n\nbuilds.sr.ht jobs:\n\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mr_summary_links_jobs() {
        let urls = vec![("a.yml".to_string(), "https://b/1".to_string())];
        assert_eq!(
            mr_summary(&urls),
            "\n\nbuilds.sr.ht jobs:\n\n[a.yml](https://b/1): :clock1: running"
        );
    }

    #[test]
    fn test_notify_payload_roundtrip() {
        let payload = NotifyPayload {
            context: "builds.sr.ht".to_string(),
            oauth_token: "t".to_string(),
            project_id: 42,
            sha: "abc".to_string(),
            upstream: "gitlab.example.org".to_string(),
            username: "mirell".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let again: NotifyPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(again.project_id, 42);
        assert_eq!(again.upstream, "gitlab.example.org");
    }
}
