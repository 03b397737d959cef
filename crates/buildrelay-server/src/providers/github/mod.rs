/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! GitHub adapter: push and pull-request events into builds.sr.ht jobs,
//! completion callbacks back into commit statuses (and an optional
//! automerge).

pub mod client;
pub mod commit;
pub mod pr;

use std::collections::BTreeMap;

use async_trait::async_trait;
use buildrelay_models::models::github::GitHubAuthorization;
use buildrelay_utils::logging::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builds::{
    self, commit_note, discover_manifests, job_url, prepare_manifests, submit_build,
    BuildSubmission, PrepareContext, RepoFiles, SourceRepo, SubmitObserver,
};
use crate::error::RelayError;
use crate::state::AppState;
use client::GitHubClient;

pub const COMPLETE_BUILD_ROUTE: &str = "/github/complete_build";

/// Correlation fields carried through the completion callback URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub full_name: String,
    pub oauth_token: String,
    pub username: String,
    pub sha: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automerge: Option<bool>,
}

/// Looks up the hook owner's GitHub grant and builds a client from it.
pub fn authenticate(
    state: &AppState,
    user_id: Uuid,
) -> Result<(GitHubAuthorization, GitHubClient), RelayError> {
    let auth = state
        .dal
        .github()
        .get_authorization(user_id)?
        .ok_or_else(|| {
            RelayError::Auth("You have not authorized us to access your GitHub account".to_string())
        })?;
    let client = GitHubClient::new(state.http.clone(), &auth.oauth_token);
    Ok((auth, client))
}

/// Treats an auth rejection as a revoked grant: the stale record is deleted
/// so the user is re-prompted, and the error passes through unchanged.
pub fn handle_auth_rejection(state: &AppState, user_id: Uuid, err: RelayError) -> RelayError {
    if matches!(err, RelayError::Auth(_)) {
        if let Err(db_err) = state.dal.github().delete_authorization(user_id) {
            error!("Failed to delete stale GitHub authorization: {}", db_err);
        }
    }
    err
}

struct GitHubRepoFiles<'a> {
    client: &'a GitHubClient,
    full_name: &'a str,
    sha: &'a str,
}

#[async_trait]
impl RepoFiles for GitHubRepoFiles<'_> {
    async fn read_file(&self, path: &str) -> Result<Option<String>, RelayError> {
        self.client
            .get_contents(self.full_name, path, self.sha)
            .await
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>, RelayError> {
        self.client.get_dir(self.full_name, path, self.sha).await
    }
}

/// Posts "pending" statuses on the base repository's commit as each
/// manifest moves through the gateway. Failures are logged and swallowed.
struct StatusObserver<'a> {
    client: &'a GitHubClient,
    base_full_name: &'a str,
    sha: &'a str,
    builds_origin: &'a str,
    username: &'a str,
}

#[async_trait]
impl SubmitObserver for StatusObserver<'_> {
    async fn preparing(&self, name: &str) {
        let result = self
            .client
            .create_status(
                self.base_full_name,
                self.sha,
                "pending",
                self.builds_origin,
                "preparing builds.sr.ht job",
                &builds::context(name),
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to set preparing status on {}: {}", self.sha, e);
        }
    }

    async fn submitted(&self, name: &str, job_id: i64) {
        let url = job_url(self.builds_origin, self.username, job_id);
        let result = self
            .client
            .create_status(
                self.base_full_name,
                self.sha,
                "pending",
                &url,
                "builds.sr.ht job is running",
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
    /// Repository whose content is built (PR head, or the repo itself).
    pub head_full_name: String,
    /// Repository that owns the hook and shows the statuses.
    pub base_full_name: String,
    pub sha: String,
    pub secrets: bool,
    pub env: BTreeMap<String, String>,
    pub pr: Option<i64>,
    pub automerge: Option<bool>,
}

/// The pipeline shared by both GitHub task kinds: authenticate, resolve the
/// commit, discover and rewrite manifests, submit, and summarize.
pub async fn submit_github_build(
    state: &AppState,
    params: SubmitParams,
) -> Result<String, RelayError> {
    let user = state
        .dal
        .users()
        .get(params.user_id)?
        .ok_or_else(|| RelayError::NotFound("unknown user".to_string()))?;
    let (auth, client) = authenticate(state, params.user_id)?;

    let pipeline = async {
        let head = client.get_repo(&params.head_full_name).await?;
        let base = client.get_repo(&params.base_full_name).await?;
        let commit = client.get_commit(&head.full_name, &params.sha).await?;

        let files = GitHubRepoFiles {
            client: &client,
            full_name: &head.full_name,
            sha: &commit.sha,
        };
        let raw = match discover_manifests(&files).await? {
            Some(raw) => raw,
            None => return Ok("There are no build manifests in this repository.".to_string()),
        };

        let head_source = SourceRepo {
            name: head.name.clone(),
            clone_url: head.clone_url.clone(),
            ssh_url: head.ssh_url.clone(),
            private: head.private,
        };
        let base_source = SourceRepo {
            name: base.name.clone(),
            clone_url: base.clone_url.clone(),
            ssh_url: base.ssh_url.clone(),
            private: base.private,
        };
        let ctx = PrepareContext {
            head: &head_source,
            base: &base_source,
            revision: &commit.sha,
            env: &params.env,
        };
        let manifests = prepare_manifests(raw, &ctx, |name| {
            let payload = NotifyPayload {
                full_name: base.full_name.clone(),
                oauth_token: auth.oauth_token.clone(),
                username: user.username.clone(),
                sha: commit.sha.clone(),
                context: builds::context(name),
                pr: params.pr,
                automerge: params.automerge,
            };
            state
                .codec
                .notify_url(&state.settings.server.origin, COMPLETE_BUILD_ROUTE, &payload)
                .map_err(|e| RelayError::Internal(e.to_string()))
        })?;

        let note = commit_note(
            &commit.commit.message,
            &commit.sha,
            &commit.html_url,
            &commit.commit.author.name,
            &commit.commit.author.email,
        );
        let observer = StatusObserver {
            client: &client,
            base_full_name: &base.full_name,
            sha: &commit.sha,
            builds_origin: &state.settings.builds.origin,
            username: &user.username,
        };
        let submission = BuildSubmission {
            tags: vec![head.name.clone()],
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
        Ok(builds::summary(&urls))
    };

    pipeline
        .await
        .map_err(|e| handle_auth_rejection(state, params.user_id, e))
}

/// Body posted by builds.sr.ht when a job finishes.
#[derive(Debug, Deserialize)]
pub struct CompletionBody {
    pub id: i64,
    pub status: String,
}

/// Relays a completion callback back to GitHub as a commit status and, for
/// automerge-enabled PR builds, attempts the merge.
pub async fn complete_build(
    state: &AppState,
    payload: NotifyPayload,
    body: CompletionBody,
) -> Result<String, RelayError> {
    let client = GitHubClient::new(state.http.clone(), &payload.oauth_token);
    let succeeded = body.status == "success";
    let url = job_url(&state.settings.builds.origin, &payload.username, body.id);

    let status = client
        .create_status(
            &payload.full_name,
            &payload.sha,
            if succeeded { "success" } else { "failure" },
            &url,
            if succeeded {
                "builds.sr.ht job completed successfully"
            } else {
                "builds.sr.ht job failed"
            },
            &payload.context,
        )
        .await;
    if let Err(e) = status {
        warn!("Failed to relay completion status to GitHub: {}", e);
        return Ok("Error updating GitHub status".to_string());
    }

    if let Some(number) = payload.pr {
        if payload.automerge == Some(true) && succeeded {
            let pull = client.get_pull(&payload.full_name, number).await?;
            if should_automerge(&pull, true, succeeded) {
                if client.merge_pull(&payload.full_name, number).await.is_err() {
                    return Ok("Unable to merge automatically (failing rules?)".to_string());
                }
            }
        }
    }
    Ok("Sent build status to GitHub".to_string())
}

/// A PR merges automatically only when requested, successful, not already
/// merged, and with no outstanding review requests of either kind.
pub fn should_automerge(pull: &client::Pull, automerge: bool, succeeded: bool) -> bool {
    automerge
        && succeeded
        && !pull.merged
        && pull.requested_reviewers.is_empty()
        && pull.requested_teams.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull(merged: bool, reviewers: usize, teams: usize) -> client::Pull {
        client::Pull {
            number: 7,
            merged,
            requested_reviewers: vec![serde_json::json!({}); reviewers],
            requested_teams: vec![serde_json::json!({}); teams],
        }
    }

    #[test]
    fn test_automerge_requires_clean_review_slate() {
        assert!(should_automerge(&pull(false, 0, 0), true, true));
        assert!(!should_automerge(&pull(false, 1, 0), true, true));
        assert!(!should_automerge(&pull(false, 0, 1), true, true));
    }

    #[test]
    fn test_automerge_skips_merged_or_failed() {
        assert!(!should_automerge(&pull(true, 0, 0), true, true));
        assert!(!should_automerge(&pull(false, 0, 0), true, false));
        assert!(!should_automerge(&pull(false, 0, 0), false, true));
    }

    #[test]
    fn test_notify_payload_omits_absent_extras() {
        let payload = NotifyPayload {
            full_name: "owner/repo".to_string(),
            oauth_token: "t".to_string(),
            username: "u".to_string(),
            sha: "s".to_string(),
            context: "builds.sr.ht".to_string(),
            pr: None,
            automerge: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("\"pr\""));
        assert!(!json.contains("\"automerge\""));
    }
}
