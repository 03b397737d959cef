// src/models/github.rs

//! # GitHub Models
//!
//! Hook records and OAuth authorizations for the GitHub task kinds.
//!
//! A hook record binds one GitHub repository to one task. Its `id` doubles as
//! the webhook URL path segment, so it must be unguessable (random UUID).
//! `webhook_id` is the id GitHub assigned when the webhook was registered;
//! the sentinel `-1` means registration has not completed yet and must never
//! survive a successful configure flow.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel for "provider webhook not registered yet".
pub const WEBHOOK_ID_UNREGISTERED: i64 = -1;

/// One user's OAuth grant to GitHub (at most one per user).
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_authorizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitHubAuthorization {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub scopes: String,
    pub oauth_token: String,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_authorizations)]
pub struct NewGitHubAuthorization {
    pub user_id: Uuid,
    pub scopes: String,
    pub oauth_token: String,
}

/// Hook record for "GitHub push becomes a build job".
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_commit_hooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitHubCommitHook {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub task_id: Uuid,
    /// Repository full name, e.g. "owner/repo"
    pub repo: String,
    /// GitHub-assigned webhook id, or -1 until registration completes
    pub webhook_id: i64,
    /// Whether builds from this hook may use build secrets
    pub secrets: bool,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_commit_hooks)]
pub struct NewGitHubCommitHook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo: String,
    pub webhook_id: i64,
    pub secrets: bool,
}

impl NewGitHubCommitHook {
    pub fn new(user_id: Uuid, task_id: Uuid, repo: String) -> Result<Self, String> {
        if repo.trim().is_empty() {
            return Err("Repository name cannot be empty".to_string());
        }
        Ok(NewGitHubCommitHook {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            repo,
            webhook_id: WEBHOOK_ID_UNREGISTERED,
            secrets: true,
        })
    }
}

/// Hook record for "GitHub pull request becomes a build job".
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_pr_hooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitHubPrHook {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo: String,
    pub webhook_id: i64,
    /// Only honored while `private` is set; forced off for public repos
    pub secrets: bool,
    /// Merge the PR automatically after a successful build
    pub automerge: bool,
    /// Mirror of the repository's visibility, refreshed on edit
    pub private: bool,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::github_pr_hooks)]
pub struct NewGitHubPrHook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo: String,
    pub webhook_id: i64,
    pub secrets: bool,
    pub automerge: bool,
    pub private: bool,
}

impl NewGitHubPrHook {
    pub fn new(user_id: Uuid, task_id: Uuid, repo: String, private: bool) -> Result<Self, String> {
        if repo.trim().is_empty() {
            return Err("Repository name cannot be empty".to_string());
        }
        Ok(NewGitHubPrHook {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            repo,
            webhook_id: WEBHOOK_ID_UNREGISTERED,
            secrets: false,
            automerge: false,
            private,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_commit_hook_defaults() {
        let hook =
            NewGitHubCommitHook::new(Uuid::new_v4(), Uuid::new_v4(), "owner/repo".to_string())
                .unwrap();
        assert_eq!(hook.webhook_id, WEBHOOK_ID_UNREGISTERED);
        assert!(hook.secrets);
    }

    #[test]
    fn test_new_pr_hook_defaults() {
        let hook = NewGitHubPrHook::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "owner/repo".to_string(),
            true,
        )
        .unwrap();
        assert!(!hook.automerge);
        assert!(!hook.secrets);
        assert!(hook.private);
    }

    #[test]
    fn test_empty_repo_rejected() {
        assert!(NewGitHubCommitHook::new(Uuid::new_v4(), Uuid::new_v4(), "".to_string()).is_err());
    }
}
