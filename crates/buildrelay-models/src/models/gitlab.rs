// src/models/gitlab.rs

//! # GitLab Models
//!
//! Hook records and OAuth authorizations for the GitLab task kinds.
//!
//! GitLab is federated across self-hosted instances, so everything here
//! carries an `upstream` host: authorizations are keyed by (user, upstream)
//! and hook records remember which instance their project lives on.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use super::github::WEBHOOK_ID_UNREGISTERED;

/// One user's OAuth grant to one GitLab upstream.
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_authorizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitLabAuthorization {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub upstream: String,
    pub oauth_token: String,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_authorizations)]
pub struct NewGitLabAuthorization {
    pub user_id: Uuid,
    pub upstream: String,
    pub oauth_token: String,
}

/// Hook record for "GitLab push becomes a build job".
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_commit_hooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitLabCommitHook {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub task_id: Uuid,
    /// Project name with namespace, e.g. "group / repo"
    pub repo_name: String,
    /// Numeric project id on the upstream instance
    pub repo_id: i64,
    pub web_url: String,
    /// Host of the GitLab instance this project lives on
    pub upstream: String,
    pub webhook_id: i64,
    pub secrets: bool,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_commit_hooks)]
pub struct NewGitLabCommitHook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo_name: String,
    pub repo_id: i64,
    pub web_url: String,
    pub upstream: String,
    pub webhook_id: i64,
    pub secrets: bool,
}

impl NewGitLabCommitHook {
    pub fn new(
        user_id: Uuid,
        task_id: Uuid,
        repo_name: String,
        repo_id: i64,
        web_url: String,
        upstream: String,
    ) -> Result<Self, String> {
        if repo_name.trim().is_empty() {
            return Err("Project name cannot be empty".to_string());
        }
        if upstream.trim().is_empty() {
            return Err("Upstream host cannot be empty".to_string());
        }
        Ok(NewGitLabCommitHook {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            repo_name,
            repo_id,
            web_url,
            upstream,
            webhook_id: WEBHOOK_ID_UNREGISTERED,
            secrets: true,
        })
    }
}

/// Hook record for "GitLab merge request becomes a build job".
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_mr_hooks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitLabMrHook {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo_name: String,
    pub repo_id: i64,
    pub web_url: String,
    pub upstream: String,
    pub webhook_id: i64,
    pub secrets: bool,
    pub private: bool,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::gitlab_mr_hooks)]
pub struct NewGitLabMrHook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub repo_name: String,
    pub repo_id: i64,
    pub web_url: String,
    pub upstream: String,
    pub webhook_id: i64,
    pub secrets: bool,
    pub private: bool,
}

impl NewGitLabMrHook {
    pub fn new(
        user_id: Uuid,
        task_id: Uuid,
        repo_name: String,
        repo_id: i64,
        web_url: String,
        upstream: String,
        private: bool,
    ) -> Result<Self, String> {
        if repo_name.trim().is_empty() {
            return Err("Project name cannot be empty".to_string());
        }
        if upstream.trim().is_empty() {
            return Err("Upstream host cannot be empty".to_string());
        }
        Ok(NewGitLabMrHook {
            id: Uuid::new_v4(),
            user_id,
            task_id,
            repo_name,
            repo_id,
            web_url,
            upstream,
            webhook_id: WEBHOOK_ID_UNREGISTERED,
            secrets: false,
            private,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_commit_hook_defaults() {
        let hook = NewGitLabCommitHook::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "group / repo".to_string(),
            42,
            "https://gitlab.example.org/group/repo".to_string(),
            "gitlab.example.org".to_string(),
        )
        .unwrap();
        assert_eq!(hook.webhook_id, WEBHOOK_ID_UNREGISTERED);
        assert_eq!(hook.repo_id, 42);
    }

    #[test]
    fn test_empty_upstream_rejected() {
        assert!(NewGitLabMrHook::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "repo".to_string(),
            1,
            "https://example.org".to_string(),
            "".to_string(),
            false,
        )
        .is_err());
    }
}
