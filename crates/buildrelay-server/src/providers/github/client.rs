/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Minimal GitHub REST v3 client covering the calls the relay makes.
//!
//! 401/403 responses map to `RelayError::Auth` so callers can treat them as
//! a revoked grant; 404 maps to `NotFound`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::RelayError;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = "buildrelay";

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub clone_url: String,
    pub ssh_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub html_url: String,
    pub commit: GitCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub message: String,
    pub author: GitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pull {
    pub number: i64,
    pub merged: bool,
    #[serde(default)]
    pub requested_reviewers: Vec<serde_json::Value>,
    #[serde(default)]
    pub requested_teams: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Contents {
    content: String,
}

#[derive(Debug, Deserialize)]
struct DirEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct HookCreated {
    id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub scope: String,
}

pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        GitHubClient {
            http,
            token: token.to_string(),
        }
    }

    fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, RelayError> {
        match resp.status().as_u16() {
            401 | 403 => Err(RelayError::Auth(
                "We can't access your GitHub account. Did you revoke our access?".to_string(),
            )),
            404 => Err(RelayError::NotFound(format!("{} not found", what))),
            s if (200..300).contains(&s) => Ok(resp),
            s => Err(RelayError::Internal(format!(
                "GitHub returned {} for {}",
                s, what
            ))),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, RelayError> {
        Ok(self
            .http
            .get(format!("{}{}", API_ROOT, path))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, RelayError> {
        Ok(self
            .http
            .post(format!("{}{}", API_ROOT, path))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn get_repo(&self, full_name: &str) -> Result<Repo, RelayError> {
        let resp = self.get(&format!("/repos/{}", full_name)).await?;
        Ok(Self::check(resp, "repository")?.json().await?)
    }

    pub async fn get_commit(&self, full_name: &str, sha: &str) -> Result<Commit, RelayError> {
        let resp = self
            .get(&format!("/repos/{}/commits/{}", full_name, sha))
            .await?;
        Ok(Self::check(resp, "commit")?.json().await?)
    }

    /// Reads a file at a revision. `None` when the path does not exist.
    /// GitHub serves file content base64-encoded with embedded newlines.
    pub async fn get_contents(
        &self,
        full_name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, RelayError> {
        let resp = self
            .get(&format!(
                "/repos/{}/contents/{}?ref={}",
                full_name, path, git_ref
            ))
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let contents: Contents = Self::check(resp, "file")?.json().await?;
        let raw: String = contents.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(raw)
            .map_err(|e| RelayError::Internal(format!("undecodable file content: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| RelayError::Internal(format!("file content is not UTF-8: {}", e)))?;
        Ok(Some(text))
    }

    /// Lists file paths directly under a directory at a revision; empty when
    /// the directory does not exist.
    pub async fn get_dir(
        &self,
        full_name: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<String>, RelayError> {
        let resp = self
            .get(&format!(
                "/repos/{}/contents/{}?ref={}",
                full_name, path, git_ref
            ))
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let entries: Vec<DirEntry> = Self::check(resp, "directory")?.json().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "file")
            .map(|e| e.path)
            .collect())
    }

    pub async fn create_status(
        &self,
        full_name: &str,
        sha: &str,
        state: &str,
        target_url: &str,
        description: &str,
        context: &str,
    ) -> Result<(), RelayError> {
        let resp = self
            .post(
                &format!("/repos/{}/statuses/{}", full_name, sha),
                &json!({
                    "state": state,
                    "target_url": target_url,
                    "description": description,
                    "context": context,
                }),
            )
            .await?;
        Self::check(resp, "status")?;
        Ok(())
    }

    /// Registers a JSON webhook for the given events and returns the id
    /// GitHub assigned to it.
    pub async fn create_hook(
        &self,
        full_name: &str,
        url: &str,
        events: &[&str],
    ) -> Result<i64, RelayError> {
        let resp = self
            .post(
                &format!("/repos/{}/hooks", full_name),
                &json!({
                    "name": "web",
                    "active": true,
                    "events": events,
                    "config": {
                        "url": url,
                        "content_type": "json",
                    },
                }),
            )
            .await?;
        let created: HookCreated = Self::check(resp, "webhook")?.json().await?;
        Ok(created.id)
    }

    pub async fn get_pull(&self, full_name: &str, number: i64) -> Result<Pull, RelayError> {
        let resp = self
            .get(&format!("/repos/{}/pulls/{}", full_name, number))
            .await?;
        Ok(Self::check(resp, "pull request")?.json().await?)
    }

    pub async fn merge_pull(&self, full_name: &str, number: i64) -> Result<(), RelayError> {
        let resp = self
            .http
            .put(format!("{}/repos/{}/pulls/{}/merge", API_ROOT, full_name, number))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RelayError::Submission(
                "Unable to merge automatically (failing rules?)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exchanges an OAuth authorization code for an access token.
pub async fn exchange_code(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<AccessToken, RelayError> {
    let resp = http
        .post("https://github.com/login/oauth/access_token")
        .header("Accept", "application/json")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
        ])
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(RelayError::Auth(
            "GitHub rejected the authorization code".to_string(),
        ));
    }
    Ok(resp.json().await?)
}
