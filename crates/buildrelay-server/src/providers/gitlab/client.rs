/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Minimal GitLab v4 REST client. GitLab is federated, so a client is bound
//! to one upstream host; every relay variant carries the upstream alongside
//! the project id.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::RelayError;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub name_with_namespace: String,
    pub web_url: String,
    pub visibility: String,
    pub http_url_to_repo: String,
    pub ssh_url_to_repo: String,
}

impl Project {
    pub fn is_private(&self) -> bool {
        self.visibility == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlCommit {
    pub id: String,
    pub message: String,
    pub committer_name: String,
    pub committer_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    pub iid: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct FileContents {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
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
}

/// Percent-encodes a repository path for use as a URL segment, as GitLab's
/// file endpoints require (`/` becomes `%2F`).
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub struct GitLabClient {
    http: reqwest::Client,
    api_root: String,
    token: String,
}

impl GitLabClient {
    pub fn new(http: reqwest::Client, upstream: &str, token: &str) -> Self {
        GitLabClient {
            http,
            api_root: format!("https://{}/api/v4", upstream),
            token: token.to_string(),
        }
    }

    fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, RelayError> {
        match resp.status().as_u16() {
            401 | 403 => Err(RelayError::Auth(
                "We can't access your GitLab account. Did you revoke our access?".to_string(),
            )),
            404 => Err(RelayError::NotFound(format!("{} not found", what))),
            s if (200..300).contains(&s) => Ok(resp),
            s => Err(RelayError::Internal(format!(
                "GitLab returned {} for {}",
                s, what
            ))),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, RelayError> {
        Ok(self
            .http
            .get(format!("{}{}", self.api_root, path))
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
            .post(format!("{}{}", self.api_root, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn get_project(&self, project_id: i64) -> Result<Project, RelayError> {
        let resp = self.get(&format!("/projects/{}", project_id)).await?;
        Ok(Self::check(resp, "project")?.json().await?)
    }

    pub async fn get_commit(&self, project_id: i64, sha: &str) -> Result<GlCommit, RelayError> {
        let resp = self
            .get(&format!("/projects/{}/repository/commits/{}", project_id, sha))
            .await?;
        Ok(Self::check(resp, "commit")?.json().await?)
    }

    /// Reads a file at a revision; `None` when the path does not exist.
    pub async fn get_file(
        &self,
        project_id: i64,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, RelayError> {
        let resp = self
            .get(&format!(
                "/projects/{}/repository/files/{}?ref={}",
                project_id,
                encode_path(path),
                git_ref
            ))
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let contents: FileContents = Self::check(resp, "file")?.json().await?;
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
    pub async fn list_tree(
        &self,
        project_id: i64,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<String>, RelayError> {
        let resp = self
            .get(&format!(
                "/projects/{}/repository/tree?path={}&ref={}",
                project_id,
                encode_path(path),
                git_ref
            ))
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let entries: Vec<TreeEntry> = Self::check(resp, "tree")?.json().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect())
    }

    /// Sets a commit status. GitLab uses `running`/`failed` where GitHub
    /// uses `pending`/`failure`.
    pub async fn create_commit_status(
        &self,
        project_id: i64,
        sha: &str,
        state: &str,
        target_url: &str,
        description: Option<&str>,
        context: &str,
    ) -> Result<(), RelayError> {
        let resp = self
            .post(
                &format!("/projects/{}/statuses/{}", project_id, sha),
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

    /// Registers a project webhook and returns the id GitLab assigned.
    pub async fn create_hook(
        &self,
        project_id: i64,
        url: &str,
        push_events: bool,
        merge_requests_events: bool,
    ) -> Result<i64, RelayError> {
        let resp = self
            .post(
                &format!("/projects/{}/hooks", project_id),
                &json!({
                    "url": url,
                    "push_events": push_events,
                    "merge_requests_events": merge_requests_events,
                }),
            )
            .await?;
        let created: HookCreated = Self::check(resp, "webhook")?.json().await?;
        Ok(created.id)
    }

    pub async fn get_merge_request(
        &self,
        project_id: i64,
        iid: i64,
    ) -> Result<MergeRequest, RelayError> {
        let resp = self
            .get(&format!("/projects/{}/merge_requests/{}", project_id, iid))
            .await?;
        Ok(Self::check(resp, "merge request")?.json().await?)
    }

    pub async fn update_merge_request_description(
        &self,
        project_id: i64,
        iid: i64,
        description: &str,
    ) -> Result<(), RelayError> {
        let resp = self
            .http
            .put(format!(
                "{}/projects/{}/merge_requests/{}",
                self.api_root, project_id, iid
            ))
            .bearer_auth(&self.token)
            .json(&json!({ "description": description }))
            .send()
            .await?;
        Self::check(resp, "merge request")?;
        Ok(())
    }
}

/// Exchanges an OAuth authorization code for an access token on one
/// upstream instance.
pub async fn exchange_code(
    http: &reqwest::Client,
    upstream: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<AccessToken, RelayError> {
    let resp = http
        .post(format!("https://{}/oauth/token", upstream))
        .header("Accept", "application/json")
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(RelayError::Auth(format!(
            "{} rejected the authorization code",
            upstream
        )));
    }
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_escapes_separators() {
        assert_eq!(encode_path(".build.yml"), ".build.yml");
        assert_eq!(encode_path(".builds/a.yml"), ".builds%2Fa.yml");
    }

    #[test]
    fn test_private_visibility() {
        let project = Project {
            id: 1,
            name: "repo".to_string(),
            name_with_namespace: "group / repo".to_string(),
            web_url: "https://gl/group/repo".to_string(),
            visibility: "private".to_string(),
            http_url_to_repo: "https://gl/group/repo.git".to_string(),
            ssh_url_to_repo: "git@gl:group/repo.git".to_string(),
        };
        assert!(project.is_private());
    }
}
