/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Build submission gateway.
//!
//! Submits prepared manifests to builds.sr.ht one at a time, in order. A
//! non-2xx response halts the batch and its body is surfaced verbatim;
//! jobs already submitted are not withdrawn. Observer callbacks let the
//! provider adapter set per-manifest commit statuses around each POST; they
//! are best-effort and never abort the batch.

use async_trait::async_trait;
use buildrelay_utils::logging::prelude::*;
use serde::Deserialize;

use crate::builds::manifest::Manifest;
use crate::error::RelayError;

/// Per-manifest progress callbacks, implemented by the provider adapters
/// to post "pending"/"running" commit statuses.
#[async_trait]
pub trait SubmitObserver: Send + Sync {
    async fn preparing(&self, name: &str);
    async fn submitted(&self, name: &str, job_id: i64);
}

/// Observer used where no commit statuses are wanted.
pub struct NullObserver;

#[async_trait]
impl SubmitObserver for NullObserver {
    async fn preparing(&self, _name: &str) {}
    async fn submitted(&self, _name: &str, _job_id: i64) {}
}

/// One batch of manifests bound for the build service.
pub struct BuildSubmission<'a> {
    /// Tag prefix applied to every job, usually the repository name.
    pub tags: Vec<String>,
    pub manifests: Vec<(String, Manifest)>,
    /// Build-service bearer token of the task owner.
    pub oauth_token: &'a str,
    /// Task owner's username, used to synthesize job URLs.
    pub username: &'a str,
    /// Markdown note shown on the job page, e.g. the commit message.
    pub note: Option<&'a str>,
    pub secrets: bool,
}

#[derive(Deserialize)]
struct JobCreated {
    id: i64,
}

/// Lower-cases a tag candidate and strips every character outside
/// `[a-z0-9_.-]`. Idempotent; collisions between sanitized tags are
/// accepted as-is.
pub fn sanitize_tag(tag: &str) -> String {
    tag.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        .collect()
}

pub fn job_url(builds_origin: &str, username: &str, job_id: i64) -> String {
    format!("{}/~{}/job/{}", builds_origin, username, job_id)
}

/// Submits every manifest in order and returns `(name, job_url)` pairs.
pub async fn submit_build(
    http: &reqwest::Client,
    builds_origin: &str,
    submission: &BuildSubmission<'_>,
    observer: &dyn SubmitObserver,
) -> Result<Vec<(String, String)>, RelayError> {
    let mut urls = Vec::with_capacity(submission.manifests.len());
    for (name, manifest) in &submission.manifests {
        observer.preparing(name).await;

        let mut tags: Vec<String> = submission.tags.iter().map(|t| sanitize_tag(t)).collect();
        let name_tag = sanitize_tag(name);
        if !name_tag.is_empty() {
            tags.push(name_tag);
        }

        let yaml = manifest
            .to_yaml()
            .map_err(|e| RelayError::Internal(format!("manifest serialization failed: {}", e)))?;

        let resp = http
            .post(format!("{}/api/jobs", builds_origin))
            .bearer_auth(submission.oauth_token)
            .json(&serde_json::json!({
                "manifest": yaml,
                "tags": tags,
                "note": submission.note,
                "secrets": submission.secrets,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await?;
            warn!("Build service rejected job for manifest '{}': {}", name, body);
            return Err(RelayError::Submission(body));
        }

        let job: JobCreated = resp.json().await?;
        info!("Submitted manifest '{}' as job {}", name, job.id);
        observer.submitted(name, job.id).await;
        urls.push((
            name.clone(),
            job_url(builds_origin, submission.username, job.id),
        ));
    }
    Ok(urls)
}

/// Human-readable webhook response body listing what was submitted.
pub fn summary(urls: &[(String, String)]) -> String {
    let lines: Vec<String> = urls.iter().map(|(n, u)| format!("{}: {}", n, u)).collect();
    format!("Submitted:\n\n{}", lines.join("\n"))
}

/// Returns the first line of a string. Useful for commit messages.
pub fn first_line(text: &str) -> &str {
    match text.find('\n') {
        Some(idx) => &text[..idx],
        None => text,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markdown job note: escaped commit subject, short sha linked to the
/// commit page, and the author.
pub fn commit_note(
    message: &str,
    sha: &str,
    commit_url: &str,
    author_name: &str,
    author_email: &str,
) -> String {
    let short = if sha.len() >= 7 { &sha[..7] } else { sha };
    format!(
        "{}\n\n[{}]({}) &mdash; [{}](mailto:{})",
        escape_html(first_line(message)),
        short,
        commit_url,
        author_name,
        author_email
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct RecordingObserver {
        submitted: Mutex<Vec<(String, i64)>>,
    }

    #[async_trait]
    impl SubmitObserver for RecordingObserver {
        async fn preparing(&self, _name: &str) {}
        async fn submitted(&self, name: &str, job_id: i64) {
            self.submitted
                .lock()
                .unwrap()
                .push((name.to_string(), job_id));
        }
    }

    /// Local stand-in for the build service: accepts the first job, rejects
    /// every later one with a 400 and a fixed body.
    async fn accept_one_job(requests: Arc<AtomicUsize>) -> String {
        use axum::routing::post;

        let app = axum::Router::new().route(
            "/api/jobs",
            post(move || {
                let requests = requests.clone();
                async move {
                    if requests.fetch_add(1, Ordering::SeqCst) == 0 {
                        (hyper::StatusCode::OK, r#"{"id": 101}"#.to_string())
                    } else {
                        (
                            hyper::StatusCode::BAD_REQUEST,
                            "manifest is invalid".to_string(),
                        )
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_first_rejection_halts_batch_with_verbatim_body() {
        let requests = Arc::new(AtomicUsize::new(0));
        let origin = accept_one_job(requests.clone()).await;

        let manifests = vec![
            (
                "a.yml".to_string(),
                Manifest::parse("image: alpine/edge").unwrap(),
            ),
            (
                "b.yml".to_string(),
                Manifest::parse("image: debian/stable").unwrap(),
            ),
            (
                "c.yml".to_string(),
                Manifest::parse("image: alpine/edge").unwrap(),
            ),
        ];
        let observer = RecordingObserver {
            submitted: Mutex::new(Vec::new()),
        };
        let submission = BuildSubmission {
            tags: vec!["project".to_string()],
            manifests,
            oauth_token: "token",
            username: "mirell",
            note: None,
            secrets: false,
        };

        let err = submit_build(&reqwest::Client::new(), &origin, &submission, &observer)
            .await
            .unwrap_err();
        match err {
            RelayError::Submission(body) => assert_eq!(body, "manifest is invalid"),
            other => panic!("unexpected error: {:?}", other),
        }

        // The rejected manifest halts the batch: the third is never posted,
        // and only the accepted job reached the observer.
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(
            observer.submitted.lock().unwrap().as_slice(),
            &[("a.yml".to_string(), 101)]
        );
    }

    #[tokio::test]
    async fn test_accepted_jobs_accumulate_urls_in_order() {
        use axum::routing::post;

        let counter = Arc::new(AtomicUsize::new(0));
        let handler_counter = counter.clone();
        let app = axum::Router::new().route(
            "/api/jobs",
            post(move || {
                let counter = handler_counter.clone();
                async move {
                    let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    (hyper::StatusCode::OK, format!(r#"{{"id": {}}}"#, id))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let origin = format!("http://{}", addr);

        let manifests = vec![
            (
                "a.yml".to_string(),
                Manifest::parse("image: alpine/edge").unwrap(),
            ),
            (
                "b.yml".to_string(),
                Manifest::parse("image: debian/stable").unwrap(),
            ),
        ];
        let submission = BuildSubmission {
            tags: vec!["project".to_string()],
            manifests,
            oauth_token: "token",
            username: "mirell",
            note: Some("subject"),
            secrets: true,
        };

        let urls = submit_build(
            &reqwest::Client::new(),
            &origin,
            &submission,
            &NullObserver,
        )
        .await
        .unwrap();
        assert_eq!(
            urls,
            vec![
                ("a.yml".to_string(), format!("{}/~mirell/job/1", origin)),
                ("b.yml".to_string(), format!("{}/~mirell/job/2", origin)),
            ]
        );
    }

    #[test]
    fn test_sanitize_tag_strips_and_lowercases() {
        assert_eq!(sanitize_tag("My Repo!"), "myrepo");
        assert_eq!(sanitize_tag("a.b_c-d"), "a.b_c-d");
        assert_eq!(sanitize_tag("Ünïcode"), "ncode");
    }

    #[test]
    fn test_sanitize_tag_idempotent() {
        for tag in ["My Repo!", "already-clean", "UPPER.case_1"] {
            let once = sanitize_tag(tag);
            assert_eq!(sanitize_tag(&once), once);
            assert!(once
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c)));
        }
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("subject\n\nbody"), "subject");
        assert_eq!(first_line("no newline"), "no newline");
    }

    #[test]
    fn test_job_url() {
        assert_eq!(
            job_url("https://builds.sr.ht", "mirell", 42),
            "https://builds.sr.ht/~mirell/job/42"
        );
    }

    #[test]
    fn test_commit_note_escapes_subject() {
        let note = commit_note(
            "fix <script> handling\n\ndetails",
            "0badc0de0badc0de",
            "https://example.org/commit/0badc0de",
            "A. Author",
            "author@example.org",
        );
        assert!(note.starts_with("fix &lt;script&gt; handling\n\n"));
        assert!(note.contains("[0badc0d](https://example.org/commit/0badc0de)"));
        assert!(note.contains("mailto:author@example.org"));
    }

    #[test]
    fn test_summary_lists_jobs() {
        let urls = vec![
            ("a.yml".to_string(), "https://b/1".to_string()),
            ("b.yml".to_string(), "https://b/2".to_string()),
        ];
        assert_eq!(summary(&urls), "Submitted:\n\na.yml: https://b/1\nb.yml: https://b/2");
    }
}
