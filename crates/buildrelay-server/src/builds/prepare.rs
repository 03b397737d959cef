/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Manifest discovery and rewrite.
//!
//! Discovery reads the repository tree at a pinned revision through a
//! provider-supplied [`RepoFiles`] capability: first the well-known
//! `.build.yml`, then every `.yml` entry under `.builds/`. A repository with
//! neither is a normal outcome, not an error.
//!
//! Rewrite pins each manifest to the triggering commit: source URLs that
//! reference the repository under build are replaced with a revision-locked
//! clone reference, caller environment wins over manifest environment, and
//! exactly one unconditional webhook trigger is appended carrying the
//! completion callback URL.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::builds::manifest::{Manifest, Trigger};
use crate::error::RelayError;

pub const WELL_KNOWN_MANIFEST: &str = ".build.yml";
pub const MANIFEST_DIR: &str = ".builds";

/// Read-only view of a repository tree at one revision.
#[async_trait]
pub trait RepoFiles: Sync {
    /// Reads a file's text content; `None` when the path does not exist.
    async fn read_file(&self, path: &str) -> Result<Option<String>, RelayError>;

    /// Lists file paths directly under a directory; empty when the
    /// directory does not exist.
    async fn list_dir(&self, path: &str) -> Result<Vec<String>, RelayError>;
}

/// Finds raw manifest texts at the pinned revision.
///
/// Returns `(name, text)` pairs. The well-known single manifest has an empty
/// name so its status context is the bare service label; directory entries
/// are named by file name. `None` means the repository has no build
/// configuration at all.
pub async fn discover_manifests(
    files: &dyn RepoFiles,
) -> Result<Option<Vec<(String, String)>>, RelayError> {
    if let Some(text) = files.read_file(WELL_KNOWN_MANIFEST).await? {
        return Ok(Some(vec![(String::new(), text)]));
    }

    let mut found = Vec::new();
    for path in files.list_dir(MANIFEST_DIR).await? {
        if !path.ends_with(".yml") {
            continue;
        }
        if let Some(text) = files.read_file(&path).await? {
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            found.push((name, text));
        }
    }

    if found.is_empty() {
        Ok(None)
    } else {
        Ok(Some(found))
    }
}

/// Identity of a repository as a build source.
#[derive(Debug, Clone)]
pub struct SourceRepo {
    /// Short repository name (no namespace).
    pub name: String,
    pub clone_url: String,
    pub ssh_url: String,
    pub private: bool,
}

/// Pins a manifest source reference to the triggering commit.
///
/// A source that does not reference the repository under build passes
/// through untouched. A fork (head repository differs from base) becomes
/// `base_name::head_clone_url#revision` so multiple checkouts stay
/// distinguishable; otherwise the repository's own URL is used, SSH form
/// when it is private.
pub fn rewrite_source(source: &str, head: &SourceRepo, base: &SourceRepo, revision: &str) -> String {
    if !source.ends_with(&format!("/{}", base.name)) {
        return source.to_string();
    }
    if base.name != head.name {
        return format!("{}::{}#{}", base.name, head.clone_url, revision);
    }
    if head.private {
        format!("{}#{}", head.ssh_url, revision)
    } else {
        format!("{}#{}", head.clone_url, revision)
    }
}

/// Caller-side inputs to the rewrite pass.
pub struct PrepareContext<'a> {
    /// Repository whose content is being built (PR head, or the repo itself).
    pub head: &'a SourceRepo,
    /// Repository that owns the hook (PR base, or the repo itself).
    pub base: &'a SourceRepo,
    pub revision: &'a str,
    /// Environment injected into every manifest; wins on key collision.
    pub env: &'a BTreeMap<String, String>,
}

/// Parses and rewrites every discovered manifest.
///
/// The first parse error aborts the whole batch with a `Manifest` error
/// naming the offending file; siblings already parsed are dropped, nothing
/// is submitted. `notify_url` mints the per-manifest completion callback
/// from the manifest's name.
pub fn prepare_manifests(
    raw: Vec<(String, String)>,
    ctx: &PrepareContext<'_>,
    mut notify_url: impl FnMut(&str) -> Result<String, RelayError>,
) -> Result<Vec<(String, Manifest)>, RelayError> {
    let mut manifests = Vec::with_capacity(raw.len());
    for (name, text) in raw {
        let mut manifest = Manifest::parse(&text).map_err(|e| RelayError::Manifest {
            file: if name.is_empty() {
                WELL_KNOWN_MANIFEST.to_string()
            } else {
                name.clone()
            },
            reason: e.to_string(),
        })?;

        manifest.sources = manifest
            .sources
            .iter()
            .map(|s| rewrite_source(s, ctx.head, ctx.base, ctx.revision))
            .collect();

        for (key, value) in ctx.env {
            manifest
                .environment
                .insert(key.clone(), serde_yaml::Value::String(value.clone()));
        }

        let url = notify_url(&name)?;
        manifest.triggers.push(Trigger::webhook(url));

        manifests.push((name, manifest));
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRepo {
        files: Vec<(&'static str, &'static str)>,
        dirs: Vec<(&'static str, Vec<&'static str>)>,
    }

    #[async_trait]
    impl RepoFiles for FakeRepo {
        async fn read_file(&self, path: &str) -> Result<Option<String>, RelayError> {
            Ok(self
                .files
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, text)| text.to_string()))
        }

        async fn list_dir(&self, path: &str) -> Result<Vec<String>, RelayError> {
            Ok(self
                .dirs
                .iter()
                .find(|(p, _)| *p == path)
                .map(|(_, entries)| entries.iter().map(|e| e.to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn repo(name: &str, private: bool) -> SourceRepo {
        SourceRepo {
            name: name.to_string(),
            clone_url: format!("https://example.org/owner/{}", name),
            ssh_url: format!("git@example.org:owner/{}", name),
            private,
        }
    }

    #[tokio::test]
    async fn test_discover_prefers_well_known_manifest() {
        let files = FakeRepo {
            files: vec![(".build.yml", "image: alpine/edge")],
            dirs: vec![(".builds", vec![".builds/a.yml"])],
        };
        let found = discover_manifests(&files).await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "");
    }

    #[tokio::test]
    async fn test_discover_reads_manifest_dir() {
        let files = FakeRepo {
            files: vec![
                (".builds/a.yml", "image: alpine/edge"),
                (".builds/b.yml", "image: debian/stable"),
                (".builds/README", "not a manifest"),
            ],
            dirs: vec![(
                ".builds",
                vec![".builds/a.yml", ".builds/b.yml", ".builds/README"],
            )],
        };
        let found = discover_manifests(&files).await.unwrap().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "a.yml");
        assert_eq!(found[1].0, "b.yml");
    }

    #[tokio::test]
    async fn test_discover_empty_repo() {
        let files = FakeRepo {
            files: vec![],
            dirs: vec![],
        };
        assert!(discover_manifests(&files).await.unwrap().is_none());
    }

    #[test]
    fn test_rewrite_unrelated_source_untouched() {
        let base = repo("project", false);
        let rewritten = rewrite_source("https://other.org/lib/other", &base, &base, "abc123");
        assert_eq!(rewritten, "https://other.org/lib/other");
    }

    #[test]
    fn test_rewrite_public_repo_uses_clone_url() {
        let base = repo("project", false);
        let rewritten =
            rewrite_source("https://example.org/owner/project", &base, &base, "abc123");
        assert_eq!(rewritten, "https://example.org/owner/project#abc123");
    }

    #[test]
    fn test_rewrite_private_repo_uses_ssh_url() {
        let base = repo("project", true);
        let rewritten =
            rewrite_source("https://example.org/owner/project", &base, &base, "abc123");
        assert_eq!(rewritten, "git@example.org:owner/project#abc123");
    }

    #[test]
    fn test_rewrite_fork_is_name_qualified() {
        let head = repo("fork", false);
        let base = repo("project", false);
        let rewritten =
            rewrite_source("https://example.org/owner/project", &head, &base, "abc123");
        assert_eq!(
            rewritten,
            "project::https://example.org/owner/fork#abc123"
        );
    }

    #[test]
    fn test_prepare_injects_env_and_trigger() {
        let base = repo("project", false);
        let mut env = BTreeMap::new();
        env.insert("GITHUB_REF".to_string(), "refs/heads/main".to_string());
        env.insert("CARGO_TERM_COLOR".to_string(), "never".to_string());
        let ctx = PrepareContext {
            head: &base,
            base: &base,
            revision: "abc123",
            env: &env,
        };
        let raw = vec![(
            String::new(),
            "image: alpine/edge\nenvironment:\n  CARGO_TERM_COLOR: always\n".to_string(),
        )];
        let prepared =
            prepare_manifests(raw, &ctx, |name| Ok(format!("https://cb/{}", name))).unwrap();
        let (_, manifest) = &prepared[0];
        // Caller environment wins on collision.
        assert_eq!(
            manifest.environment.get("CARGO_TERM_COLOR"),
            Some(&serde_yaml::Value::String("never".to_string()))
        );
        assert_eq!(
            manifest.environment.get("GITHUB_REF"),
            Some(&serde_yaml::Value::String("refs/heads/main".to_string()))
        );
        assert_eq!(manifest.triggers.len(), 1);
        assert_eq!(manifest.triggers[0].action, "webhook");
        assert_eq!(manifest.triggers[0].condition, "always");
    }

    #[test]
    fn test_prepare_aborts_on_first_parse_error() {
        let base = repo("project", false);
        let env = BTreeMap::new();
        let ctx = PrepareContext {
            head: &base,
            base: &base,
            revision: "abc123",
            env: &env,
        };
        let raw = vec![
            ("a.yml".to_string(), "image: alpine/edge".to_string()),
            ("b.yml".to_string(), "sources: {bad: [".to_string()),
        ];
        let err = prepare_manifests(raw, &ctx, |_| Ok("https://cb".to_string())).unwrap_err();
        match err {
            RelayError::Manifest { file, .. } => assert_eq!(file, "b.yml"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unnamed_manifest_error_uses_well_known_file() {
        let base = repo("project", false);
        let env = BTreeMap::new();
        let ctx = PrepareContext {
            head: &base,
            base: &base,
            revision: "abc123",
            env: &env,
        };
        let raw = vec![(String::new(), "sources: {bad: [".to_string())];
        let err = prepare_manifests(raw, &ctx, |_| Ok("https://cb".to_string())).unwrap_err();
        match err {
            RelayError::Manifest { file, .. } => assert_eq!(file, ".build.yml"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
