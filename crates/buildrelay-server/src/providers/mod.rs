/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Provider adapters.
//!
//! One module per provider, each implementing the same pipeline: look up the
//! hook record, authenticate with the stored grant, resolve the commit, read
//! manifests, submit, and post statuses. [`TaskKind`] is the closed registry
//! of relay variants; a task row names its kind by string and everything
//! else dispatches on the enum.

pub mod github;
pub mod gitlab;

use buildrelay_utils::Settings;

/// The four relay variants. The string forms are persisted in task rows and
/// appear in URLs, so they are stable identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    GithubCommitToBuild,
    GithubPrToBuild,
    GitlabCommitToBuild,
    GitlabMrToBuild,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::GithubCommitToBuild,
        TaskKind::GithubPrToBuild,
        TaskKind::GitlabCommitToBuild,
        TaskKind::GitlabMrToBuild,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::GithubCommitToBuild => "github_commit_to_build",
            TaskKind::GithubPrToBuild => "github_pr_to_build",
            TaskKind::GitlabCommitToBuild => "gitlab_commit_to_build",
            TaskKind::GitlabMrToBuild => "gitlab_mr_to_build",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskKind::GithubCommitToBuild => "GitHub commits -> builds.sr.ht jobs",
            TaskKind::GithubPrToBuild => "GitHub pull requests -> builds.sr.ht jobs",
            TaskKind::GitlabCommitToBuild => "GitLab commits -> builds.sr.ht jobs",
            TaskKind::GitlabMrToBuild => "GitLab merge requests -> builds.sr.ht jobs",
        }
    }

    pub fn from_name(name: &str) -> Option<TaskKind> {
        TaskKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Whether the variant's provider is configured at all. Unconfigured
    /// variants are hidden from task listings and their routes reject.
    pub fn enabled(&self, settings: &Settings) -> bool {
        match self {
            TaskKind::GithubCommitToBuild | TaskKind::GithubPrToBuild => settings.github.enabled(),
            TaskKind::GitlabCommitToBuild | TaskKind::GitlabMrToBuild => settings.gitlab.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(TaskKind::from_name("bogus"), None);
    }

    #[test]
    fn test_descriptions_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in TaskKind::ALL {
            assert!(seen.insert(kind.description()));
        }
    }
}
