/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Everything between "webhook payload understood" and "job running on
//! builds.sr.ht": the manifest document model, discovery and rewrite, and
//! the submission gateway.

pub mod manifest;
pub mod prepare;
pub mod submit;

pub use manifest::{Manifest, Trigger};
pub use prepare::{
    discover_manifests, prepare_manifests, rewrite_source, PrepareContext, RepoFiles, SourceRepo,
};
pub use submit::{
    commit_note, first_line, job_url, sanitize_tag, submit_build, summary, BuildSubmission,
    NullObserver, SubmitObserver,
};

/// Status-context label shown in the provider UI, one per manifest. The
/// single well-known manifest gets the bare service label.
pub fn context(name: &str) -> String {
    if name.is_empty() {
        "builds.sr.ht".to_string()
    } else {
        format!("builds.sr.ht: {}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_labels() {
        assert_eq!(context(""), "builds.sr.ht");
        assert_eq!(context("a.yml"), "builds.sr.ht: a.yml");
    }
}
