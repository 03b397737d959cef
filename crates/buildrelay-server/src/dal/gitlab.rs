/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Queries for GitLab authorizations and hook records.
//!
//! Authorizations are keyed by (user, upstream host) since a user may hold
//! grants on several federated instances.

use crate::dal::DAL;
use buildrelay_models::models::gitlab::{
    GitLabAuthorization, GitLabCommitHook, GitLabMrHook, NewGitLabAuthorization,
    NewGitLabCommitHook, NewGitLabMrHook,
};
use buildrelay_models::schema::{gitlab_authorizations, gitlab_commit_hooks, gitlab_mr_hooks};
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for GitLab authorizations and hook records.
pub struct GitLabDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> GitLabDAL<'a> {
    /// Retrieves a user's authorization for one upstream, if present.
    pub fn get_authorization(
        &self,
        user_uuid: Uuid,
        upstream: &str,
    ) -> Result<Option<GitLabAuthorization>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        gitlab_authorizations::table
            .filter(gitlab_authorizations::user_id.eq(user_uuid))
            .filter(gitlab_authorizations::upstream.eq(upstream))
            .first(conn)
            .optional()
    }

    /// Stores a fresh authorization for one upstream, replacing any previous
    /// grant for the same (user, upstream) pair.
    pub fn upsert_authorization(
        &self,
        new_auth: &NewGitLabAuthorization,
    ) -> Result<GitLabAuthorization, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::delete(
            gitlab_authorizations::table
                .filter(gitlab_authorizations::user_id.eq(new_auth.user_id))
                .filter(gitlab_authorizations::upstream.eq(&new_auth.upstream)),
        )
        .execute(conn)?;
        diesel::insert_into(gitlab_authorizations::table)
            .values(new_auth)
            .get_result(conn)
    }

    /// Deletes a user's authorization for one upstream.
    pub fn delete_authorization(
        &self,
        user_uuid: Uuid,
        upstream: &str,
    ) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::delete(
            gitlab_authorizations::table
                .filter(gitlab_authorizations::user_id.eq(user_uuid))
                .filter(gitlab_authorizations::upstream.eq(upstream)),
        )
        .execute(conn)
    }

    /// Creates a commit hook record.
    pub fn create_commit_hook(
        &self,
        new_hook: &NewGitLabCommitHook,
    ) -> Result<GitLabCommitHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(gitlab_commit_hooks::table)
            .values(new_hook)
            .get_result(conn)
    }

    /// Retrieves a commit hook record by its UUID.
    pub fn get_commit_hook(
        &self,
        hook_uuid: Uuid,
    ) -> Result<Option<GitLabCommitHook>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        gitlab_commit_hooks::table
            .filter(gitlab_commit_hooks::id.eq(hook_uuid))
            .first(conn)
            .optional()
    }

    /// Records the provider-assigned webhook id on a commit hook.
    pub fn set_commit_hook_webhook_id(
        &self,
        hook_uuid: Uuid,
        webhook_id: i64,
    ) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(gitlab_commit_hooks::table.filter(gitlab_commit_hooks::id.eq(hook_uuid)))
            .set(gitlab_commit_hooks::webhook_id.eq(webhook_id))
            .execute(conn)
    }

    /// Updates an existing commit hook record.
    pub fn update_commit_hook(
        &self,
        hook_uuid: Uuid,
        updated: &GitLabCommitHook,
    ) -> Result<GitLabCommitHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(gitlab_commit_hooks::table.filter(gitlab_commit_hooks::id.eq(hook_uuid)))
            .set(updated)
            .get_result(conn)
    }

    /// Creates a merge request hook record.
    pub fn create_mr_hook(
        &self,
        new_hook: &NewGitLabMrHook,
    ) -> Result<GitLabMrHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(gitlab_mr_hooks::table)
            .values(new_hook)
            .get_result(conn)
    }

    /// Retrieves a merge request hook record by its UUID.
    pub fn get_mr_hook(
        &self,
        hook_uuid: Uuid,
    ) -> Result<Option<GitLabMrHook>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        gitlab_mr_hooks::table
            .filter(gitlab_mr_hooks::id.eq(hook_uuid))
            .first(conn)
            .optional()
    }

    /// Records the provider-assigned webhook id on a merge request hook.
    pub fn set_mr_hook_webhook_id(
        &self,
        hook_uuid: Uuid,
        webhook_id: i64,
    ) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(gitlab_mr_hooks::table.filter(gitlab_mr_hooks::id.eq(hook_uuid)))
            .set(gitlab_mr_hooks::webhook_id.eq(webhook_id))
            .execute(conn)
    }

    /// Updates an existing merge request hook record.
    pub fn update_mr_hook(
        &self,
        hook_uuid: Uuid,
        updated: &GitLabMrHook,
    ) -> Result<GitLabMrHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(gitlab_mr_hooks::table.filter(gitlab_mr_hooks::id.eq(hook_uuid)))
            .set(updated)
            .get_result(conn)
    }
}
