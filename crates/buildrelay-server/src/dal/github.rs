/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Queries for GitHub authorizations and hook records.

use crate::dal::DAL;
use buildrelay_models::models::github::{
    GitHubAuthorization, GitHubCommitHook, GitHubPrHook, NewGitHubAuthorization,
    NewGitHubCommitHook, NewGitHubPrHook,
};
use buildrelay_models::schema::{github_authorizations, github_commit_hooks, github_pr_hooks};
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for GitHub authorizations and hook records.
pub struct GitHubDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> GitHubDAL<'a> {
    /// Retrieves a user's GitHub authorization, if they have one.
    pub fn get_authorization(
        &self,
        user_uuid: Uuid,
    ) -> Result<Option<GitHubAuthorization>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        github_authorizations::table
            .filter(github_authorizations::user_id.eq(user_uuid))
            .first(conn)
            .optional()
    }

    /// Stores a fresh authorization, replacing any previous grant. At most
    /// one row per user survives.
    pub fn upsert_authorization(
        &self,
        new_auth: &NewGitHubAuthorization,
    ) -> Result<GitHubAuthorization, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::delete(
            github_authorizations::table
                .filter(github_authorizations::user_id.eq(new_auth.user_id)),
        )
        .execute(conn)?;
        diesel::insert_into(github_authorizations::table)
            .values(new_auth)
            .get_result(conn)
    }

    /// Deletes a user's authorization. Done when GitHub rejects the stored
    /// token so the user is prompted to re-authorize.
    pub fn delete_authorization(&self, user_uuid: Uuid) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::delete(
            github_authorizations::table.filter(github_authorizations::user_id.eq(user_uuid)),
        )
        .execute(conn)
    }

    /// Creates a commit hook record.
    pub fn create_commit_hook(
        &self,
        new_hook: &NewGitHubCommitHook,
    ) -> Result<GitHubCommitHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(github_commit_hooks::table)
            .values(new_hook)
            .get_result(conn)
    }

    /// Retrieves a commit hook record by its UUID.
    pub fn get_commit_hook(
        &self,
        hook_uuid: Uuid,
    ) -> Result<Option<GitHubCommitHook>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        github_commit_hooks::table
            .filter(github_commit_hooks::id.eq(hook_uuid))
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
        diesel::update(github_commit_hooks::table.filter(github_commit_hooks::id.eq(hook_uuid)))
            .set(github_commit_hooks::webhook_id.eq(webhook_id))
            .execute(conn)
    }

    /// Updates an existing commit hook record.
    pub fn update_commit_hook(
        &self,
        hook_uuid: Uuid,
        updated: &GitHubCommitHook,
    ) -> Result<GitHubCommitHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(github_commit_hooks::table.filter(github_commit_hooks::id.eq(hook_uuid)))
            .set(updated)
            .get_result(conn)
    }

    /// Creates a pull request hook record.
    pub fn create_pr_hook(
        &self,
        new_hook: &NewGitHubPrHook,
    ) -> Result<GitHubPrHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(github_pr_hooks::table)
            .values(new_hook)
            .get_result(conn)
    }

    /// Retrieves a pull request hook record by its UUID.
    pub fn get_pr_hook(
        &self,
        hook_uuid: Uuid,
    ) -> Result<Option<GitHubPrHook>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        github_pr_hooks::table
            .filter(github_pr_hooks::id.eq(hook_uuid))
            .first(conn)
            .optional()
    }

    /// Records the provider-assigned webhook id on a pull request hook.
    pub fn set_pr_hook_webhook_id(
        &self,
        hook_uuid: Uuid,
        webhook_id: i64,
    ) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(github_pr_hooks::table.filter(github_pr_hooks::id.eq(hook_uuid)))
            .set(github_pr_hooks::webhook_id.eq(webhook_id))
            .execute(conn)
    }

    /// Updates an existing pull request hook record.
    pub fn update_pr_hook(
        &self,
        hook_uuid: Uuid,
        updated: &GitHubPrHook,
    ) -> Result<GitHubPrHook, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::update(github_pr_hooks::table.filter(github_pr_hooks::id.eq(hook_uuid)))
            .set(updated)
            .get_result(conn)
    }
}
