/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::dal::DAL;
use buildrelay_models::models::users::{NewUser, User};
use buildrelay_models::schema::users;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for user operations.
pub struct UsersDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> UsersDAL<'a> {
    /// Creates a new user in the database.
    ///
    /// # Arguments
    ///
    /// * `new_user` - A reference to the NewUser struct containing the user details.
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created User on success, or a diesel::result::Error on failure.
    pub fn create(&self, new_user: &NewUser) -> Result<User, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(users::table)
            .values(new_user)
            .get_result(conn)
    }

    /// Retrieves a user by its UUID.
    pub fn get(&self, user_uuid: Uuid) -> Result<Option<User>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        users::table
            .filter(users::id.eq(user_uuid))
            .first(conn)
            .optional()
    }

    /// Retrieves a user by username.
    pub fn get_by_username(&self, name: &str) -> Result<Option<User>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        users::table
            .filter(users::username.eq(name))
            .first(conn)
            .optional()
    }

    /// Creates the user if absent, otherwise refreshes their build-service
    /// OAuth token. Returns the stored row either way.
    pub fn upsert(&self, new_user: &NewUser) -> Result<User, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(users::table)
            .values(new_user)
            .on_conflict(users::username)
            .do_update()
            .set(users::oauth_token.eq(&new_user.oauth_token))
            .get_result(conn)
    }
}
