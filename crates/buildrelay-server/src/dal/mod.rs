/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data access layer.
//!
//! One `DAL` owns the connection pool; per-table DALs borrow it and expose
//! the query surface. Hook records are looked up by their random UUID, which
//! doubles as the webhook URL path segment.

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

mod github;
mod gitlab;
mod tasks;
mod users;

pub use github::GitHubDAL;
pub use gitlab::GitLabDAL;
pub use tasks::TasksDAL;
pub use users::UsersDAL;

#[derive(Clone)]
pub struct DAL {
    pub pool: Pool<ConnectionManager<PgConnection>>,
}

impl DAL {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        DAL { pool }
    }

    pub fn users(&self) -> UsersDAL {
        UsersDAL { dal: self }
    }

    pub fn tasks(&self) -> TasksDAL {
        TasksDAL { dal: self }
    }

    pub fn github(&self) -> GitHubDAL {
        GitHubDAL { dal: self }
    }

    pub fn gitlab(&self) -> GitLabDAL {
        GitLabDAL { dal: self }
    }
}
