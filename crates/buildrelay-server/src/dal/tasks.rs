/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use crate::dal::DAL;
use buildrelay_models::models::tasks::{NewTask, Task};
use buildrelay_models::schema::tasks;
use diesel::prelude::*;
use uuid::Uuid;

/// Data Access Layer for task operations.
pub struct TasksDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl<'a> TasksDAL<'a> {
    /// Creates a new task in the database.
    ///
    /// # Arguments
    ///
    /// * `new_task` - A reference to the NewTask struct containing the task details.
    ///
    /// # Returns
    ///
    /// Returns a Result containing the created Task on success, or a diesel::result::Error on failure.
    pub fn create(&self, new_task: &NewTask) -> Result<Task, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::insert_into(tasks::table)
            .values(new_task)
            .get_result(conn)
    }

    /// Retrieves a task by its UUID.
    pub fn get(&self, task_uuid: Uuid) -> Result<Option<Task>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        tasks::table
            .filter(tasks::id.eq(task_uuid))
            .first(conn)
            .optional()
    }

    /// Lists all tasks belonging to a user.
    pub fn list_for_user(&self, user_uuid: Uuid) -> Result<Vec<Task>, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        tasks::table
            .filter(tasks::user_id.eq(user_uuid))
            .order(tasks::created_at.asc())
            .load::<Task>(conn)
    }

    /// Hard deletes a task. Hook records cascade.
    pub fn delete(&self, task_uuid: Uuid) -> Result<usize, diesel::result::Error> {
        let conn = &mut self.dal.pool.get().expect("Failed to get DB connection");
        diesel::delete(tasks::table.filter(tasks::id.eq(task_uuid))).execute(conn)
    }
}
