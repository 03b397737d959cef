// src/models/tasks.rs

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured relay task, e.g. "repo X pushes become build jobs".
///
/// `task_kind` names the variant that owns this task (one of the registry
/// names, e.g. "github_commit_to_build"); the kind-specific configuration
/// lives in that variant's hook record table.
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub name: String,
    pub task_kind: String,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTask {
    pub user_id: Uuid,
    pub name: String,
    pub task_kind: String,
}

impl NewTask {
    pub fn new(user_id: Uuid, name: String, task_kind: String) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Task name cannot be empty".to_string());
        }
        if task_kind.trim().is_empty() {
            return Err("Task kind cannot be empty".to_string());
        }
        Ok(NewTask {
            user_id,
            name,
            task_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_success() {
        let task = NewTask::new(
            Uuid::new_v4(),
            "owner/repo::github_commit_to_build".to_string(),
            "github_commit_to_build".to_string(),
        )
        .unwrap();
        assert_eq!(task.task_kind, "github_commit_to_build");
    }

    #[test]
    fn test_new_task_empty_name() {
        assert!(NewTask::new(Uuid::new_v4(), " ".to_string(), "kind".to_string()).is_err());
    }
}
