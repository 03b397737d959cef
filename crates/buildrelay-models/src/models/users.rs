// src/models/users.rs

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user: the owner of tasks and provider authorizations.
///
/// `oauth_token` is the user's bearer token for the build service and is what
/// authenticates job submissions made on their behalf.
#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub oauth_token: String,
}

#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub oauth_token: String,
}

impl NewUser {
    pub fn new(username: String, oauth_token: String) -> Result<Self, String> {
        if username.trim().is_empty() {
            return Err("Username cannot be empty".to_string());
        }
        if oauth_token.trim().is_empty() {
            return Err("OAuth token cannot be empty".to_string());
        }
        Ok(NewUser {
            username,
            oauth_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_success() {
        let user = NewUser::new("mirell".to_string(), "token123".to_string()).unwrap();
        assert_eq!(user.username, "mirell");
    }

    #[test]
    fn test_new_user_empty_fields() {
        assert!(NewUser::new("".to_string(), "token".to_string()).is_err());
        assert!(NewUser::new("name".to_string(), "  ".to_string()).is_err());
    }
}
