//! Data models for our application to interact with
pub mod github;
pub mod gitlab;
pub mod tasks;
pub mod users;

pub use github::{
    GitHubAuthorization, GitHubCommitHook, GitHubPrHook, NewGitHubAuthorization,
    NewGitHubCommitHook, NewGitHubPrHook,
};
pub use gitlab::{
    GitLabAuthorization, GitLabCommitHook, GitLabMrHook, NewGitLabAuthorization,
    NewGitLabCommitHook, NewGitLabMrHook,
};
pub use tasks::{NewTask, Task};
pub use users::{NewUser, User};
