/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Buildrelay Models
//!
//! Database models for buildrelay: users, tasks, provider authorizations, and
//! the hook records binding an external repository to a task.

pub mod models;
pub mod schema;
