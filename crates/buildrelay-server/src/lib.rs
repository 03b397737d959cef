/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Buildrelay Server
//!
//! `buildrelay-server` relays source-control events from GitHub and GitLab
//! into build jobs on builds.sr.ht, and relays job completion status back to
//! the provider as commit statuses. Completion correlation survives only in
//! an encrypted notification token round-tripped through the callback URL.

pub mod api;
pub mod builds;
pub mod dal;
pub mod db;
pub mod error;
pub mod providers;
pub mod state;
pub mod token;
