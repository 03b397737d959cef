/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Shared application state handed to every request handler.

use std::sync::Arc;

use buildrelay_utils::Settings;

use crate::dal::DAL;
use crate::token::TokenCodec;

/// Everything a handler needs: the data layer, configuration, the token
/// codec (key derived once at startup), and a pooled HTTP client for
/// provider and build-service calls.
#[derive(Clone)]
pub struct AppState {
    pub dal: DAL,
    pub settings: Arc<Settings>,
    pub codec: Arc<TokenCodec>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(dal: DAL, settings: Settings) -> Self {
        let codec = Arc::new(TokenCodec::new(&settings.server.secret_key));
        AppState {
            dal,
            settings: Arc::new(settings),
            codec,
            http: reqwest::Client::new(),
        }
    }
}
