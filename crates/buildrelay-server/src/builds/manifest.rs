/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Build manifest document model.
//!
//! Only the fields the relay rewrites are modeled (`sources`,
//! `environment`, `triggers`); everything else in the document is carried
//! through untouched so the build service sees the author's manifest, not
//! our interpretation of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub action: String,
    pub condition: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Trigger {
    /// An unconditional webhook trigger pointing at a completion callback.
    pub fn webhook(url: String) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert("url".to_string(), serde_yaml::Value::String(url));
        Trigger {
            action: "webhook".to_string(),
            condition: "always".to_string(),
            extra,
        }
    }
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
image: alpine/edge
packages:
  - rustup
sources:
  - https://git.example.org/~user/project
environment:
  CARGO_TERM_COLOR: always
tasks:
  - build: cargo build
"#;

    #[test]
    fn test_parse_models_rewritten_fields() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.sources.len(), 1);
        assert!(manifest.environment.contains_key("CARGO_TERM_COLOR"));
        assert!(manifest.triggers.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let text = manifest.to_yaml().unwrap();
        let again = Manifest::parse(&text).unwrap();
        assert_eq!(
            again.rest.get("image"),
            Some(&serde_yaml::Value::String("alpine/edge".to_string()))
        );
        assert!(again.rest.contains_key("tasks"));
    }

    #[test]
    fn test_webhook_trigger_serializes_flat() {
        let trigger = Trigger::webhook("https://relay.example.org/x".to_string());
        let text = serde_yaml::to_string(&trigger).unwrap();
        assert!(text.contains("action: webhook"));
        assert!(text.contains("condition: always"));
        assert!(text.contains("url: https://relay.example.org/x"));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(Manifest::parse("sources: {bad: [").is_err());
    }
}
