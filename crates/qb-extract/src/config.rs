// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative extraction rules: "a declarative map from
//! containing path to symbol type", and the context-key-to-ref-type
//! mapping for references. Configuration, not logic — the walker in
//! [`crate::walk`] is the same regardless of what these tables say.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read extraction rules at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse extraction rules: {0}")]
    Hcl(#[from] hcl::Error),
}

/// `symbol_rule { path_prefix = "common/traits/" symbol_type = "trait" }`
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolRule {
    pub path_prefix: String,
    pub symbol_type: String,
    /// When set, only top-level keys whose value matches
    /// `<namespace>.<number>` count (events, event_chains); the namespace
    /// becomes `Symbol::scope`.
    #[serde(default)]
    pub namespaced: bool,
}

/// `ref_rule { key = "add_trait" ref_type = "trait_ref" }`
#[derive(Debug, Clone, Deserialize)]
pub struct RefRule {
    pub key: String,
    pub ref_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtractionDoc {
    #[serde(default)]
    symbol_rule: Vec<SymbolRule>,
    #[serde(default)]
    ref_rule: Vec<RefRule>,
}

/// The full extraction rule set.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub symbol_rules: Vec<SymbolRule>,
    pub ref_rules: Vec<RefRule>,
}

impl ExtractionConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let doc: ExtractionDoc = hcl::from_str(text)?;
        Ok(ExtractionConfig {
            symbol_rules: doc.symbol_rule,
            ref_rules: doc.ref_rule,
        })
    }

    /// The canonical CK3 rule set: traits, scripted effects/triggers/values,
    /// events and event chains, decisions, on_actions, plus the common
    /// reference shapes called out by example.
    pub fn default_ck3() -> Self {
        ExtractionConfig {
            symbol_rules: vec![
                SymbolRule {
                    path_prefix: "common/traits/".into(),
                    symbol_type: "trait".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "common/scripted_effects/".into(),
                    symbol_type: "scripted_effect".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "common/scripted_triggers/".into(),
                    symbol_type: "scripted_trigger".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "common/scripted_values/".into(),
                    symbol_type: "scripted_value".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "common/decisions/".into(),
                    symbol_type: "decision".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "common/on_action/".into(),
                    symbol_type: "on_action".into(),
                    namespaced: false,
                },
                SymbolRule {
                    path_prefix: "events/".into(),
                    symbol_type: "event".into(),
                    namespaced: true,
                },
                SymbolRule {
                    path_prefix: "common/event_chains/".into(),
                    symbol_type: "event".into(),
                    namespaced: true,
                },
            ],
            ref_rules: vec![
                RefRule { key: "add_trait".into(), ref_type: "trait_ref".into() },
                RefRule { key: "remove_trait".into(), ref_type: "trait_ref".into() },
                RefRule { key: "has_trait".into(), ref_type: "trait_ref".into() },
                RefRule { key: "trigger_event".into(), ref_type: "event_ref".into() },
                RefRule { key: "run_effect".into(), ref_type: "scripted_effect_ref".into() },
                RefRule { key: "custom_tooltip".into(), ref_type: "scripted_effect_ref".into() },
            ],
        }
    }

    /// The symbol rule applying to a path, if any (first match wins, same
    /// stance as the router).
    pub fn rule_for_path<'a>(&'a self, relative_path: &str) -> Option<&'a SymbolRule> {
        self.symbol_rules
            .iter()
            .find(|rule| relative_path.starts_with(rule.path_prefix.as_str()))
    }

    pub fn ref_type_for_key(&self, key: &str) -> Option<&str> {
        self.ref_rules
            .iter()
            .find(|rule| rule.key == key)
            .map(|rule| rule.ref_type.as_str())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
