// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The routing table: a human-authored HCL document declaring the
//! canonical envelopes and the ordered glob patterns that assign a path to
//! one of them.

use crate::error::RouterError;
use glob::Pattern;
use qb_core::model::{Envelope, Step};
use serde::Deserialize;
use std::path::Path;

/// `envelope "NAME" { steps = [...] }` — must restate one of the canonical
/// envelopes' step list exactly; this is purely a startup cross-check, not
/// a way to define new envelopes (the canonical set is fixed by
/// [`qb_core::model::Envelope`]).
#[derive(Debug, Clone, Deserialize)]
struct EnvelopeBlock {
    name: String,
    steps: Vec<String>,
}

/// `route { pattern = "..." envelope = "..." }` (or `envelope = "SKIP"` to
/// explicitly mark matching paths as not indexed). Evaluated top-to-bottom;
/// first match wins.
#[derive(Debug, Clone, Deserialize)]
struct RouteBlock {
    pattern: String,
    envelope: String,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct RoutingDoc {
    #[serde(default)]
    envelope: Vec<EnvelopeBlock>,
    #[serde(default)]
    route: Vec<RouteBlock>,
}

/// What a route resolves to: an indexed envelope, or an explicit skip.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Route { envelope: Envelope, steps: Vec<Step> },
    Skip,
}

#[derive(Debug, Clone)]
enum RouteTarget {
    Envelope(Envelope),
    Skip,
}

struct CompiledRoute {
    pattern: Pattern,
    target: RouteTarget,
    priority: i32,
    source_pattern: String,
}

/// A loaded, validated routing table: the sole authority the router
/// consults (never file contents, prior build state, or
/// heuristics).
pub struct RoutingTable {
    routes: Vec<CompiledRoute>,
}

impl RoutingTable {
    /// Load and validate a routing table from an HCL file. Fails daemon
    /// startup (per) if the file is missing, malformed, declares
    /// an unknown envelope, restates a canonical envelope's steps
    /// incorrectly, or routes to an undeclared envelope.
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path).map_err(|source| RouterError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate routing table source text directly (used by
    /// tests and by callers that already hold the text in memory).
    pub fn parse(text: &str) -> Result<Self, RouterError> {
        let doc: RoutingDoc = hcl::from_str(text)?;

        let mut declared = std::collections::HashSet::new();
        for block in &doc.envelope {
            let envelope = Envelope::parse(&block.name).ok_or_else(|| RouterError::UnknownEnvelope {
                name: block.name.clone(),
            })?;
            let canonical: Vec<String> = envelope.steps().iter().map(Step::name).collect();
            if block.steps != canonical {
                return Err(RouterError::StepMismatch {
                    envelope: block.name.clone(),
                    declared: block.steps.clone(),
                    canonical,
                });
            }
            declared.insert(block.name.clone());
        }

        let mut routes = Vec::with_capacity(doc.route.len());
        for (i, block) in doc.route.into_iter().enumerate() {
            let target = if block.envelope == "SKIP" {
                RouteTarget::Skip
            } else {
                if !declared.contains(&block.envelope) {
                    return Err(RouterError::UndeclaredEnvelope {
                        pattern: block.pattern.clone(),
                        envelope: block.envelope.clone(),
                    });
                }
                let envelope =
                    Envelope::parse(&block.envelope).ok_or_else(|| RouterError::UnknownEnvelope {
                        name: block.envelope.clone(),
                    })?;
                RouteTarget::Envelope(envelope)
            };

            let normalized = normalize(&block.pattern);
            let pattern = Pattern::new(&normalized).map_err(|source| RouterError::InvalidPattern {
                pattern: block.pattern.clone(),
                source,
            })?;

            // Stable sort key: declared priority first (higher wins ties
            // only in the sense of grouping), but first-match-wins is by
            // table order within equal priority, so we only use priority
            // to allow later entries to override earlier general globs
            // without reordering the whole file. Default is simply
            // declaration order (priority 0 for all => stable).
            routes.push(CompiledRoute {
                pattern,
                target,
                priority: block.priority,
                source_pattern: block.pattern.clone(),
            });
            let _ = i;
        }

        // Stable sort: higher priority first, ties preserve file order.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(RoutingTable { routes })
    }

    /// Route a relative path (contract). Case-insensitive, slash
    /// normalized. Returns [`RouterError::Unmatched`] if no pattern fires.
    pub fn route(&self, relative_path: &str) -> Result<RouteOutcome, RouterError> {
        let normalized = normalize(relative_path);
        for route in &self.routes {
            if route.pattern.matches(&normalized) {
                return Ok(match &route.target {
                    RouteTarget::Skip => RouteOutcome::Skip,
                    RouteTarget::Envelope(envelope) => RouteOutcome::Route {
                        envelope: *envelope,
                        steps: envelope.steps(),
                    },
                });
            }
        }
        Err(RouterError::Unmatched {
            path: relative_path.to_string(),
        })
    }

    /// The patterns that did not match anything, in table order — useful
    /// for `status`/diagnostics tooling, not required by the core contract.
    pub fn pattern_count(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    fn source_patterns(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.source_pattern.as_str()).collect()
    }
}

/// Forward-slash, lowercase normalization applied identically to the
/// pattern and the path being matched ("matching is
/// case-insensitive"; glob patterns have no native case-fold mode).
fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
