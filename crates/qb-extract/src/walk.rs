// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The symbol/ref walker. Configuration-free: every decision about
//! *what* a path prefix or context key means lives in
//! [`crate::config::ExtractionConfig`]; this module only knows how to walk
//! a [`RootNode`] and turn matches into rows.

use qb_core::id::{ContentVersionId, FileId};
use qb_core::model::{Ref, ResolutionStatus, Symbol};
use qb_script::{AssignmentNode, Node, RootNode, ValueType};

use crate::config::ExtractionConfig;

/// Extract every top-level [`Symbol`] this file's path matches a rule for,
/// plus every [`Ref`] found while walking each symbol's value subtree.
pub fn extract(
    root: &RootNode,
    relative_path: &str,
    file_id: FileId,
    content_version_id: &ContentVersionId,
    config: &ExtractionConfig,
) -> (Vec<Symbol>, Vec<Ref>) {
    let Some(rule) = config.rule_for_path(relative_path) else {
        return (Vec::new(), Vec::new());
    };

    let mut symbols = Vec::new();
    let mut refs = Vec::new();

    for (index, child) in root.children.iter().enumerate() {
        let Node::Block(block) = child else {
            continue;
        };
        let Some(raw_name) = &block.name else {
            continue;
        };

        let (name, scope) = if rule.namespaced {
            match split_namespaced(raw_name) {
                Some((namespace, local)) => (local.to_string(), Some(namespace.to_string())),
                None => continue,
            }
        } else {
            (raw_name.clone(), None)
        };

        let ast_node_path = format!("/children/{index}");
        let symbol_id = qb_core::id::SymbolId::new(format!(
            "{file_id}:{ast_node_path}:{}:{name}",
            rule.symbol_type
        ));

        symbols.push(Symbol {
            symbol_id,
            file_id,
            content_version_id: content_version_id.clone(),
            ast_node_path: ast_node_path.clone(),
            line_number: block.line,
            column_number: block.column,
            symbol_type: rule.symbol_type.clone(),
            name,
            scope,
            metadata_json: serde_json::Value::Null,
        });

        walk_refs(
            &block.children,
            &ast_node_path,
            None,
            file_id,
            content_version_id,
            config,
            &mut refs,
        );
    }

    (symbols, refs)
}

/// `<namespace>.<number>` as used by event and event_chain keys, e.g.
/// `mymod_events.0001`. The number need not be purely numeric in CK3 (some
/// mods use hex-ish suffixes) — the only requirement enforced here is that
/// both halves are non-empty.
fn split_namespaced(raw: &str) -> Option<(&str, &str)> {
    let (namespace, local) = raw.split_once('.')?;
    if namespace.is_empty() || local.is_empty() {
        None
    } else {
        Some((namespace, local))
    }
}

fn walk_refs(
    nodes: &[Node],
    base_path: &str,
    context: Option<&str>,
    file_id: FileId,
    content_version_id: &ContentVersionId,
    config: &ExtractionConfig,
    refs: &mut Vec<Ref>,
) {
    for (index, node) in nodes.iter().enumerate() {
        let path = format!("{base_path}/children/{index}");
        match node {
            Node::Block(block) => {
                let nested_context = block.name.as_deref().or(context);
                walk_refs(&block.children, &path, nested_context, file_id, content_version_id, config, refs);
            }
            Node::Assignment(assignment) => {
                walk_assignment(assignment, &path, context, file_id, content_version_id, config, refs);
            }
            Node::Value(_) | Node::List(_) => {}
        }
    }
}

fn walk_assignment(
    assignment: &AssignmentNode,
    path: &str,
    context: Option<&str>,
    file_id: FileId,
    content_version_id: &ContentVersionId,
    config: &ExtractionConfig,
    refs: &mut Vec<Ref>,
) {
    if let Some(ref_type) = config.ref_type_for_key(&assignment.key) {
        match assignment.value.as_ref() {
            Node::Value(value) if value.value_type == ValueType::Ident => {
                refs.push(make_ref(
                    ref_type,
                    &value.value,
                    value.line,
                    value.column,
                    &format!("{path}/value"),
                    context,
                    file_id,
                    content_version_id,
                ));
            }
            Node::List(list) => {
                for (index, item) in list.items.iter().enumerate() {
                    if let Node::Value(value) = item {
                        if value.value_type == ValueType::Ident {
                            refs.push(make_ref(
                                ref_type,
                                &value.value,
                                value.line,
                                value.column,
                                &format!("{path}/value/items/{index}"),
                                context,
                                file_id,
                                content_version_id,
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn make_ref(
    ref_type: &str,
    name: &str,
    line: u32,
    column: u32,
    ast_node_path: &str,
    context: Option<&str>,
    file_id: FileId,
    content_version_id: &ContentVersionId,
) -> Ref {
    let ref_id = qb_core::id::RefId::new(format!("{file_id}:{ast_node_path}:{ref_type}:{name}"));
    Ref {
        ref_id,
        file_id,
        content_version_id: content_version_id.clone(),
        ast_node_path: ast_node_path.to_string(),
        line_number: line,
        column_number: column,
        ref_type: ref_type.to_string(),
        name: name.to_string(),
        context: context.map(str::to_string),
        resolution_status: ResolutionStatus::Unknown,
        resolved_symbol_id: None,
        candidates_json: None,
    }
}

#[cfg(test)]
#[path = "walk_tests.rs"]
mod tests;
