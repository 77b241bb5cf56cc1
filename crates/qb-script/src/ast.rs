// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AST node kinds produced by the parser.

use serde::{Deserialize, Serialize};

/// The comparison/assignment operator carried by a [`BlockNode`] or
/// [`AssignmentNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Neq,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Neq => "!=",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scalar kind carried by a [`ValueNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Ident,
    Number,
    String,
}

/// Any node produced while parsing an `item`, `value`, or list element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    Block(BlockNode),
    Assignment(AssignmentNode),
    Value(ValueNode),
    List(ListNode),
}

impl Node {
    pub fn line(&self) -> u32 {
        match self {
            Node::Block(n) => n.line,
            Node::Assignment(n) => n.line,
            Node::Value(n) => n.line,
            Node::List(n) => n.line,
        }
    }

    pub fn column(&self) -> u32 {
        match self {
            Node::Block(n) => n.column,
            Node::Assignment(n) => n.column,
            Node::Value(n) => n.column,
            Node::List(n) => n.column,
        }
    }
}

/// The root of a parsed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootNode {
    pub filename: String,
    pub children: Vec<Node>,
}

/// `name = { item* }`, or `{ item* }` when anonymous (a list element that is
/// itself a block).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub operator: Operator,
    pub line: u32,
    pub column: u32,
    pub children: Vec<Node>,
}

/// `key OP value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentNode {
    pub key: String,
    pub operator: Operator,
    pub line: u32,
    pub column: u32,
    pub value: Box<Node>,
}

/// A scalar leaf: an identifier, number, or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueNode {
    pub value: String,
    pub value_type: ValueType,
    pub line: u32,
    pub column: u32,
}

/// `{ scalar (SEP scalar)* }` — a list of scalars with no nested
/// assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    pub line: u32,
    pub column: u32,
    pub items: Vec<Node>,
}

/// Total node count, including the root itself (`count_ast_nodes`).
pub fn count_ast_nodes(root: &RootNode) -> u64 {
    1 + root.children.iter().map(count_node).sum::<u64>()
}

fn count_node(node: &Node) -> u64 {
    1 + match node {
        Node::Block(b) => b.children.iter().map(count_node).sum(),
        Node::Assignment(a) => count_node(&a.value),
        Node::Value(_) => 0,
        Node::List(l) => l.items.iter().map(count_node).sum(),
    }
}
