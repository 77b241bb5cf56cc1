// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive-descent parser for CK3 game-script source.
//!
//! ```text
//! file       := item*
//! item       := assignment | block
//! assignment := IDENT OP value
//! block      := IDENT EQ LBRACE item* RBRACE
//!            |  LBRACE item* RBRACE              (anonymous block)
//! value      := scalar | block | list
//! list       := LBRACE (scalar (SEP scalar)*)? RBRACE
//! scalar     := IDENT | NUMBER | STRING
//! OP         := EQ | LT | LE | GT | GE | NEQ
//! ```
//!
//! Disambiguating a brace's contents as a block or a list is a one-token
//! lookahead past the first meaningful token: if it's followed by an `OP`,
//! the brace holds items (a block); otherwise it holds scalars (a list).
//! On a syntax error the parser emits a diagnostic and skips to the next
//! `RBRACE` or `NEWLINE` at the current brace depth, then resumes — it
//! always returns a (possibly partial) tree alongside the diagnostic list,
//! never panics or aborts.

use crate::ast::{AssignmentNode, BlockNode, ListNode, Node, Operator, RootNode, ValueNode, ValueType};
use crate::error::Diagnostic;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Parse a file from disk. The only filesystem-touching entry point in this
/// crate; parsing itself never performs I/O beyond this.
pub fn parse_file(path: &std::path::Path) -> std::io::Result<(RootNode, Vec<Diagnostic>)> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.to_string_lossy().into_owned();
    Ok(parse_text_recovering(&filename, &source))
}

/// Parse in-memory source text, recovering from syntax errors rather than
/// aborting. Always returns a tree (possibly partial) and a (possibly
/// empty) diagnostic list.
pub fn parse_text_recovering(filename: &str, source: &str) -> (RootNode, Vec<Diagnostic>) {
    let (tokens, lex_diagnostics) = Lexer::tokenize(source);
    let mut parser = Parser::new(tokens);
    let children = parser.parse_items(0, true);
    let mut diagnostics = lex_diagnostics;
    diagnostics.append(&mut parser.diagnostics);
    (
        RootNode {
            filename: filename.to_string(),
            children,
        },
        diagnostics,
    )
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    fn diag(&mut self, line: u32, column: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(line, column, message));
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    /// Peek the next non-trivia token without consuming anything.
    fn peek(&self) -> Option<&Token> {
        let mut i = self.pos;
        loop {
            let t = self.tokens.get(i)?;
            match t.kind {
                TokenKind::Comment(_) | TokenKind::Newline => i += 1,
                _ => return Some(t),
            }
        }
    }

    /// Advance past trivia and return the next significant token.
    fn bump(&mut self) -> Option<Token> {
        loop {
            let t = self.tokens.get(self.pos)?.clone();
            self.pos += 1;
            match t.kind {
                TokenKind::Comment(_) | TokenKind::Newline => continue,
                _ => return Some(t),
            }
        }
    }

    fn operator_of(kind: &TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::Eq => Operator::Eq,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Le => Operator::Le,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Ge => Operator::Ge,
            TokenKind::Neq => Operator::Neq,
            _ => return None,
        })
    }

    /// Skip tokens to the next `RBRACE` or `NEWLINE` at the current brace
    /// depth (error recovery), without consuming a closing `RBRACE`
    /// that belongs to an enclosing block.
    fn recover(&mut self) {
        let mut depth: i32 = 0;
        loop {
            let Some(t) = self.tokens.get(self.pos) else {
                return;
            };
            match t.kind {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    depth += 1;
                    self.pos += 1;
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return; // leave for the caller to consume
                    }
                    depth -= 1;
                    self.pos += 1;
                }
                TokenKind::Newline if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Parse `item*`. When `top_level` is false, stops at (without
    /// consuming) a closing `RBRACE`.
    fn parse_items(&mut self, _depth: u32, top_level: bool) -> Vec<Node> {
        let mut items = Vec::new();
        loop {
            if self.at_eof() {
                break;
            }
            if !top_level && matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RBrace)) {
                break;
            }
            match self.parse_item() {
                Some(node) => items.push(node),
                None => {
                    if self.at_eof() {
                        break;
                    }
                }
            }
        }
        items
    }

    /// Parse a single `item := assignment | block`.
    fn parse_item(&mut self) -> Option<Node> {
        let next = self.peek()?.clone();
        match &next.kind {
            TokenKind::LBrace => {
                // Anonymous block item.
                Some(Node::Block(self.parse_brace_as_block(None, Operator::Eq, next.line, next.column)))
            }
            TokenKind::Ident(name) | TokenKind::Number(name) | TokenKind::String(name) => {
                let key = name.clone();
                let key_line = next.line;
                let key_column = next.column;
                self.bump(); // consume key

                let Some(op_tok) = self.peek().cloned() else {
                    self.diag(key_line, key_column, format!("unexpected end of input after '{key}', expected operator"));
                    return None;
                };
                let Some(operator) = Self::operator_of(&op_tok.kind) else {
                    self.diag(
                        op_tok.line,
                        op_tok.column,
                        format!("unexpected token {}, expected operator", op_tok.kind),
                    );
                    self.recover();
                    return None;
                };
                self.bump(); // consume operator

                match self.peek().cloned() {
                    Some(value_tok) if matches!(value_tok.kind, TokenKind::LBrace) => {
                        if self.brace_holds_block() {
                            Some(Node::Block(self.parse_brace_as_block(
                                Some(key),
                                operator,
                                key_line,
                                key_column,
                            )))
                        } else {
                            let list = self.parse_list(value_tok.line, value_tok.column);
                            Some(Node::Assignment(AssignmentNode {
                                key,
                                operator,
                                line: key_line,
                                column: key_column,
                                value: Box::new(Node::List(list)),
                            }))
                        }
                    }
                    Some(value_tok) if Self::is_scalar(&value_tok.kind) => {
                        self.bump();
                        let value = Self::scalar_node(&value_tok);
                        Some(Node::Assignment(AssignmentNode {
                            key,
                            operator,
                            line: key_line,
                            column: key_column,
                            value: Box::new(Node::Value(value)),
                        }))
                    }
                    Some(other) => {
                        self.diag(
                            other.line,
                            other.column,
                            format!("unexpected token {}, expected value", other.kind),
                        );
                        self.recover();
                        None
                    }
                    None => {
                        self.diag(key_line, key_column, "unexpected end of input, expected value");
                        None
                    }
                }
            }
            TokenKind::RBrace | TokenKind::Eof => None,
            other => {
                self.diag(next.line, next.column, format!("unexpected token {other}"));
                self.bump();
                self.recover();
                None
            }
        }
    }

    fn is_scalar(kind: &TokenKind) -> bool {
        matches!(kind, TokenKind::Ident(_) | TokenKind::Number(_) | TokenKind::String(_))
    }

    fn scalar_node(tok: &Token) -> ValueNode {
        let (value, value_type) = match &tok.kind {
            TokenKind::Ident(s) => (s.clone(), ValueType::Ident),
            TokenKind::Number(s) => (s.clone(), ValueType::Number),
            TokenKind::String(s) => (s.clone(), ValueType::String),
            _ => unreachable!("scalar_node called on non-scalar token"),
        };
        ValueNode {
            value,
            value_type,
            line: tok.line,
            column: tok.column,
        }
    }

    /// Peek past the opening `{` to decide block vs. list: if the first
    /// meaningful token inside is followed by an operator, it's a block.
    fn brace_holds_block(&self) -> bool {
        // self.peek() is the '{'. Look two and three tokens ahead (skipping
        // trivia) without mutating position.
        let mut i = self.pos;
        // advance to the '{' itself
        loop {
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::Comment(_) | TokenKind::Newline) => i += 1,
                Some(TokenKind::LBrace) => {
                    i += 1;
                    break;
                }
                _ => return false,
            }
        }
        // first meaningful token inside the braces
        let first = loop {
            match self.tokens.get(i) {
                Some(t) if matches!(t.kind, TokenKind::Comment(_) | TokenKind::Newline) => i += 1,
                Some(t) => break Some(t),
                None => break None,
            }
        };
        let Some(first) = first else { return true };
        if !Self::is_scalar(&first.kind) {
            // Empty braces, a nested brace (anonymous block item), or
            // anything else that isn't a bare scalar can only appear inside
            // an item list, never inside a scalar list.
            return true;
        }
        i += 1;
        let second = loop {
            match self.tokens.get(i) {
                Some(t) if matches!(t.kind, TokenKind::Comment(_) | TokenKind::Newline) => i += 1,
                Some(t) => break Some(t),
                None => break None,
            }
        };
        matches!(second.map(|t| Self::operator_of(&t.kind)), Some(Some(_)))
    }

    fn parse_brace_as_block(
        &mut self,
        name: Option<String>,
        operator: Operator,
        line: u32,
        column: u32,
    ) -> BlockNode {
        self.bump(); // consume '{'
        let children = self.parse_items(0, false);
        match self.peek().cloned() {
            Some(t) if matches!(t.kind, TokenKind::RBrace) => {
                self.bump();
            }
            Some(t) => {
                self.diag(t.line, t.column, format!("unexpected token {}, expected '}}'", t.kind));
            }
            None => {
                self.diag(line, column, "unexpected end of input, unbalanced '{'");
            }
        }
        BlockNode {
            name,
            operator,
            line,
            column,
            children,
        }
    }

    fn parse_list(&mut self, line: u32, column: u32) -> ListNode {
        self.bump(); // consume '{'
        let mut items = Vec::new();
        loop {
            match self.peek().cloned() {
                Some(t) if matches!(t.kind, TokenKind::RBrace) => {
                    self.bump();
                    break;
                }
                Some(t) if Self::is_scalar(&t.kind) => {
                    self.bump();
                    items.push(Node::Value(Self::scalar_node(&t)));
                }
                Some(t) => {
                    self.diag(t.line, t.column, format!("unexpected token {} in list", t.kind));
                    self.recover();
                    break;
                }
                None => {
                    self.diag(line, column, "unexpected end of input, unbalanced '{' in list");
                    break;
                }
            }
        }
        ListNode { line, column, items }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
