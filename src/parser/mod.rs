//! Table-driven LL(1) parsing.
//!
//! The driver keeps an explicit symbol stack seeded with
//! [end-of-input, start symbol]. Terminals on the stack top are matched and
//! consumed against the input; non-terminals are expanded through the
//! precomputed [`ParseTable`], pushing the production body in reverse.
//! Every match and expansion also feeds a tree builder, so the CST grows in
//! lockstep with the parse rather than in a second pass.

pub mod cst;
pub mod table;

use std::sync::OnceLock;

pub use cst::{CstNode, CstRoot};
pub use table::ParseTable;

use crate::error::SyntaxError;
use crate::grammar::{webql_grammar, TerminalSymbol};
use crate::token::{Token, TokenKind};
use table::NormalSymbol;

/// The precomputed table for the builtin Webql grammar. Built once, shared
/// by every compilation.
pub fn webql_parse_table() -> &'static ParseTable {
    static TABLE: OnceLock<ParseTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        ParseTable::build(webql_grammar()).expect("builtin grammar has no conflicts")
    })
}

enum WorkItem {
    Symbol(NormalSymbol),
    /// Close the node opened for the matching expansion.
    Close,
}

struct OpenNode {
    rule: String,
    transparent: bool,
    children: Vec<CstNode>,
}

pub struct Parser<'t> {
    table: &'t ParseTable,
}

impl<'t> Parser<'t> {
    pub fn new(table: &'t ParseTable) -> Self {
        Parser { table }
    }

    pub fn parse(&self, tokens: &[Token]) -> Result<CstRoot, SyntaxError> {
        let mut work: Vec<WorkItem> = vec![
            WorkItem::Symbol(NormalSymbol::Terminal(TerminalSymbol {
                kind: TokenKind::EndOfInput,
                value: None,
            })),
            WorkItem::Symbol(NormalSymbol::NonTerminal(self.table.start().to_string())),
        ];
        // Bottom sentinel collects the root node and the end-of-input leaf.
        let mut open: Vec<OpenNode> = vec![OpenNode {
            rule: String::new(),
            transparent: false,
            children: Vec::new(),
        }];
        let mut index = 0usize;

        while let Some(item) = work.pop() {
            match item {
                WorkItem::Close => {
                    let node = open.pop().expect("close without open node");
                    let parent = open.last_mut().expect("sentinel never closes");
                    if node.transparent {
                        parent.children.extend(node.children);
                    } else {
                        parent.children.push(CstNode::Internal {
                            rule: node.rule,
                            children: node.children,
                        });
                    }
                }
                WorkItem::Symbol(NormalSymbol::Terminal(expected)) => {
                    let token = current(tokens, index);
                    if !matches(&expected, token) {
                        return Err(mismatch(&expected.to_string(), token));
                    }
                    open.last_mut()
                        .expect("open stack never empty")
                        .children
                        .push(CstNode::Leaf {
                            token: token.clone(),
                        });
                    index += 1;
                }
                WorkItem::Symbol(NormalSymbol::NonTerminal(name)) => {
                    let token = current(tokens, index);
                    let Some(id) = self.table.lookup(&name, token) else {
                        return Err(mismatch(&self.table.expected_for(&name), token));
                    };
                    let production = self.table.production(id);
                    open.push(OpenNode {
                        rule: name.clone(),
                        transparent: self.table.is_synthetic(&name),
                        children: Vec::new(),
                    });
                    work.push(WorkItem::Close);
                    for symbol in production.body.iter().rev() {
                        work.push(WorkItem::Symbol(symbol.clone()));
                    }
                }
            }
        }

        // Stack exhausted: the sentinel holds exactly the start node and
        // the end-of-input leaf.
        let sentinel = open.pop().expect("sentinel");
        let mut children = sentinel.children.into_iter();
        let node = children.next().expect("start node");
        let end = match children.next() {
            Some(CstNode::Leaf { token }) => token,
            other => unreachable!("end-of-input leaf expected, got {:?}", other),
        };
        Ok(CstRoot { node, end })
    }
}

fn current(tokens: &[Token], index: usize) -> &Token {
    // tokenize() always terminates the stream with EndOfInput; clamp for
    // hand-built token slices.
    tokens.get(index).unwrap_or_else(|| {
        tokens
            .last()
            .expect("parse called with an empty token stream")
    })
}

fn matches(expected: &TerminalSymbol, token: &Token) -> bool {
    if expected.kind != token.kind {
        return false;
    }
    match &expected.value {
        Some(value) => value == &token.value,
        None => true,
    }
}

fn mismatch(expected: &str, found: &Token) -> SyntaxError {
    if found.kind == TokenKind::EndOfInput {
        SyntaxError::UnexpectedEndOfInput {
            expected: expected.to_string(),
        }
    } else {
        SyntaxError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            position: found.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> Result<CstRoot, SyntaxError> {
        let tokens = tokenize(source).unwrap();
        Parser::new(webql_parse_table()).parse(&tokens)
    }

    #[test]
    fn empty_object_parses() {
        let root = parse("{}").unwrap();
        assert_eq!(root.node.rule(), Some("query"));
        assert_eq!(root.node.children().len(), 1);
        assert_eq!(root.node.children()[0].rule(), Some("object"));
    }

    #[test]
    fn leaf_tokens_reproduce_the_input() {
        let source = "{ $filter: { age: { $greaterEquals: 18 } } }";
        let tokens = tokenize(source).unwrap();
        let root = Parser::new(webql_parse_table()).parse(&tokens).unwrap();
        let mut leaves: Vec<Token> = root.node.tokens().into_iter().cloned().collect();
        leaves.push(root.end.clone());
        assert_eq!(leaves, tokens);
    }

    #[test]
    fn mismatch_reports_expected_and_actual() {
        let err = parse("{ age 18 }").unwrap_err();
        match err {
            SyntaxError::UnexpectedToken { expected, found, .. } => {
                assert!(expected.contains(':'));
                assert_eq!(found, "'18'");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn truncated_input_reports_end_of_input() {
        let err = parse("{ age: ").unwrap_err();
        assert!(matches!(err, SyntaxError::UnexpectedEndOfInput { .. }));
    }
}
