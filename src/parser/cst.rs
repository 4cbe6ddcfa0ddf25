use crate::token::{Span, Token};

/// Concrete syntax tree node: internal nodes carry the grammar rule that
/// produced them, leaves wrap a matched token. The CST is transient; the
/// AST builder consumes it and it is discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum CstNode {
    Internal {
        rule: String,
        children: Vec<CstNode>,
    },
    Leaf {
        token: Token,
    },
}

impl CstNode {
    pub fn rule(&self) -> Option<&str> {
        match self {
            CstNode::Internal { rule, .. } => Some(rule),
            CstNode::Leaf { .. } => None,
        }
    }

    pub fn children(&self) -> &[CstNode] {
        match self {
            CstNode::Internal { children, .. } => children,
            CstNode::Leaf { .. } => &[],
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            CstNode::Leaf { token } => Some(token),
            CstNode::Internal { .. } => None,
        }
    }

    /// Leaf tokens in source order.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token>) {
        match self {
            CstNode::Leaf { token } => out.push(token),
            CstNode::Internal { children, .. } => {
                for child in children {
                    child.collect_tokens(out);
                }
            }
        }
    }

    /// Source range covered by this node's leaves.
    pub fn span(&self) -> Span {
        let tokens = self.tokens();
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => first.span().merge(last.span()),
            _ => Span::default(),
        }
    }
}

/// The full parse result: the start symbol's node plus the consumed
/// end-of-input token, kept so the leaf sequence reproduces the entire
/// token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CstRoot {
    pub node: CstNode,
    pub end: Token,
}
