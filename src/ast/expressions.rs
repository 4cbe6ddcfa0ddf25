use crate::ast::WebqlOperator;
use crate::token::Span;
use crate::types::WebqlType;

/// Index of a node inside its query's arena.
pub type NodeId = usize;

/// Source-level classification of a literal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Null,
    Bool,
    Int,
    Float,
    Hex,
    String,
}

/// Expression shapes of the abstract syntax tree.
///
/// Children are arena ids; the arena (see [`crate::ast::WebqlQuery`]) keeps
/// the parent back-links, so cross-cutting data (scopes, cached semantics)
/// lives in side tables keyed by [`NodeId`] instead of on the nodes
/// themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A literal scalar. `raw` is the source text, quotes stripped and
    /// escapes resolved for strings.
    Literal { kind: LiteralKind, raw: String },

    /// A bare identifier, resolved against the scope chain (`$` is the
    /// only identifier queries declare: the source at the root, the
    /// iteration element inside lambdas).
    Reference { identifier: String },

    /// `target.member`
    MemberAccess { target: NodeId, member: String },

    /// Ordered expression sequence; the query body. Its value is the last
    /// expression, or the source itself when empty (the identity query).
    Block { expressions: Vec<NodeId> },

    /// An operator applied to ordered operands.
    Operation {
        operator: WebqlOperator,
        operands: Vec<NodeId>,
    },

    /// `$new` projection body: ordered named properties.
    AnonymousObject { properties: Vec<(String, NodeId)> },

    /// Implicit numeric widening inserted by semantic rewrite hooks.
    TypeConversion {
        target: NodeId,
        target_type: WebqlType,
    },
}

impl ExprKind {
    /// Child ids in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            ExprKind::Literal { .. } | ExprKind::Reference { .. } => Vec::new(),
            ExprKind::MemberAccess { target, .. } => vec![*target],
            ExprKind::Block { expressions } => expressions.clone(),
            ExprKind::Operation { operands, .. } => operands.clone(),
            ExprKind::AnonymousObject { properties } => {
                properties.iter().map(|(_, id)| *id).collect()
            }
            ExprKind::TypeConversion { target, .. } => vec![*target],
        }
    }
}

/// One syntax node: its shape, source span, and parent back-link.
/// Exactly one node per query (the root block) has no parent.
#[derive(Debug, Clone, PartialEq)]
pub struct WebqlNode {
    pub kind: ExprKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}
