use crate::ast::expressions::{ExprKind, NodeId, WebqlNode};
use crate::token::Span;
use crate::types::WebqlType;

/// A parsed query: an arena of syntax nodes plus the root block id.
///
/// Nodes are pushed bottom-up (children before parents); [`WebqlQuery::push`]
/// wires the parent back-links. The arena is private per compilation —
/// nothing is shared or cached across compile calls.
#[derive(Debug, Clone)]
pub struct WebqlQuery {
    nodes: Vec<WebqlNode>,
    root: NodeId,
}

impl WebqlQuery {
    pub(crate) fn new() -> Self {
        WebqlQuery {
            nodes: Vec::new(),
            root: 0,
        }
    }

    pub(crate) fn push(&mut self, kind: ExprKind, span: Span) -> NodeId {
        let id = self.nodes.len();
        for child in kind.children() {
            self.nodes[child].parent = Some(id);
        }
        self.nodes.push(WebqlNode {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &WebqlNode {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id].span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deep-copies the subtree rooted at `id`, returning the new root.
    /// Used when one syntactic context expression feeds several operand
    /// positions: each position gets its own copy so every node keeps a
    /// single parent.
    pub(crate) fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let node = self.nodes[id].clone();
        let kind = match node.kind {
            ExprKind::Literal { .. } | ExprKind::Reference { .. } => node.kind,
            ExprKind::MemberAccess { target, member } => {
                let target = self.clone_subtree(target);
                ExprKind::MemberAccess { target, member }
            }
            ExprKind::Block { expressions } => {
                let expressions = expressions
                    .into_iter()
                    .map(|child| self.clone_subtree(child))
                    .collect();
                ExprKind::Block { expressions }
            }
            ExprKind::Operation { operator, operands } => {
                let operands = operands
                    .into_iter()
                    .map(|child| self.clone_subtree(child))
                    .collect();
                ExprKind::Operation { operator, operands }
            }
            ExprKind::AnonymousObject { properties } => {
                let properties = properties
                    .into_iter()
                    .map(|(name, child)| (name, self.clone_subtree(child)))
                    .collect();
                ExprKind::AnonymousObject { properties }
            }
            ExprKind::TypeConversion {
                target,
                target_type,
            } => {
                let target = self.clone_subtree(target);
                ExprKind::TypeConversion {
                    target,
                    target_type,
                }
            }
        };
        self.push(kind, node.span)
    }

    /// Wraps `target` in a [`ExprKind::TypeConversion`] node, splicing the
    /// new node into `target`'s place in its parent. Returns the wrapper id.
    pub(crate) fn insert_conversion(
        &mut self,
        target: NodeId,
        target_type: WebqlType,
    ) -> NodeId {
        let parent = self.nodes[target].parent;
        let span = self.nodes[target].span;
        let wrapper = self.push(
            ExprKind::TypeConversion {
                target,
                target_type,
            },
            span,
        );
        self.nodes[wrapper].parent = parent;
        if let Some(parent_id) = parent {
            replace_child(&mut self.nodes[parent_id].kind, target, wrapper);
        }
        wrapper
    }
}

fn replace_child(kind: &mut ExprKind, old: NodeId, new: NodeId) {
    let slots: Vec<&mut NodeId> = match kind {
        ExprKind::Literal { .. } | ExprKind::Reference { .. } => Vec::new(),
        ExprKind::MemberAccess { target, .. } => vec![target],
        ExprKind::Block { expressions } => expressions.iter_mut().collect(),
        ExprKind::Operation { operands, .. } => operands.iter_mut().collect(),
        ExprKind::AnonymousObject { properties } => {
            properties.iter_mut().map(|(_, id)| id).collect()
        }
        ExprKind::TypeConversion { target, .. } => vec![target],
    };
    for slot in slots {
        if *slot == old {
            *slot = new;
        }
    }
}
