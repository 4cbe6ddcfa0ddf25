//! Semantic analysis: scoping side tables, per-node semantics, and the
//! pluggable rewrite hooks that run around validation.
//!
//! Semantics are computed lazily on first access and memoized on the node's
//! compilation, so recomputation is never observable. Dispatch is by node
//! kind, then by operator category for operations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{
    ExprKind, LiteralKind, NodeId, OperatorCategory, WebqlOperator, WebqlQuery,
};
use crate::error::SemanticError;
use crate::scope::{ScopeId, ScopeTree, Symbol};
use crate::types::{ObjectType, WebqlType};

/// The per-node analysis result: at minimum the node's resulting type,
/// plus resolved detail for member accesses and projections.
#[derive(Debug, Clone, PartialEq)]
pub struct Semantics {
    pub result_type: WebqlType,
    pub detail: SemanticsDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticsDetail {
    Plain,
    /// Resolved property info for a member-access node
    Member { owner: String, property: String },
    /// The synthesized record type of an anonymous-object node
    Projection { object_type: Arc<ObjectType> },
}

impl Semantics {
    fn plain(result_type: WebqlType) -> Self {
        Semantics {
            result_type,
            detail: SemanticsDetail::Plain,
        }
    }
}

/// All per-compilation state: the AST plus the side tables analysis passes
/// attach to it. Fresh per compile call; nothing here is shared or reused.
pub struct Compilation {
    query: WebqlQuery,
    scopes: ScopeTree,
    node_scopes: HashMap<NodeId, ScopeId>,
    semantics: HashMap<NodeId, Semantics>,
    source_type: WebqlType,
}

impl Compilation {
    pub fn new(query: WebqlQuery, element_type: WebqlType) -> Self {
        Compilation {
            query,
            scopes: ScopeTree::new(),
            node_scopes: HashMap::new(),
            semantics: HashMap::new(),
            source_type: WebqlType::queryable(element_type),
        }
    }

    pub fn query(&self) -> &WebqlQuery {
        &self.query
    }

    pub(crate) fn query_mut(&mut self) -> &mut WebqlQuery {
        &mut self.query
    }

    /// The source's queryable type.
    pub fn source_type(&self) -> &WebqlType {
        &self.source_type
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub(crate) fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    /// Attaches a scope to a node. Attachment is one-shot: doing it twice
    /// without `override_existing` is a programming error and fails fast.
    pub(crate) fn attach_scope(&mut self, node: NodeId, scope: ScopeId, override_existing: bool) {
        if !override_existing && self.node_scopes.contains_key(&node) {
            panic!("scope already attached to node {}", node);
        }
        self.node_scopes.insert(node, scope);
    }

    /// The nearest enclosing scope: the node's own attachment, or the
    /// closest ancestor's, walking live parent links.
    pub fn scope_of(&self, node: NodeId) -> ScopeId {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scope) = self.node_scopes.get(&id) {
                return *scope;
            }
            current = self.query.parent(id);
        }
        panic!("node {} has no enclosing scope; run the binder first", node)
    }

    /// Same one-shot contract as [`Compilation::attach_scope`].
    pub(crate) fn attach_semantics(
        &mut self,
        node: NodeId,
        semantics: Semantics,
        override_existing: bool,
    ) {
        if !override_existing && self.semantics.contains_key(&node) {
            panic!("semantics already attached to node {}", node);
        }
        self.semantics.insert(node, semantics);
    }

    pub fn cached_semantics(&self, node: NodeId) -> Option<&Semantics> {
        self.semantics.get(&node)
    }

    /// Innermost-first symbol resolution from the node's nearest scope.
    pub fn resolve_symbol(&self, node: NodeId, identifier: &str) -> Result<&Symbol, SemanticError> {
        let scope = self.scope_of(node);
        self.scopes
            .resolve(scope, identifier)
            .ok_or_else(|| SemanticError::SymbolNotFound {
                identifier: identifier.to_string(),
                span: self.query.span(node),
            })
    }
}

/// A pluggable pass run around operation validation. Hooks may rewrite the
/// tree (the numeric-coercion hook inserts type conversions); the validator
/// itself never changes.
pub trait SemanticRewrite {
    fn before_validation(
        &self,
        _analyzer: &SemanticAnalyzer,
        _compilation: &mut Compilation,
        _node: NodeId,
    ) -> Result<(), SemanticError> {
        Ok(())
    }

    fn after_validation(
        &self,
        _analyzer: &SemanticAnalyzer,
        _compilation: &mut Compilation,
        _node: NodeId,
    ) -> Result<(), SemanticError> {
        Ok(())
    }
}

/// Inserts [`ExprKind::TypeConversion`] nodes where the operands of a binary
/// numeric operator disagree: a mismatching literal converts to the other
/// side's type, otherwise the right operand converts to the left's — the
/// left operand stays authoritative.
pub struct NumericCoercion;

impl SemanticRewrite for NumericCoercion {
    fn before_validation(
        &self,
        analyzer: &SemanticAnalyzer,
        compilation: &mut Compilation,
        node: NodeId,
    ) -> Result<(), SemanticError> {
        let ExprKind::Operation { operator, operands } =
            compilation.query().node(node).kind.clone()
        else {
            return Ok(());
        };
        let category = operator.category();
        if !matches!(
            category,
            OperatorCategory::Arithmetic | OperatorCategory::Relational
        ) || operands.len() != 2
        {
            return Ok(());
        }
        let (left, right) = (operands[0], operands[1]);
        if is_null_literal(compilation.query(), left) || is_null_literal(compilation.query(), right)
        {
            return Ok(());
        }

        let left_type = analyzer.semantics(compilation, left)?.result_type;
        let right_type = analyzer.semantics(compilation, right)?.result_type;
        if !left_type.is_numeric() || !right_type.is_numeric() || left_type == right_type {
            return Ok(());
        }

        let left_literal = is_numeric_literal(compilation.query(), left);
        let right_literal = is_numeric_literal(compilation.query(), right);
        let (target, target_type) = if right_literal && !left_literal {
            (right, left_type)
        } else if left_literal && !right_literal {
            (left, right_type)
        } else {
            (right, left_type)
        };
        compilation.query_mut().insert_conversion(target, target_type);
        Ok(())
    }
}

fn is_null_literal(query: &WebqlQuery, node: NodeId) -> bool {
    matches!(
        query.node(node).kind,
        ExprKind::Literal {
            kind: LiteralKind::Null,
            ..
        }
    )
}

fn is_numeric_literal(query: &WebqlQuery, node: NodeId) -> bool {
    matches!(
        query.node(node).kind,
        ExprKind::Literal {
            kind: LiteralKind::Int | LiteralKind::Float | LiteralKind::Hex,
            ..
        }
    )
}

pub struct SemanticAnalyzer {
    rewrites: Vec<Box<dyn SemanticRewrite>>,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    /// Analyzer with the standard rewrite passes.
    pub fn new() -> Self {
        SemanticAnalyzer {
            rewrites: vec![Box::new(NumericCoercion)],
        }
    }

    /// Registers an extra rewrite pass, run after the standard ones.
    pub fn with_rewrite(mut self, rewrite: Box<dyn SemanticRewrite>) -> Self {
        self.rewrites.push(rewrite);
        self
    }

    /// Validates the whole query. Every node is reachable from the root
    /// block, so this forces (and caches) semantics for all of them.
    pub fn analyze(&self, compilation: &mut Compilation) -> Result<Semantics, SemanticError> {
        let root = compilation.query().root();
        self.semantics(compilation, root)
    }

    /// Lazily computed, memoized per node.
    pub fn semantics(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
    ) -> Result<Semantics, SemanticError> {
        if let Some(cached) = compilation.cached_semantics(node) {
            return Ok(cached.clone());
        }
        let semantics = self.compute(compilation, node)?;
        compilation.attach_semantics(node, semantics.clone(), false);
        Ok(semantics)
    }

    fn compute(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
    ) -> Result<Semantics, SemanticError> {
        let kind = compilation.query().node(node).kind.clone();
        match kind {
            ExprKind::Literal { kind, .. } => self.literal(compilation, node, kind),
            ExprKind::Reference { identifier } => {
                let symbol = compilation.resolve_symbol(node, &identifier)?;
                Ok(Semantics::plain(symbol.declared_type.clone()))
            }
            ExprKind::MemberAccess { target, member } => {
                let target_semantics = self.semantics(compilation, target)?;
                let owner = target_semantics.result_type;
                let Some(property_type) = owner.property(&member) else {
                    return Err(SemanticError::PropertyNotFound {
                        type_name: owner.to_string(),
                        property: member,
                        span: compilation.query().span(node),
                    });
                };
                Ok(Semantics {
                    result_type: property_type.clone(),
                    detail: SemanticsDetail::Member {
                        owner: owner.to_string(),
                        property: member,
                    },
                })
            }
            ExprKind::Block { expressions } => match expressions.last() {
                Some(last) => self.semantics(compilation, *last),
                // `{}` is the identity query
                None => Ok(Semantics::plain(compilation.source_type().clone())),
            },
            ExprKind::Operation { operator, .. } => self.operation(compilation, node, operator),
            ExprKind::AnonymousObject { properties } => {
                let mut typed = Vec::with_capacity(properties.len());
                for (name, value) in properties {
                    let value_type = self.semantics(compilation, value)?.result_type;
                    typed.push((name, value_type));
                }
                let object_type = Arc::new(ObjectType::anonymous(typed));
                Ok(Semantics {
                    result_type: WebqlType::Object(object_type.clone()),
                    detail: SemanticsDetail::Projection { object_type },
                })
            }
            ExprKind::TypeConversion {
                target,
                target_type,
            } => {
                self.semantics(compilation, target)?;
                Ok(Semantics::plain(target_type))
            }
        }
    }

    fn literal(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
        kind: LiteralKind,
    ) -> Result<Semantics, SemanticError> {
        let result_type = match kind {
            LiteralKind::Bool => WebqlType::Bool,
            LiteralKind::Int | LiteralKind::Hex => WebqlType::Int,
            LiteralKind::Float => WebqlType::Float,
            LiteralKind::String => WebqlType::String,
            LiteralKind::Null => return self.null_literal(compilation, node),
        };
        Ok(Semantics::plain(result_type))
    }

    /// A null literal takes its sibling's type, and is only legal as one
    /// operand of a binary value operator.
    fn null_literal(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
    ) -> Result<Semantics, SemanticError> {
        let span = compilation.query().span(node);
        let illegal = SemanticError::IllegalNullLiteral { span };
        let Some(parent) = compilation.query().parent(node) else {
            return Err(illegal);
        };
        let ExprKind::Operation { operator, operands } =
            compilation.query().node(parent).kind.clone()
        else {
            return Err(illegal);
        };
        let binary = matches!(
            operator.category(),
            OperatorCategory::Arithmetic
                | OperatorCategory::Relational
                | OperatorCategory::StringRelational
        );
        if !binary || operands.len() != 2 {
            return Err(illegal);
        }
        let sibling = if operands[0] == node {
            operands[1]
        } else {
            operands[0]
        };
        if is_null_literal(compilation.query(), sibling) {
            return Err(illegal);
        }
        let sibling_type = self.semantics(compilation, sibling)?.result_type;
        Ok(Semantics::plain(sibling_type))
    }

    fn operation(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
        operator: WebqlOperator,
    ) -> Result<Semantics, SemanticError> {
        for rewrite in &self.rewrites {
            rewrite.before_validation(self, compilation, node)?;
        }

        // Rewrites may have wrapped operands; re-read the list.
        let ExprKind::Operation { operands, .. } = compilation.query().node(node).kind.clone()
        else {
            unreachable!("operation node changed kind");
        };

        let arity = operator.arity();
        if !arity.accepts(operands.len()) {
            return Err(SemanticError::ArityMismatch {
                operator: operator.keyword(),
                expected: arity.to_string(),
                actual: operands.len(),
                span: compilation.query().span(node),
            });
        }

        let semantics = self.operation_type(compilation, operator, &operands)?;

        for rewrite in &self.rewrites {
            rewrite.after_validation(self, compilation, node)?;
        }
        Ok(semantics)
    }

    fn operation_type(
        &self,
        compilation: &mut Compilation,
        operator: WebqlOperator,
        operands: &[NodeId],
    ) -> Result<Semantics, SemanticError> {
        use OperatorCategory::*;
        match operator.category() {
            // Left operand is authoritative; no numeric promotion here.
            Arithmetic => {
                let left = self.semantics(compilation, operands[0])?.result_type;
                self.semantics(compilation, operands[1])?;
                Ok(Semantics::plain(left))
            }
            Relational | StringRelational | Logical => {
                for operand in operands {
                    self.semantics(compilation, *operand)?;
                }
                Ok(Semantics::plain(WebqlType::Bool))
            }
            Semantic => match operator {
                WebqlOperator::Aggregate => {
                    let mut last = None;
                    for operand in operands {
                        last = Some(self.semantics(compilation, *operand)?.result_type);
                    }
                    Ok(Semantics::plain(last.expect("arity checked")))
                }
                WebqlOperator::New => {
                    let projected = self.semantics(compilation, operands[0])?;
                    Ok(Semantics::plain(projected.result_type))
                }
                other => unreachable!("{} is not a semantic operator", other),
            },
            CollectionManipulation => {
                let element = self.ensure_queryable(compilation, operands[0])?;
                match operator {
                    WebqlOperator::Filter => {
                        self.semantics(compilation, operands[1])?;
                        Ok(Semantics::plain(WebqlType::queryable(element)))
                    }
                    WebqlOperator::Select => {
                        let projected = self.semantics(compilation, operands[1])?.result_type;
                        Ok(Semantics::plain(WebqlType::queryable(projected)))
                    }
                    WebqlOperator::SelectMany => {
                        let projected = self.semantics(compilation, operands[1])?.result_type;
                        let inner = projected.element_type().cloned().ok_or_else(|| {
                            SemanticError::NotQueryable {
                                found: projected.to_string(),
                                span: compilation.query().span(operands[1]),
                            }
                        })?;
                        Ok(Semantics::plain(WebqlType::queryable(inner)))
                    }
                    WebqlOperator::Limit | WebqlOperator::Skip => {
                        self.semantics(compilation, operands[1])?;
                        Ok(Semantics::plain(WebqlType::queryable(element)))
                    }
                    other => unreachable!("{} is not collection manipulation", other),
                }
            }
            CollectionAggregation => {
                let element = self.ensure_queryable(compilation, operands[0])?;
                for operand in &operands[1..] {
                    self.semantics(compilation, *operand)?;
                }
                let result_type = match operator {
                    WebqlOperator::Count => WebqlType::Int,
                    WebqlOperator::Contains | WebqlOperator::Any | WebqlOperator::All => {
                        WebqlType::Bool
                    }
                    WebqlOperator::Index => element,
                    WebqlOperator::Min
                    | WebqlOperator::Max
                    | WebqlOperator::Sum
                    | WebqlOperator::Average => {
                        self.semantics(compilation, operands[1])?.result_type
                    }
                    other => unreachable!("{} is not collection aggregation", other),
                };
                Ok(Semantics::plain(result_type))
            }
        }
    }

    /// The source operand of every collection operator must be queryable;
    /// yields its element type.
    fn ensure_queryable(
        &self,
        compilation: &mut Compilation,
        node: NodeId,
    ) -> Result<WebqlType, SemanticError> {
        let semantics = self.semantics(compilation, node)?;
        semantics
            .result_type
            .element_type()
            .cloned()
            .ok_or_else(|| SemanticError::NotQueryable {
                found: semantics.result_type.to_string(),
                span: compilation.query().span(node),
            })
    }
}
