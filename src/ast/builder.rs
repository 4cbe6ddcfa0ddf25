//! CST -> AST lowering.
//!
//! Purely structural: no symbol or type checking happens here. The builder
//! threads a *context expression* through the walk — the source at the query
//! root, the iteration element at lambda roots, the navigated member chain
//! under plain keys — and materializes it wherever the syntax implies it:
//! as the left operand of `{ age: { $greaterEquals: 18 } }`, or as the value
//! of a bare `$` / `null` member entry.

use std::collections::HashSet;

use crate::ast::expressions::{ExprKind, LiteralKind, NodeId};
use crate::ast::operators::WebqlOperator;
use crate::ast::query::WebqlQuery;
use crate::error::SyntaxError;
use crate::grammar::rules;
use crate::parser::cst::{CstNode, CstRoot};
use crate::token::{Span, TokenKind};

/// Recipe for the implicit context at some point of the walk. Materializing
/// a recipe allocates fresh nodes (or deep-copies an already-built stage
/// expression), so every materialization owns its subtree.
#[derive(Clone)]
enum Context {
    /// The enclosing scope's `$`: source at the root, element in lambdas.
    Scope,
    /// The expression produced by the previous pipeline stage.
    Stage(NodeId),
    /// Member navigation applied to an outer context.
    Member(Box<Context>, String, Span),
}

pub struct AstBuilder {
    query: WebqlQuery,
    /// Stage expressions already used verbatim; further uses deep-copy.
    consumed: HashSet<NodeId>,
}

impl AstBuilder {
    pub fn build(root: &CstRoot) -> Result<WebqlQuery, SyntaxError> {
        let mut builder = AstBuilder {
            query: WebqlQuery::new(),
            consumed: HashSet::new(),
        };
        let object = root
            .node
            .children()
            .iter()
            .find(|child| child.rule() == Some(rules::OBJECT))
            .expect("query derives an object");
        let span = object.span();
        let body = builder.build_object(object, Context::Scope)?;
        let expressions: Vec<NodeId> = body.into_iter().collect();
        let block = builder.query.push(ExprKind::Block { expressions }, span);
        builder.query.set_root(block);
        Ok(builder.query)
    }

    /// Builds an object in expression position. Entries thread the context:
    /// each stage sees the previous stage's expression as its context, and
    /// the object's value is the final stage. Empty objects yield `None`
    /// (the caller decides between identity and an empty block).
    fn build_object(
        &mut self,
        object: &CstNode,
        ctx: Context,
    ) -> Result<Option<NodeId>, SyntaxError> {
        let mut ctx = ctx;
        let mut last = None;
        for member in object_members(object) {
            let id = self.build_member(member, ctx)?;
            ctx = Context::Stage(id);
            last = Some(id);
        }
        Ok(last)
    }

    fn build_member(&mut self, member: &CstNode, ctx: Context) -> Result<NodeId, SyntaxError> {
        let (key, key_span, value) = member_parts(member);
        if let Some(name) = key.strip_prefix('$') {
            let Some(operator) = WebqlOperator::from_keyword(name) else {
                return Err(SyntaxError::UnknownOperator {
                    name: name.to_string(),
                    span: key_span,
                });
            };
            return self.build_operation(operator, value, ctx, member.span());
        }

        // Plain key: navigate into the member. A null value yields the
        // member itself.
        let nav = Context::Member(Box::new(ctx), key, key_span);
        if is_null_leaf(value) {
            return Ok(self.materialize(nav, value.span()));
        }
        self.build_value(value, nav)
    }

    fn build_operation(
        &mut self,
        operator: WebqlOperator,
        value: &CstNode,
        ctx: Context,
        span: Span,
    ) -> Result<NodeId, SyntaxError> {
        if operator == WebqlOperator::New {
            let inner = value_payload(value);
            if inner.rule() != Some(rules::OBJECT) {
                return Err(SyntaxError::MalformedProjection {
                    found: describe(inner),
                    span: inner.span(),
                });
            }
            let anonymous = self.build_anonymous_object(inner, ctx)?;
            return Ok(self.query.push(
                ExprKind::Operation {
                    operator,
                    operands: vec![anonymous],
                },
                span,
            ));
        }

        let inner = value_payload(value);
        let operands = if inner.rule() == Some(rules::ARRAY) {
            // Explicit operand list; lambda operands reset the context to
            // the new element scope.
            let mut operands = Vec::new();
            for (index, element) in array_elements(inner).into_iter().enumerate() {
                let element_ctx = if operator.lambda_operand() == Some(index) {
                    Context::Scope
                } else {
                    ctx.clone()
                };
                operands.push(self.build_value(element, element_ctx)?);
            }
            operands
        } else if operator.takes_context_operand() {
            let left = self.materialize(ctx.clone(), span);
            let right_ctx = if operator.lambda_operand() == Some(1) {
                Context::Scope
            } else {
                ctx
            };
            let right = self.build_value(value, right_ctx)?;
            vec![left, right]
        } else {
            vec![self.build_value(value, ctx)?]
        };

        Ok(self.query.push(ExprKind::Operation { operator, operands }, span))
    }

    fn build_anonymous_object(
        &mut self,
        object: &CstNode,
        ctx: Context,
    ) -> Result<NodeId, SyntaxError> {
        let mut properties = Vec::new();
        for member in object_members(object) {
            let (key, _, value) = member_parts(member);
            let id = self.build_value(value, ctx.clone())?;
            properties.push((key, id));
        }
        Ok(self
            .query
            .push(ExprKind::AnonymousObject { properties }, object.span()))
    }

    fn build_value(&mut self, value: &CstNode, ctx: Context) -> Result<NodeId, SyntaxError> {
        let inner = value_payload(value);
        if let Some(rule) = inner.rule() {
            return match rule {
                r if r == rules::OBJECT => match self.build_object(inner, ctx.clone())? {
                    Some(id) => Ok(id),
                    // `{}` in expression position is the context itself
                    None => Ok(self.materialize(ctx, inner.span())),
                },
                r if r == rules::ARRAY => Err(SyntaxError::MisplacedArray {
                    span: inner.span(),
                }),
                other => unreachable!("unexpected rule in value position: {}", other),
            };
        }

        let token = inner.token().expect("value leaf");
        let span = token.span();
        let id = match token.kind {
            TokenKind::Integer => self.literal(LiteralKind::Int, token.value.clone(), span),
            TokenKind::Float => self.literal(LiteralKind::Float, token.value.clone(), span),
            TokenKind::Hexadecimal => self.literal(LiteralKind::Hex, token.value.clone(), span),
            // The quoted form of the context reference keeps queries valid
            // strict JSON; the escaped spelling "\u0024" still yields a
            // literal dollar string.
            TokenKind::String if token.value == "\"$\"" || token.value == "'$'" => {
                self.materialize(ctx, span)
            }
            TokenKind::String => self.literal(LiteralKind::String, token.normalized(), span),
            TokenKind::Identifier => match token.value.as_str() {
                "null" => self.literal(LiteralKind::Null, token.value.clone(), span),
                "true" | "false" => self.literal(LiteralKind::Bool, token.value.clone(), span),
                "$" => self.materialize(ctx, span),
                identifier => self.query.push(
                    ExprKind::Reference {
                        identifier: identifier.to_string(),
                    },
                    span,
                ),
            },
            kind => unreachable!("unexpected token kind in value position: {}", kind),
        };
        Ok(id)
    }

    fn literal(&mut self, kind: LiteralKind, raw: String, span: Span) -> NodeId {
        self.query.push(ExprKind::Literal { kind, raw }, span)
    }

    fn materialize(&mut self, ctx: Context, span: Span) -> NodeId {
        match ctx {
            Context::Scope => self.query.push(
                ExprKind::Reference {
                    identifier: "$".to_string(),
                },
                span,
            ),
            Context::Stage(id) => {
                if self.consumed.insert(id) {
                    id
                } else {
                    self.query.clone_subtree(id)
                }
            }
            Context::Member(outer, member, member_span) => {
                let target = self.materialize(*outer, member_span);
                self.query.push(
                    ExprKind::MemberAccess { target, member },
                    member_span.merge(span),
                )
            }
        }
    }
}

fn rule_children<'a>(node: &'a CstNode, rule: &str) -> Vec<&'a CstNode> {
    node.children()
        .iter()
        .filter(|child| child.rule() == Some(rule))
        .collect()
}

/// `member` nodes of an object, reaching through the `members` list node.
fn object_members(object: &CstNode) -> Vec<&CstNode> {
    object
        .children()
        .iter()
        .find(|child| child.rule() == Some(rules::MEMBERS))
        .map(|members| rule_children(members, rules::MEMBER))
        .unwrap_or_default()
}

/// `value` nodes of an array, reaching through the `elements` list node.
fn array_elements(array: &CstNode) -> Vec<&CstNode> {
    array
        .children()
        .iter()
        .find(|child| child.rule() == Some(rules::ELEMENTS))
        .map(|elements| rule_children(elements, rules::VALUE))
        .unwrap_or_default()
}

fn member_parts(member: &CstNode) -> (String, Span, &CstNode) {
    let key_node = &member.children()[0];
    let key_token = key_node.children()[0]
        .token()
        .expect("key derives a single leaf");
    let key = key_token.normalized();
    let value = member
        .children()
        .iter()
        .find(|child| child.rule() == Some(rules::VALUE))
        .expect("member derives a value");
    (key, key_token.span(), value)
}

/// The single object/array/leaf child of a `value` node.
fn value_payload(value: &CstNode) -> &CstNode {
    &value.children()[0]
}

fn is_null_leaf(value: &CstNode) -> bool {
    value_payload(value)
        .token()
        .is_some_and(|token| token.kind == TokenKind::Identifier && token.value == "null")
}

fn describe(node: &CstNode) -> String {
    match node.rule() {
        Some(rule) => rule.to_string(),
        None => node
            .token()
            .map(|token| token.to_string())
            .unwrap_or_default(),
    }
}
