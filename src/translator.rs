//! Lowering of the semantically bound AST into the expression-tree IR.
//!
//! Translation keeps its own stack of contexts mirroring the AST's scopes,
//! mapping identifiers to the parameter expressions of the lambdas being
//! built, so inner lambdas close over outer bindings correctly and every
//! occurrence of an element reuses the same parameter instance.
//!
//! Errors here are defensive: any AST that passed semantic analysis should
//! lower cleanly, so a [`TranslationError`] indicates an analyzer/translator
//! mismatch, not a user mistake.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{ExprKind, LiteralKind, NodeId, OperatorCategory, WebqlOperator};
use crate::error::TranslationError;
use crate::expr::{
    BinaryOperator, Expression, ParameterExpression, QueryableMethod, UnaryOperator,
};
use crate::semantics::{Compilation, Semantics, SemanticsDetail};
use crate::token::Span;
use crate::value::Value;

pub struct Translator<'c> {
    compilation: &'c Compilation,
    contexts: Vec<HashMap<String, Arc<ParameterExpression>>>,
}

impl<'c> Translator<'c> {
    /// Lowers a fully analyzed compilation into the source parameter and
    /// the body expression of the compiled lambda.
    pub fn translate(
        compilation: &'c Compilation,
    ) -> Result<(Arc<ParameterExpression>, Expression), TranslationError> {
        let source_parameter = Arc::new(ParameterExpression {
            name: "$".to_string(),
            ty: compilation.source_type().clone(),
        });
        let mut translator = Translator {
            compilation,
            contexts: vec![HashMap::new()],
        };
        translator.declare("$", source_parameter.clone())?;
        let body = translator.lower(compilation.query().root())?;
        Ok((source_parameter, body))
    }

    fn declare(
        &mut self,
        identifier: &str,
        parameter: Arc<ParameterExpression>,
    ) -> Result<(), TranslationError> {
        let frame = self.contexts.last_mut().expect("context stack never empty");
        if frame.contains_key(identifier) {
            return Err(TranslationError::DuplicateBinding {
                identifier: identifier.to_string(),
            });
        }
        frame.insert(identifier.to_string(), parameter);
        Ok(())
    }

    /// Innermost context first, walking outward before failing.
    fn lookup(&self, identifier: &str) -> Result<Arc<ParameterExpression>, TranslationError> {
        for frame in self.contexts.iter().rev() {
            if let Some(parameter) = frame.get(identifier) {
                return Ok(parameter.clone());
            }
        }
        Err(TranslationError::UnboundIdentifier {
            identifier: identifier.to_string(),
        })
    }

    fn semantics_of(&self, node: NodeId) -> Result<&'c Semantics, TranslationError> {
        self.compilation
            .cached_semantics(node)
            .ok_or(TranslationError::MissingSemantics {
                span: self.compilation.query().span(node),
            })
    }

    fn lower(&mut self, node: NodeId) -> Result<Expression, TranslationError> {
        let kind = self.compilation.query().node(node).kind.clone();
        let span = self.compilation.query().span(node);
        match kind {
            ExprKind::Literal { kind, raw } => self.lower_literal(node, kind, raw, span),
            ExprKind::Reference { identifier } => {
                Ok(Expression::Parameter(self.lookup(&identifier)?))
            }
            ExprKind::MemberAccess { target, member } => {
                let ty = self.semantics_of(node)?.result_type.clone();
                let target = self.lower(target)?;
                Ok(Expression::Member {
                    target: Box::new(target),
                    property: member,
                    ty,
                })
            }
            ExprKind::Block { expressions } => match expressions.last() {
                Some(last) => self.lower(*last),
                // Identity query: the source itself.
                None => Ok(Expression::Parameter(self.lookup("$")?)),
            },
            ExprKind::Operation { operator, operands } => {
                self.lower_operation(node, operator, &operands, span)
            }
            ExprKind::AnonymousObject { properties } => {
                let semantics = self.semantics_of(node)?;
                let SemanticsDetail::Projection { object_type } = &semantics.detail else {
                    return Err(TranslationError::Unsupported {
                        detail: "anonymous object without projection semantics".to_string(),
                        span,
                    });
                };
                let object_type = object_type.clone();
                let ty = semantics.result_type.clone();
                let mut bindings = Vec::with_capacity(properties.len());
                for (name, value) in properties {
                    bindings.push((name, self.lower(value)?));
                }
                Ok(Expression::New {
                    object_type,
                    bindings,
                    ty,
                })
            }
            ExprKind::TypeConversion {
                target,
                target_type,
            } => {
                let operand = self.lower(target)?;
                Ok(Expression::Convert {
                    operand: Box::new(operand),
                    ty: target_type,
                })
            }
        }
    }

    fn lower_literal(
        &mut self,
        node: NodeId,
        kind: LiteralKind,
        raw: String,
        span: Span,
    ) -> Result<Expression, TranslationError> {
        let ty = self.semantics_of(node)?.result_type.clone();
        let value = match kind {
            LiteralKind::Null => Value::Null,
            LiteralKind::Bool => Value::Bool(raw == "true"),
            LiteralKind::Int => Value::Int(raw.parse().map_err(|_| {
                TranslationError::Unsupported {
                    detail: format!("integer literal '{}' out of range", raw),
                    span,
                }
            })?),
            LiteralKind::Hex => {
                let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
                Value::Int(i64::from_str_radix(digits, 16).map_err(|_| {
                    TranslationError::Unsupported {
                        detail: format!("hexadecimal literal '{}' out of range", raw),
                        span,
                    }
                })?)
            }
            LiteralKind::Float => Value::Float(raw.parse().map_err(|_| {
                TranslationError::Unsupported {
                    detail: format!("float literal '{}' out of range", raw),
                    span,
                }
            })?),
            LiteralKind::String => Value::String(raw),
        };
        Ok(Expression::Constant { value, ty })
    }

    fn lower_operation(
        &mut self,
        node: NodeId,
        operator: WebqlOperator,
        operands: &[NodeId],
        span: Span,
    ) -> Result<Expression, TranslationError> {
        let ty = self.semantics_of(node)?.result_type.clone();
        use OperatorCategory::*;
        match operator.category() {
            Arithmetic | Relational | StringRelational => {
                let left = self.lower(operands[0])?;
                let right = self.lower(operands[1])?;
                Ok(Expression::Binary {
                    operator: binary_operator(operator),
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                })
            }
            Logical => match operator {
                WebqlOperator::Not => {
                    let operand = self.lower(operands[0])?;
                    Ok(Expression::Unary {
                        operator: UnaryOperator::Not,
                        operand: Box::new(operand),
                        ty,
                    })
                }
                // n-ary and/or fold left-associatively
                _ => {
                    let mut lowered = operands.iter().map(|id| self.lower(*id));
                    let mut expression = lowered.next().expect("arity checked")?;
                    for right in lowered {
                        expression = Expression::Binary {
                            operator: binary_operator(operator),
                            left: Box::new(expression),
                            right: Box::new(right?),
                            ty: ty.clone(),
                        };
                    }
                    Ok(expression)
                }
            },
            Semantic => match operator {
                WebqlOperator::New => self.lower(operands[0]),
                WebqlOperator::Aggregate => {
                    let mut expressions = Vec::with_capacity(operands.len());
                    for operand in operands {
                        expressions.push(self.lower(*operand)?);
                    }
                    Ok(Expression::Sequence { expressions, ty })
                }
                other => {
                    return Err(TranslationError::Unsupported {
                        detail: format!("{} is not a semantic operator", other),
                        span,
                    })
                }
            },
            CollectionManipulation | CollectionAggregation => {
                let method = queryable_method(operator);
                let source = self.lower(operands[0])?;
                let arguments = match operator.lambda_operand() {
                    Some(index) => vec![self.lower_lambda(operands[index])?],
                    None => {
                        let mut arguments = Vec::new();
                        for operand in &operands[1..] {
                            arguments.push(self.lower(*operand)?);
                        }
                        arguments
                    }
                };
                Ok(Expression::Call {
                    method,
                    source: Box::new(source),
                    arguments,
                    ty,
                })
            }
        }
    }

    /// Builds the lambda for an element-scoped operand: one fresh parameter
    /// per scope, shared by every `$` occurrence inside the body.
    fn lower_lambda(&mut self, body: NodeId) -> Result<Expression, TranslationError> {
        let symbol = self
            .compilation
            .resolve_symbol(body, "$")
            .map_err(|_| TranslationError::UnboundIdentifier {
                identifier: "$".to_string(),
            })?;
        let parameter = Arc::new(ParameterExpression {
            name: "$".to_string(),
            ty: symbol.declared_type.clone(),
        });
        self.contexts.push(HashMap::new());
        self.declare("$", parameter.clone())?;
        let lowered = self.lower(body);
        self.contexts.pop();
        Ok(Expression::Lambda {
            parameter,
            body: Box::new(lowered?),
        })
    }
}

fn binary_operator(operator: WebqlOperator) -> BinaryOperator {
    use WebqlOperator::*;
    match operator {
        Add => BinaryOperator::Add,
        Subtract => BinaryOperator::Subtract,
        Multiply => BinaryOperator::Multiply,
        Divide => BinaryOperator::Divide,
        Equals => BinaryOperator::Equal,
        NotEquals => BinaryOperator::NotEqual,
        Less => BinaryOperator::Less,
        LessEquals => BinaryOperator::LessEqual,
        Greater => BinaryOperator::Greater,
        GreaterEquals => BinaryOperator::GreaterEqual,
        And => BinaryOperator::And,
        Or => BinaryOperator::Or,
        Like => BinaryOperator::Like,
        RegexMatch => BinaryOperator::RegexMatch,
        other => unreachable!("{} has no binary form", other),
    }
}

fn queryable_method(operator: WebqlOperator) -> QueryableMethod {
    use WebqlOperator::*;
    match operator {
        Filter => QueryableMethod::Where,
        Select => QueryableMethod::Select,
        SelectMany => QueryableMethod::SelectMany,
        Limit => QueryableMethod::Take,
        Skip => QueryableMethod::Skip,
        Count => QueryableMethod::Count,
        Contains => QueryableMethod::Contains,
        Index => QueryableMethod::ElementAt,
        Any => QueryableMethod::Any,
        All => QueryableMethod::All,
        Min => QueryableMethod::Min,
        Max => QueryableMethod::Max,
        Sum => QueryableMethod::Sum,
        Average => QueryableMethod::Average,
        other => unreachable!("{} is not a queryable method", other),
    }
}
