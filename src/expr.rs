//! The typed expression-tree IR the compiler emits.
//!
//! This is the composable, serializable output of translation: a lambda
//! from the source queryable to the query's result, built from constants,
//! parameters, member accesses, binary/unary operators, conversions,
//! lambdas, queryable method calls, and record construction. The tree is
//! immutable once built; [`crate::evaluator::Evaluator`] executes it, and
//! other backends are free to walk it into their own query language.
//!
//! Parameter identity matters: within one lambda scope every reference to
//! the element reuses the same [`ParameterExpression`] instance (compare
//! with [`std::sync::Arc::ptr_eq`]).

use std::sync::Arc;

use crate::types::{ObjectType, WebqlType};
use crate::value::Value;

/// A named, typed lambda parameter. Structural equality; referential
/// identity is what binds occurrences to their lambda at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpression {
    pub name: String,
    pub ty: WebqlType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    /// SQL-style pattern match
    Like,
    /// Regular-expression match
    RegexMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

/// The standard queryable-sequence operators a [`Expression::Call`] can
/// target, mirroring the query operators one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryableMethod {
    Where,
    Select,
    SelectMany,
    Take,
    Skip,
    Count,
    Contains,
    ElementAt,
    Any,
    All,
    Min,
    Max,
    Sum,
    Average,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant {
        value: Value,
        ty: WebqlType,
    },
    Parameter(Arc<ParameterExpression>),
    Member {
        target: Box<Expression>,
        property: String,
        ty: WebqlType,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        ty: WebqlType,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
        ty: WebqlType,
    },
    Convert {
        operand: Box<Expression>,
        ty: WebqlType,
    },
    Lambda {
        parameter: Arc<ParameterExpression>,
        body: Box<Expression>,
    },
    /// A queryable operator applied to a source, e.g.
    /// `Where(source, element => predicate)`.
    Call {
        method: QueryableMethod,
        source: Box<Expression>,
        arguments: Vec<Expression>,
        ty: WebqlType,
    },
    /// Construction of a synthesized record type.
    New {
        object_type: Arc<ObjectType>,
        bindings: Vec<(String, Expression)>,
        ty: WebqlType,
    },
    /// Ordered evaluation; yields the last expression (`$aggregate`).
    Sequence {
        expressions: Vec<Expression>,
        ty: WebqlType,
    },
}

impl Expression {
    /// The static type this expression evaluates to. Lambdas answer with
    /// their body's type.
    pub fn result_type(&self) -> &WebqlType {
        match self {
            Expression::Constant { ty, .. }
            | Expression::Member { ty, .. }
            | Expression::Binary { ty, .. }
            | Expression::Unary { ty, .. }
            | Expression::Convert { ty, .. }
            | Expression::Call { ty, .. }
            | Expression::New { ty, .. }
            | Expression::Sequence { ty, .. } => ty,
            Expression::Parameter(parameter) => &parameter.ty,
            Expression::Lambda { body, .. } => body.result_type(),
        }
    }
}
