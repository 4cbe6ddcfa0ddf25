//! The compilation pipeline: text -> tokens -> CST -> AST -> bound AST ->
//! expression tree.
//!
//! Each stage runs synchronously on the calling thread and fails fast; a
//! failed compilation yields nothing. Every call allocates its own AST and
//! side tables — the only shared state is the immutable builtin grammar and
//! its parse table.

use std::sync::Arc;

use crate::ast::AstBuilder;
use crate::error::CompileError;
use crate::evaluator::{EvalError, Evaluator};
use crate::expr::{Expression, ParameterExpression};
use crate::lexer::tokenize;
use crate::parser::{webql_parse_table, Parser};
use crate::scope::Binder;
use crate::semantics::{Compilation, SemanticAnalyzer};
use crate::translator::Translator;
use crate::types::WebqlType;
use crate::value::Value;

/// A compiled query: a typed lambda from a queryable of the source element
/// type to the query's result. Apply it to rows with
/// [`CompiledQuery::execute`], or walk [`CompiledQuery::expression`] from
/// another backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    source_type: WebqlType,
    result_type: WebqlType,
    source_parameter: Arc<ParameterExpression>,
    body: Expression,
}

impl CompiledQuery {
    /// The queryable type this query runs against.
    pub fn source_type(&self) -> &WebqlType {
        &self.source_type
    }

    /// The static type of the query's result.
    pub fn result_type(&self) -> &WebqlType {
        &self.result_type
    }

    /// The lambda body over [`CompiledQuery::parameter`].
    pub fn expression(&self) -> &Expression {
        &self.body
    }

    /// The parameter the body closes over: the source queryable.
    pub fn parameter(&self) -> &Arc<ParameterExpression> {
        &self.source_parameter
    }

    /// Runs the query against a collection of rows.
    pub fn execute(
        &self,
        rows: impl IntoIterator<Item = Value>,
    ) -> Result<Value, EvalError> {
        let source = Value::Sequence(rows.into_iter().collect());
        let mut evaluator = Evaluator::new();
        evaluator.run(&self.source_parameter, source, &self.body)
    }
}

/// Compiles a query against a source element type.
///
/// # Examples
///
/// ```
/// use webql::{compile, ObjectType, Value, WebqlType};
///
/// let element = WebqlType::object(ObjectType::named(
///     "person",
///     vec![("age".to_string(), WebqlType::Int)],
/// ));
/// let query = compile("{ $filter: { age: { $greaterEquals: 18 } } }", element).unwrap();
///
/// let rows = [17, 18, 19].map(|age| {
///     Value::record("person", vec![("age".to_string(), Value::Int(age))])
/// });
/// let kept = query.execute(rows).unwrap();
/// assert_eq!(kept.as_sequence().unwrap().len(), 2);
/// ```
pub fn compile(query_text: &str, element_type: WebqlType) -> Result<CompiledQuery, CompileError> {
    let tokens = tokenize(query_text)?;
    let cst = Parser::new(webql_parse_table()).parse(&tokens)?;
    let query = AstBuilder::build(&cst)?;

    let mut compilation = Compilation::new(query, element_type);
    let analyzer = SemanticAnalyzer::new();
    Binder::bind(&mut compilation, &analyzer)?;
    analyzer.analyze(&mut compilation)?;

    let (source_parameter, body) = Translator::translate(&compilation)?;
    Ok(CompiledQuery {
        source_type: compilation.source_type().clone(),
        result_type: body.result_type().clone(),
        source_parameter,
        body,
    })
}

/// Validates a query's syntax (tokenize, parse, build the AST) without
/// binding it to a source type.
pub fn check_syntax(query_text: &str) -> Result<(), CompileError> {
    let tokens = tokenize(query_text)?;
    let cst = Parser::new(webql_parse_table()).parse(&tokens)?;
    AstBuilder::build(&cst)?;
    Ok(())
}
