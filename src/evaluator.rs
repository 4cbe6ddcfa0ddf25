//! Executes compiled expression trees against runtime [`Value`]s.
//!
//! The evaluator is one possible backend for the expression IR: it binds
//! lambda parameters by instance identity on a stack and walks the tree.
//! Mixed integer/float arithmetic goes through high-precision decimals so
//! whole-number results stay integers instead of drifting through `f64`.

use std::sync::Arc;

use regex::Regex;
use rust_decimal::{prelude::FromPrimitive, prelude::ToPrimitive, Decimal};
use thiserror::Error;

use crate::expr::{
    BinaryOperator, Expression, ParameterExpression, QueryableMethod, UnaryOperator,
};
use crate::types::WebqlType;
use crate::value::{type_name, Record, Value};

/// Errors that can occur while running a compiled query.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// Value shape does not match what the operator needs
    #[error("type error: {0}")]
    TypeError(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// A record is missing a field the query accesses
    #[error("record has no field '{0}'")]
    MissingField(String),

    /// A `$like`/`$regexMatch` pattern failed to compile
    #[error("invalid pattern '{0}'")]
    InvalidPattern(String),

    /// min/max/average over an empty sequence
    #[error("sequence is empty")]
    EmptySequence,

    /// `$index` beyond the sequence bounds
    #[error("index {0} is out of bounds")]
    IndexOutOfBounds(i64),
}

/// The expression-tree interpreter. One instance per execution; parameter
/// bindings form a stack, innermost last, matched by parameter identity.
#[derive(Default)]
pub struct Evaluator {
    bindings: Vec<(Arc<ParameterExpression>, Value)>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `parameter` to `value` and evaluates `body` under it.
    pub fn run(
        &mut self,
        parameter: &Arc<ParameterExpression>,
        value: Value,
        body: &Expression,
    ) -> Result<Value, EvalError> {
        self.bindings.push((parameter.clone(), value));
        let result = self.eval(body);
        self.bindings.pop();
        result
    }

    fn eval(&mut self, expression: &Expression) -> Result<Value, EvalError> {
        match expression {
            Expression::Constant { value, .. } => Ok(value.clone()),
            Expression::Parameter(parameter) => self.lookup(parameter),
            Expression::Member { target, property, .. } => {
                let target = self.eval(target)?;
                match target {
                    Value::Record(record) => record
                        .get(property)
                        .cloned()
                        .ok_or_else(|| EvalError::MissingField(property.clone())),
                    other => Err(EvalError::TypeError(format!(
                        "cannot access '{}' on {}",
                        property,
                        type_name(&other)
                    ))),
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
                ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_binary(*operator, &left, &right)
            }
            Expression::Unary { operator, operand, .. } => {
                let operand = self.eval(operand)?;
                match operator {
                    UnaryOperator::Not => match operand {
                        Value::Bool(b) => Ok(Value::Bool(!b)),
                        other => Err(EvalError::TypeError(format!(
                            "cannot negate {}",
                            type_name(&other)
                        ))),
                    },
                }
            }
            Expression::Convert { operand, ty } => {
                let value = self.eval(operand)?;
                convert(value, ty)
            }
            Expression::Lambda { .. } => Err(EvalError::TypeError(
                "lambda is not a value outside a queryable call".to_string(),
            )),
            Expression::Call {
                method,
                source,
                arguments,
                ty,
            } => {
                let items = match self.eval(source)? {
                    Value::Sequence(items) => items,
                    other => {
                        return Err(EvalError::TypeError(format!(
                            "{:?} needs a sequence, found {}",
                            method,
                            type_name(&other)
                        )));
                    }
                };
                self.call(*method, items, arguments, ty)
            }
            Expression::New {
                object_type,
                bindings,
                ..
            } => {
                let mut fields = Vec::with_capacity(bindings.len());
                for (name, value) in bindings {
                    fields.push((name.clone(), self.eval(value)?));
                }
                Ok(Value::Record(Record::new(object_type.name(), fields)))
            }
            Expression::Sequence { expressions, .. } => {
                let mut last = Value::Null;
                for expression in expressions {
                    last = self.eval(expression)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, parameter: &Arc<ParameterExpression>) -> Result<Value, EvalError> {
        for (bound, value) in self.bindings.iter().rev() {
            if Arc::ptr_eq(bound, parameter) {
                return Ok(value.clone());
            }
        }
        Err(EvalError::TypeError(format!(
            "parameter '{}' is not bound",
            parameter.name
        )))
    }

    fn apply_lambda(&mut self, lambda: &Expression, item: Value) -> Result<Value, EvalError> {
        let Expression::Lambda { parameter, body } = lambda else {
            return Err(EvalError::TypeError(
                "queryable operator expects a lambda argument".to_string(),
            ));
        };
        self.run(parameter, item, body)
    }

    fn predicate(&mut self, lambda: &Expression, item: Value) -> Result<bool, EvalError> {
        match self.apply_lambda(lambda, item)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::TypeError(format!(
                "predicate yielded {}, expected bool",
                type_name(&other)
            ))),
        }
    }

    fn call(
        &mut self,
        method: QueryableMethod,
        items: Vec<Value>,
        arguments: &[Expression],
        ty: &WebqlType,
    ) -> Result<Value, EvalError> {
        match method {
            QueryableMethod::Where => {
                let lambda = &arguments[0];
                let mut kept = Vec::new();
                for item in items {
                    if self.predicate(lambda, item.clone())? {
                        kept.push(item);
                    }
                }
                Ok(Value::Sequence(kept))
            }
            QueryableMethod::Select => {
                let lambda = &arguments[0];
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(self.apply_lambda(lambda, item)?);
                }
                Ok(Value::Sequence(mapped))
            }
            QueryableMethod::SelectMany => {
                let lambda = &arguments[0];
                let mut flattened = Vec::new();
                for item in items {
                    match self.apply_lambda(lambda, item)? {
                        Value::Sequence(inner) => flattened.extend(inner),
                        other => {
                            return Err(EvalError::TypeError(format!(
                                "selectMany selector yielded {}, expected a sequence",
                                type_name(&other)
                            )));
                        }
                    }
                }
                Ok(Value::Sequence(flattened))
            }
            QueryableMethod::Take => {
                let count = self.int_argument(&arguments[0])?.max(0) as usize;
                Ok(Value::Sequence(items.into_iter().take(count).collect()))
            }
            QueryableMethod::Skip => {
                let count = self.int_argument(&arguments[0])?.max(0) as usize;
                Ok(Value::Sequence(items.into_iter().skip(count).collect()))
            }
            QueryableMethod::Count => Ok(Value::Int(items.len() as i64)),
            QueryableMethod::Contains => {
                let needle = self.eval(&arguments[0])?;
                Ok(Value::Bool(items.iter().any(|item| values_equal(item, &needle))))
            }
            QueryableMethod::ElementAt => {
                let index = self.int_argument(&arguments[0])?;
                let out_of_bounds = EvalError::IndexOutOfBounds(index);
                if index < 0 {
                    return Err(out_of_bounds);
                }
                items.into_iter().nth(index as usize).ok_or(out_of_bounds)
            }
            QueryableMethod::Any => {
                let lambda = &arguments[0];
                for item in items {
                    if self.predicate(lambda, item)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            QueryableMethod::All => {
                let lambda = &arguments[0];
                for item in items {
                    if !self.predicate(lambda, item)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            QueryableMethod::Min | QueryableMethod::Max => {
                let lambda = &arguments[0];
                let mut best: Option<Value> = None;
                for item in items {
                    let candidate = self.apply_lambda(lambda, item)?;
                    best = Some(match best {
                        None => candidate,
                        Some(current) => {
                            let keep_candidate = match method {
                                QueryableMethod::Min => compare(&candidate, &current)?.is_lt(),
                                _ => compare(&candidate, &current)?.is_gt(),
                            };
                            if keep_candidate {
                                candidate
                            } else {
                                current
                            }
                        }
                    });
                }
                best.ok_or(EvalError::EmptySequence)
            }
            QueryableMethod::Sum => {
                let lambda = &arguments[0];
                let mut total = Decimal::ZERO;
                for item in items {
                    total += to_decimal(&self.apply_lambda(lambda, item)?)?;
                }
                decimal_to(total, ty)
            }
            QueryableMethod::Average => {
                if items.is_empty() {
                    return Err(EvalError::EmptySequence);
                }
                let lambda = &arguments[0];
                let count = Decimal::from(items.len() as i64);
                let mut total = Decimal::ZERO;
                for item in items {
                    total += to_decimal(&self.apply_lambda(lambda, item)?)?;
                }
                decimal_to(total / count, ty)
            }
        }
    }

    fn int_argument(&mut self, argument: &Expression) -> Result<i64, EvalError> {
        match self.eval(argument)? {
            Value::Int(n) => Ok(n),
            other => Err(EvalError::TypeError(format!(
                "expected an integer argument, found {}",
                type_name(&other)
            ))),
        }
    }
}

fn convert(value: Value, ty: &WebqlType) -> Result<Value, EvalError> {
    match (ty, value) {
        (WebqlType::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
        (WebqlType::Float, Value::Float(f)) => Ok(Value::Float(f)),
        (WebqlType::Int, Value::Float(f)) => Ok(Value::Int(f.trunc() as i64)),
        (WebqlType::Int, Value::Int(n)) => Ok(Value::Int(n)),
        (WebqlType::String, Value::String(s)) => Ok(Value::String(s)),
        (WebqlType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ty, value) => Err(EvalError::TypeError(format!(
            "cannot convert {} to {}",
            type_name(&value),
            ty
        ))),
    }
}

fn apply_binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use BinaryOperator::*;
    match operator {
        Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => arithmetic(left, right, i64::checked_add, |a, b| a + b, |a, b| a + b),
        },
        Subtract => arithmetic(left, right, i64::checked_sub, |a, b| a - b, |a, b| a - b),
        Multiply => arithmetic(left, right, i64::checked_mul, |a, b| a * b, |a, b| a * b),
        Divide => match (left, right) {
            (_, Value::Int(0)) => Err(EvalError::DivisionByZero),
            (_, Value::Float(z)) if *z == 0.0 => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                decimal_arithmetic(left, right, |a, b| a / b)
            }
            (a, b) => Err(EvalError::TypeError(format!(
                "cannot divide {} by {}",
                type_name(a),
                type_name(b)
            ))),
        },
        Equal => Ok(Value::Bool(values_equal(left, right))),
        NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        Less => Ok(Value::Bool(compare(left, right)?.is_lt())),
        LessEqual => Ok(Value::Bool(compare(left, right)?.is_le())),
        Greater => Ok(Value::Bool(compare(left, right)?.is_gt())),
        GreaterEqual => Ok(Value::Bool(compare(left, right)?.is_ge())),
        And => logical(left, right, |a, b| a && b),
        Or => logical(left, right, |a, b| a || b),
        Like => {
            let (text, pattern) = string_operands(left, right, "like")?;
            Ok(Value::Bool(like_regex(pattern)?.is_match(text)))
        }
        RegexMatch => {
            let (text, pattern) = string_operands(left, right, "regexMatch")?;
            let regex = Regex::new(pattern)
                .map_err(|_| EvalError::InvalidPattern(pattern.to_string()))?;
            Ok(Value::Bool(regex.is_match(text)))
        }
    }
}

/// Matched-type arms stay native; mixed int/float arms go through decimals
/// and keep whole results integral.
fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
    decimal_op: impl Fn(Decimal, Decimal) -> Decimal,
) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| EvalError::TypeError("integer overflow".to_string())),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(*a, *b))),
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            decimal_arithmetic(left, right, decimal_op)
        }
        (a, b) => Err(EvalError::TypeError(format!(
            "cannot combine {} and {} arithmetically",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn decimal_arithmetic(
    left: &Value,
    right: &Value,
    op: impl Fn(Decimal, Decimal) -> Decimal,
) -> Result<Value, EvalError> {
    let a = to_decimal(left)?;
    let b = to_decimal(right)?;
    let result = op(a, b);
    if result.is_integer()
        && let Some(n) = result.to_i64()
    {
        return Ok(Value::Int(n));
    }
    Ok(Value::Float(result.to_f64().unwrap_or(f64::NAN)))
}

fn to_decimal(value: &Value) -> Result<Decimal, EvalError> {
    let decimal = match value {
        Value::Int(n) => Decimal::from_i64(*n),
        Value::Float(f) => Decimal::from_f64(*f),
        other => {
            return Err(EvalError::TypeError(format!(
                "expected a number, found {}",
                type_name(other)
            )));
        }
    };
    decimal.ok_or_else(|| EvalError::TypeError("number out of decimal range".to_string()))
}

fn decimal_to(value: Decimal, ty: &WebqlType) -> Result<Value, EvalError> {
    match ty {
        WebqlType::Int => value
            .round()
            .to_i64()
            .map(Value::Int)
            .ok_or_else(|| EvalError::TypeError("sum out of integer range".to_string())),
        _ => Ok(Value::Float(value.to_f64().unwrap_or(f64::NAN))),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = match (left.as_float(), right.as_float()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(EvalError::TypeError(format!(
                        "cannot order {} against {}",
                        type_name(left),
                        type_name(right)
                    )));
                }
            };
            a.partial_cmp(&b).ok_or_else(|| {
                EvalError::TypeError("cannot order against NaN".to_string())
            })
        }
    }
}

fn logical(
    left: &Value,
    right: &Value,
    op: impl Fn(bool, bool) -> bool,
) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(op(*a, *b))),
        (a, b) => Err(EvalError::TypeError(format!(
            "logical operator needs bools, found {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn string_operands<'v>(
    left: &'v Value,
    right: &'v Value,
    operator: &str,
) -> Result<(&'v str, &'v str), EvalError> {
    match (left, right) {
        (Value::String(text), Value::String(pattern)) => Ok((text, pattern)),
        (a, b) => Err(EvalError::TypeError(format!(
            "{} needs strings, found {} and {}",
            operator,
            type_name(a),
            type_name(b)
        ))),
    }
}

/// `%` matches any run, `_` a single character; everything else literally.
fn like_regex(pattern: &str) -> Result<Regex, EvalError> {
    let mut translated = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|_| EvalError::InvalidPattern(pattern.to_string()))
}
