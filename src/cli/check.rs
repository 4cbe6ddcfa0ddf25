//! Compile and run webql queries against JSON input.

use super::CliError;
use crate::types::WebqlType;
use crate::value::Value;
use crate::{check_syntax, compile};

/// Options for the check command.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The query to compile
    pub query: String,
    /// JSON input: an array of rows
    pub input: Option<String>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Only validate syntax, don't compile against a source or execute
    pub syntax_only: bool,
}

/// Result of a check operation.
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Query executed successfully with JSON output
    Success(serde_json::Value),
}

/// Compiles the query, infers the source element type from the input rows,
/// executes, and returns the result as JSON.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    if options.syntax_only {
        check_syntax(&options.query)?;
        return Ok(CheckResult::SyntaxValid);
    }

    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json: serde_json::Value = serde_json::from_str(json_str)?;
    let serde_json::Value::Array(items) = &json else {
        return Err(CliError::NotRows(json_type_name(&json).to_string()));
    };

    let source_type = WebqlType::of_json(&json);
    let element_type = source_type
        .element_type()
        .cloned()
        .expect("arrays infer to queryables");

    let query = compile(&options.query, element_type)?;
    let rows = items.iter().map(Value::from_json);
    let result = query.execute(rows)?;

    Ok(CheckResult::Success(result.to_json()))
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_only_does_not_need_input() {
        let options = CheckOptions {
            query: "{ $filter: { age: { $greaterEquals: 18 } } }".to_string(),
            syntax_only: true,
            ..Default::default()
        };
        assert!(matches!(
            execute_check(&options).unwrap(),
            CheckResult::SyntaxValid
        ));
    }

    #[test]
    fn executes_against_inferred_rows() {
        let options = CheckOptions {
            query: "{ $filter: { age: { $greaterEquals: 18 } } }".to_string(),
            input: Some(r#"[{"age":17},{"age":18},{"age":19}]"#.to_string()),
            ..Default::default()
        };
        let CheckResult::Success(output) = execute_check(&options).unwrap() else {
            panic!("expected execution");
        };
        assert_eq!(output, serde_json::json!([{ "age": 18 }, { "age": 19 }]));
    }

    #[test]
    fn non_array_input_is_rejected() {
        let options = CheckOptions {
            query: "{}".to_string(),
            input: Some(r#"{"age":17}"#.to_string()),
            ..Default::default()
        };
        assert!(matches!(
            execute_check(&options),
            Err(CliError::NotRows(_))
        ));
    }
}
