//! CLI support for webql
//!
//! Provides programmatic access to the `check` command so other hosts can
//! embed it. The CLI is just one host of the compiler: it supplies a
//! queryable (JSON rows) and renders the compiled query's result.

mod check;

pub use check::{execute_check, CheckOptions, CheckResult};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("compile error: {0}")]
    Compile(#[from] crate::CompileError),

    #[error("evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no input provided; use --input or pipe JSON to stdin")]
    NoInput,

    #[error("input must be a JSON array of rows, found {0}")]
    NotRows(String),
}
