//! Error taxonomy for the compilation pipeline.
//!
//! Every stage fails fast with its own typed error; [`CompileError`] is the
//! umbrella surfaced by [`crate::compile`]. Grammar construction errors
//! ([`GrammarError`]) are build-time defects in a grammar definition and are
//! kept apart from [`SyntaxError`], which reports defects in user queries.

use crate::token::{Position, Span};
use thiserror::Error;

/// Tokenizer failures. Fatal: tokenization aborts at the offending position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexicalError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedCharacter { ch: char, position: Position },

    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },

    #[error("invalid escape sequence '\\{ch}' at {position}")]
    InvalidEscape { ch: char, position: Position },

    #[error("malformed numeric literal '{lexeme}' at {position}")]
    MalformedNumber { lexeme: String, position: Position },
}

/// Defects in a grammar definition, detected while building its parse table,
/// never at query-parse time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("non-terminal <{referenced}> is used by <{within}> but has no production")]
    UnknownNonTerminal { referenced: String, within: String },

    #[error(
        "grammar conflict: two productions of <{non_terminal}> are triggered by {lookahead}"
    )]
    Conflict {
        non_terminal: String,
        lookahead: String,
    },

    #[error("left recursion detected: {cycle}")]
    LeftRecursion { cycle: String },
}

/// User-query parse failures, reported with expected-vs-actual detail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found} at {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },

    #[error("unknown operator '${name}' at {span}")]
    UnknownOperator { name: String, span: Span },

    #[error("array is only legal as an operator's operand list ({span})")]
    MisplacedArray { span: Span },

    #[error("$new expects an object of properties, found {found} at {span}")]
    MalformedProjection { found: String, span: Span },
}

/// Failures of semantic analysis: scoping, arity, member resolution, typing.
/// Always carries the offending node's source span.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("operator ${operator} expects {expected} operand(s), got {actual} at {span}")]
    ArityMismatch {
        operator: &'static str,
        expected: String,
        actual: usize,
        span: Span,
    },

    #[error("symbol '{identifier}' not found at {span}")]
    SymbolNotFound { identifier: String, span: Span },

    #[error("symbol '{identifier}' is already declared in this scope")]
    SymbolAlreadyDeclared { identifier: String },

    #[error("type '{type_name}' has no property '{property}' ({span})")]
    PropertyNotFound {
        type_name: String,
        property: String,
        span: Span,
    },

    #[error("expression is not queryable: found '{found}' at {span}")]
    NotQueryable { found: String, span: Span },

    #[error("null literal is only legal as one operand of a binary operator ({span})")]
    IllegalNullLiteral { span: Span },
}

/// Lowering failures. Defensive by design: a semantically valid AST should
/// always lower, so any of these indicates an analyzer/translator mismatch
/// bug rather than a defect in the user's query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    #[error("identifier '{identifier}' is already bound in this translation context")]
    DuplicateBinding { identifier: String },

    #[error("identifier '{identifier}' is not bound in any translation context")]
    UnboundIdentifier { identifier: String },

    #[error("no cached semantics for node at {span}; analyzer and translator disagree")]
    MissingSemantics { span: Span },

    #[error("cannot lower expression at {span}: {detail}")]
    Unsupported { detail: String, span: Span },
}

/// Umbrella error returned by [`crate::compile`]. One variant per stage;
/// no stage catches or rewraps an earlier stage's error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Translation(#[from] TranslationError),
}
