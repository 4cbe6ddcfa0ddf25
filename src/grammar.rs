//! Grammar-as-data: declarative production rules over a small symbol algebra.
//!
//! A [`Grammar`] is a start symbol plus a set of [`ProductionRule`]s whose
//! bodies compose [`GrammarSymbol`]s: terminals (token kind, optionally
//! narrowed to an exact lexeme), non-terminals, epsilon, and macros for
//! optional / repeated / alternative / grouped sequences. The parse table in
//! [`crate::parser::table`] normalizes the macros away; this module only
//! describes shape and checks referential soundness.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use crate::error::GrammarError;
use crate::token::TokenKind;

/// An ordered sequence of symbols: a production body or a macro operand.
pub type Sentence = Vec<GrammarSymbol>;

/// A terminal: matches tokens of `kind`, and when `value` is set, only
/// tokens whose lexeme equals it. This is what lets a grammar tell
/// `$equals` apart from `$add` while keeping a generic identifier fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalSymbol {
    pub kind: TokenKind,
    pub value: Option<String>,
}

impl fmt::Display for TerminalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "'{}'", value),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrammarSymbol {
    Terminal(TerminalSymbol),
    NonTerminal(String),
    Epsilon,
    Macro(MacroSymbol),
}

/// Composition macros over inner sentences.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroSymbol {
    /// Zero or one occurrence of the sentence
    Option(Sentence),
    /// Zero or more occurrences of the sentence
    Repetition(Sentence),
    /// Exactly one of the alternative sentences
    Alternative(Vec<Sentence>),
    /// The sentence as a unit (useful inside other macros)
    Grouping(Sentence),
}

/// head -> body
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRule {
    pub head: String,
    pub body: Sentence,
}

impl ProductionRule {
    pub fn new(head: impl Into<String>, body: Sentence) -> Self {
        ProductionRule {
            head: head.into(),
            body,
        }
    }
}

// Constructor shorthands used by grammar definitions and tests.

pub fn nt(name: &str) -> GrammarSymbol {
    GrammarSymbol::NonTerminal(name.to_string())
}

pub fn term(kind: TokenKind) -> GrammarSymbol {
    GrammarSymbol::Terminal(TerminalSymbol { kind, value: None })
}

pub fn term_value(kind: TokenKind, value: &str) -> GrammarSymbol {
    GrammarSymbol::Terminal(TerminalSymbol {
        kind,
        value: Some(value.to_string()),
    })
}

pub fn punct(ch: char) -> GrammarSymbol {
    term_value(TokenKind::Punctuation, &ch.to_string())
}

pub fn opt(inner: Sentence) -> GrammarSymbol {
    GrammarSymbol::Macro(MacroSymbol::Option(inner))
}

pub fn rep(inner: Sentence) -> GrammarSymbol {
    GrammarSymbol::Macro(MacroSymbol::Repetition(inner))
}

pub fn alt(alternatives: Vec<Sentence>) -> GrammarSymbol {
    GrammarSymbol::Macro(MacroSymbol::Alternative(alternatives))
}

pub fn group(inner: Sentence) -> GrammarSymbol {
    GrammarSymbol::Macro(MacroSymbol::Grouping(inner))
}

/// A validated grammar: every non-terminal referenced anywhere in a body has
/// at least one production of its own. Immutable after construction and safe
/// to share across threads.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: String,
    rules: Vec<ProductionRule>,
}

impl Grammar {
    pub fn new(
        start: impl Into<String>,
        rules: Vec<ProductionRule>,
    ) -> Result<Grammar, GrammarError> {
        let start = start.into();
        let heads: HashSet<&str> = rules.iter().map(|r| r.head.as_str()).collect();
        if !heads.contains(start.as_str()) {
            return Err(GrammarError::UnknownNonTerminal {
                referenced: start.clone(),
                within: "<start>".to_string(),
            });
        }
        for rule in &rules {
            check_references(&rule.head, &rule.body, &heads)?;
        }
        Ok(Grammar { start, rules })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn rules(&self) -> &[ProductionRule] {
        &self.rules
    }
}

fn check_references(
    head: &str,
    sentence: &Sentence,
    heads: &HashSet<&str>,
) -> Result<(), GrammarError> {
    for symbol in sentence {
        match symbol {
            GrammarSymbol::NonTerminal(name) => {
                if !heads.contains(name.as_str()) {
                    return Err(GrammarError::UnknownNonTerminal {
                        referenced: name.clone(),
                        within: head.to_string(),
                    });
                }
            }
            GrammarSymbol::Macro(MacroSymbol::Option(inner))
            | GrammarSymbol::Macro(MacroSymbol::Repetition(inner))
            | GrammarSymbol::Macro(MacroSymbol::Grouping(inner)) => {
                check_references(head, inner, heads)?;
            }
            GrammarSymbol::Macro(MacroSymbol::Alternative(alternatives)) => {
                for alternative in alternatives {
                    check_references(head, alternative, heads)?;
                }
            }
            GrammarSymbol::Terminal(_) | GrammarSymbol::Epsilon => {}
        }
    }
    Ok(())
}

/// Rule names of the builtin Webql grammar, shared with the AST builder.
pub mod rules {
    pub const QUERY: &str = "query";
    pub const OBJECT: &str = "object";
    pub const MEMBERS: &str = "members";
    pub const MEMBER: &str = "member";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
    pub const ARRAY: &str = "array";
    pub const ELEMENTS: &str = "elements";
}

/// The Webql source grammar: a JSON superset whose keys may be bare
/// identifiers and whose scalars include hexadecimal literals and
/// identifier-spelled keywords (`true`, `false`, `null`, `$`, `$filter`...).
pub fn webql_grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        use rules::*;
        Grammar::new(
            QUERY,
            vec![
                ProductionRule::new(QUERY, vec![nt(OBJECT)]),
                ProductionRule::new(
                    OBJECT,
                    vec![punct('{'), opt(vec![nt(MEMBERS)]), punct('}')],
                ),
                ProductionRule::new(
                    MEMBERS,
                    vec![nt(MEMBER), rep(vec![punct(','), nt(MEMBER)])],
                ),
                ProductionRule::new(MEMBER, vec![nt(KEY), punct(':'), nt(VALUE)]),
                ProductionRule::new(
                    KEY,
                    vec![alt(vec![
                        vec![term(TokenKind::Identifier)],
                        vec![term(TokenKind::String)],
                    ])],
                ),
                ProductionRule::new(
                    ARRAY,
                    vec![punct('['), opt(vec![nt(ELEMENTS)]), punct(']')],
                ),
                ProductionRule::new(
                    ELEMENTS,
                    vec![nt(VALUE), rep(vec![punct(','), nt(VALUE)])],
                ),
                ProductionRule::new(
                    VALUE,
                    vec![alt(vec![
                        vec![nt(OBJECT)],
                        vec![nt(ARRAY)],
                        vec![term(TokenKind::String)],
                        vec![term(TokenKind::Integer)],
                        vec![term(TokenKind::Float)],
                        vec![term(TokenKind::Hexadecimal)],
                        vec![term(TokenKind::Identifier)],
                    ])],
                ),
            ],
        )
        .expect("builtin grammar is sound")
    })
}
