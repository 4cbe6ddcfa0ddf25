//! LL(1) parse-table construction.
//!
//! Macros are normalized into synthesized helper non-terminals (marked with
//! `#`, spliced out of the CST), then nullability, FIRST and FOLLOW sets are
//! computed by worklist fixed-point iteration. Table entries are keyed by
//! (non-terminal, token kind, exact lexeme) with a kind-only fallback, so a
//! grammar can dedicate productions to `$equals` while keeping a generic
//! identifier rule. Overlapping predict sets and left recursion are defects
//! of the grammar and fail table construction.

use std::collections::{HashMap, HashSet};

use crate::error::GrammarError;
use crate::grammar::{Grammar, GrammarSymbol, MacroSymbol, Sentence, TerminalSymbol};
use crate::token::{Token, TokenKind};

/// Identity of a terminal inside FIRST/FOLLOW sets and table keys.
pub type TerminalKey = (TokenKind, Option<String>);

fn key_of(terminal: &TerminalSymbol) -> TerminalKey {
    (terminal.kind, terminal.value.clone())
}

fn display_key(key: &TerminalKey) -> String {
    match &key.1 {
        Some(value) => format!("'{}'", value),
        None => key.0.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NormalSymbol {
    Terminal(TerminalSymbol),
    NonTerminal(String),
}

/// A macro-free production. An empty body is an epsilon production.
#[derive(Debug, Clone)]
pub(crate) struct Production {
    pub head: String,
    pub body: Vec<NormalSymbol>,
}

struct Normalizer {
    productions: Vec<Production>,
    synthetic: HashSet<String>,
    counter: usize,
}

impl Normalizer {
    fn fresh(&mut self, head: &str, tag: &str) -> String {
        self.counter += 1;
        let name = format!("{}#{}{}", head, tag, self.counter);
        self.synthetic.insert(name.clone());
        name
    }

    fn normalize(&mut self, head: &str, sentence: &Sentence) -> Vec<NormalSymbol> {
        let mut out = Vec::new();
        for symbol in sentence {
            match symbol {
                GrammarSymbol::Terminal(terminal) => {
                    out.push(NormalSymbol::Terminal(terminal.clone()));
                }
                GrammarSymbol::NonTerminal(name) => {
                    out.push(NormalSymbol::NonTerminal(name.clone()));
                }
                GrammarSymbol::Epsilon => {}
                GrammarSymbol::Macro(MacroSymbol::Grouping(inner)) => {
                    out.extend(self.normalize(head, inner));
                }
                GrammarSymbol::Macro(MacroSymbol::Option(inner)) => {
                    let name = self.fresh(head, "opt");
                    let body = self.normalize(&name, inner);
                    self.productions.push(Production {
                        head: name.clone(),
                        body,
                    });
                    self.productions.push(Production {
                        head: name.clone(),
                        body: Vec::new(),
                    });
                    out.push(NormalSymbol::NonTerminal(name));
                }
                GrammarSymbol::Macro(MacroSymbol::Repetition(inner)) => {
                    let name = self.fresh(head, "rep");
                    let mut body = self.normalize(&name, inner);
                    body.push(NormalSymbol::NonTerminal(name.clone()));
                    self.productions.push(Production {
                        head: name.clone(),
                        body,
                    });
                    self.productions.push(Production {
                        head: name.clone(),
                        body: Vec::new(),
                    });
                    out.push(NormalSymbol::NonTerminal(name));
                }
                GrammarSymbol::Macro(MacroSymbol::Alternative(alternatives)) => {
                    let name = self.fresh(head, "alt");
                    for alternative in alternatives {
                        let body = self.normalize(&name, alternative);
                        self.productions.push(Production {
                            head: name.clone(),
                            body,
                        });
                    }
                    out.push(NormalSymbol::NonTerminal(name));
                }
            }
        }
        out
    }
}

/// A precomputed LL(1) parsing table. Immutable once built; a single table
/// may drive any number of concurrent parses.
#[derive(Debug)]
pub struct ParseTable {
    start: String,
    productions: Vec<Production>,
    entries: HashMap<(String, TerminalKey), usize>,
    synthetic: HashSet<String>,
    nullable: HashSet<String>,
    first: HashMap<String, HashSet<TerminalKey>>,
    follow: HashMap<String, HashSet<TerminalKey>>,
}

impl ParseTable {
    pub fn build(grammar: &Grammar) -> Result<ParseTable, GrammarError> {
        let mut normalizer = Normalizer {
            productions: Vec::new(),
            synthetic: HashSet::new(),
            counter: 0,
        };
        for rule in grammar.rules() {
            let body = normalizer.normalize(&rule.head, &rule.body);
            normalizer.productions.push(Production {
                head: rule.head.clone(),
                body,
            });
        }
        let productions = normalizer.productions;
        let synthetic = normalizer.synthetic;

        let nullable = compute_nullable(&productions);
        detect_left_recursion(&productions, &nullable)?;
        let first = compute_first(&productions, &nullable);
        let follow = compute_follow(grammar.start(), &productions, &nullable, &first);

        let mut entries: HashMap<(String, TerminalKey), usize> = HashMap::new();
        for (id, production) in productions.iter().enumerate() {
            let (mut predict, body_nullable) =
                first_of_body(&production.body, &nullable, &first);
            if body_nullable && let Some(follow_set) = follow.get(&production.head) {
                predict.extend(follow_set.iter().cloned());
            }
            for key in predict {
                let slot = (production.head.clone(), key.clone());
                if let Some(&existing) = entries.get(&slot)
                    && existing != id
                {
                    return Err(GrammarError::Conflict {
                        non_terminal: production.head.clone(),
                        lookahead: display_key(&key),
                    });
                }
                entries.insert(slot, id);
            }
        }

        Ok(ParseTable {
            start: grammar.start().to_string(),
            productions,
            entries,
            synthetic,
            nullable,
            first,
            follow,
        })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub(crate) fn production(&self, id: usize) -> &Production {
        &self.productions[id]
    }

    pub(crate) fn is_synthetic(&self, name: &str) -> bool {
        self.synthetic.contains(name)
    }

    /// (non-terminal, lookahead) lookup: the value-specific entry wins,
    /// falling back to the kind-only entry.
    pub(crate) fn lookup(&self, non_terminal: &str, token: &Token) -> Option<usize> {
        let exact = (
            non_terminal.to_string(),
            (token.kind, Some(token.value.clone())),
        );
        if let Some(&id) = self.entries.get(&exact) {
            return Some(id);
        }
        let fallback = (non_terminal.to_string(), (token.kind, None));
        self.entries.get(&fallback).copied()
    }

    /// Human-readable list of the terminals that could legally start the
    /// given non-terminal, for expected-vs-actual diagnostics.
    pub(crate) fn expected_for(&self, non_terminal: &str) -> String {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter(|(head, _)| head == non_terminal)
            .map(|(_, key)| display_key(key))
            .collect();
        names.sort();
        names.dedup();
        names.join(" or ")
    }

    pub fn is_nullable(&self, non_terminal: &str) -> bool {
        self.nullable.contains(non_terminal)
    }

    pub fn first_set(&self, non_terminal: &str) -> Option<&HashSet<TerminalKey>> {
        self.first.get(non_terminal)
    }

    pub fn follow_set(&self, non_terminal: &str) -> Option<&HashSet<TerminalKey>> {
        self.follow.get(non_terminal)
    }
}

fn compute_nullable(productions: &[Production]) -> HashSet<String> {
    let mut nullable = HashSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for production in productions {
            if nullable.contains(&production.head) {
                continue;
            }
            let body_nullable = production.body.iter().all(|symbol| match symbol {
                NormalSymbol::Terminal(_) => false,
                NormalSymbol::NonTerminal(name) => nullable.contains(name),
            });
            if body_nullable {
                nullable.insert(production.head.clone());
                changed = true;
            }
        }
    }
    nullable
}

/// A non-terminal re-deriving itself leftmost (through nullable prefixes
/// only) would loop the table-driven parser, so it must fail construction.
fn detect_left_recursion(
    productions: &[Production],
    nullable: &HashSet<String>,
) -> Result<(), GrammarError> {
    let mut edges: HashMap<&str, HashSet<&str>> = HashMap::new();
    for production in productions {
        for symbol in &production.body {
            match symbol {
                NormalSymbol::Terminal(_) => break,
                NormalSymbol::NonTerminal(name) => {
                    edges
                        .entry(production.head.as_str())
                        .or_default()
                        .insert(name.as_str());
                    if !nullable.contains(name) {
                        break;
                    }
                }
            }
        }
    }

    // DFS with an explicit path so the cycle can be named in the error.
    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, HashSet<&'a str>>,
        done: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<String> {
        if let Some(at) = path.iter().position(|seen| *seen == node) {
            let mut cycle: Vec<&str> = path[at..].to_vec();
            cycle.push(node);
            return Some(cycle.join(" -> "));
        }
        if done.contains(node) {
            return None;
        }
        path.push(node);
        if let Some(next) = edges.get(node) {
            for target in next {
                if let Some(cycle) = visit(target, edges, done, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        done.insert(node);
        None
    }

    let mut done = HashSet::new();
    let heads: Vec<&str> = productions.iter().map(|p| p.head.as_str()).collect();
    for head in heads {
        let mut path = Vec::new();
        if let Some(cycle) = visit(head, &edges, &mut done, &mut path) {
            return Err(GrammarError::LeftRecursion { cycle });
        }
    }
    Ok(())
}

fn compute_first(
    productions: &[Production],
    nullable: &HashSet<String>,
) -> HashMap<String, HashSet<TerminalKey>> {
    let mut first: HashMap<String, HashSet<TerminalKey>> = HashMap::new();
    for production in productions {
        first.entry(production.head.clone()).or_default();
    }
    let mut changed = true;
    while changed {
        changed = false;
        for production in productions {
            let mut additions: Vec<TerminalKey> = Vec::new();
            for symbol in &production.body {
                match symbol {
                    NormalSymbol::Terminal(terminal) => {
                        additions.push(key_of(terminal));
                        break;
                    }
                    NormalSymbol::NonTerminal(name) => {
                        if let Some(set) = first.get(name) {
                            additions.extend(set.iter().cloned());
                        }
                        if !nullable.contains(name) {
                            break;
                        }
                    }
                }
            }
            let set = first.entry(production.head.clone()).or_default();
            for key in additions {
                if set.insert(key) {
                    changed = true;
                }
            }
        }
    }
    first
}

fn first_of_body(
    body: &[NormalSymbol],
    nullable: &HashSet<String>,
    first: &HashMap<String, HashSet<TerminalKey>>,
) -> (HashSet<TerminalKey>, bool) {
    let mut set = HashSet::new();
    for symbol in body {
        match symbol {
            NormalSymbol::Terminal(terminal) => {
                set.insert(key_of(terminal));
                return (set, false);
            }
            NormalSymbol::NonTerminal(name) => {
                if let Some(inner) = first.get(name) {
                    set.extend(inner.iter().cloned());
                }
                if !nullable.contains(name) {
                    return (set, false);
                }
            }
        }
    }
    (set, true)
}

fn compute_follow(
    start: &str,
    productions: &[Production],
    nullable: &HashSet<String>,
    first: &HashMap<String, HashSet<TerminalKey>>,
) -> HashMap<String, HashSet<TerminalKey>> {
    let mut follow: HashMap<String, HashSet<TerminalKey>> = HashMap::new();
    for production in productions {
        follow.entry(production.head.clone()).or_default();
    }
    follow
        .entry(start.to_string())
        .or_default()
        .insert((TokenKind::EndOfInput, None));

    let mut changed = true;
    while changed {
        changed = false;
        for production in productions {
            for (index, symbol) in production.body.iter().enumerate() {
                let NormalSymbol::NonTerminal(name) = symbol else {
                    continue;
                };
                let (trailer, trailer_nullable) =
                    first_of_body(&production.body[index + 1..], nullable, first);
                let mut additions: Vec<TerminalKey> = trailer.into_iter().collect();
                if trailer_nullable && let Some(head_follow) = follow.get(&production.head) {
                    additions.extend(head_follow.iter().cloned());
                }
                let set = follow.entry(name.clone()).or_default();
                for key in additions {
                    if set.insert(key) {
                        changed = true;
                    }
                }
            }
        }
    }
    follow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{nt, term, term_value, webql_grammar, ProductionRule};

    #[test]
    fn builtin_table_builds_without_conflicts() {
        let table = ParseTable::build(webql_grammar()).unwrap();
        assert_eq!(table.start(), "query");
    }

    #[test]
    fn first_of_object_is_open_brace() {
        let table = ParseTable::build(webql_grammar()).unwrap();
        let first = table.first_set("object").unwrap();
        assert_eq!(first.len(), 1);
        assert!(first.contains(&(TokenKind::Punctuation, Some("{".to_string()))));
    }

    #[test]
    fn overlapping_first_sets_conflict() {
        // A -> a A B | a B c : both start with 'a'
        let grammar = crate::grammar::Grammar::new(
            "A",
            vec![
                ProductionRule::new(
                    "A",
                    vec![
                        term_value(TokenKind::Identifier, "a"),
                        nt("A"),
                        nt("B"),
                    ],
                ),
                ProductionRule::new(
                    "A",
                    vec![
                        term_value(TokenKind::Identifier, "a"),
                        nt("B"),
                        term_value(TokenKind::Identifier, "c"),
                    ],
                ),
                ProductionRule::new("B", vec![term_value(TokenKind::Identifier, "b")]),
            ],
        )
        .unwrap();
        let err = ParseTable::build(&grammar).unwrap_err();
        assert!(matches!(err, GrammarError::Conflict { ref non_terminal, .. } if non_terminal == "A"));
    }

    #[test]
    fn left_recursion_is_detected() {
        let grammar = crate::grammar::Grammar::new(
            "expr",
            vec![
                ProductionRule::new(
                    "expr",
                    vec![nt("expr"), term_value(TokenKind::Punctuation, ","), nt("item")],
                ),
                ProductionRule::new("expr", vec![nt("item")]),
                ProductionRule::new("item", vec![term(TokenKind::Integer)]),
            ],
        )
        .unwrap();
        let err = ParseTable::build(&grammar).unwrap_err();
        assert!(matches!(err, GrammarError::LeftRecursion { .. }));
    }

    #[test]
    fn value_specific_terminal_distinguishes_identifiers() {
        let grammar = crate::grammar::Grammar::new(
            "s",
            vec![
                ProductionRule::new("s", vec![term_value(TokenKind::Identifier, "$equals")]),
                ProductionRule::new("s", vec![term_value(TokenKind::Identifier, "$add")]),
            ],
        )
        .unwrap();
        let table = ParseTable::build(&grammar).unwrap();
        let eq = Token::new(TokenKind::Identifier, "$equals", crate::token::Position::start());
        let add = Token::new(TokenKind::Identifier, "$add", crate::token::Position::start());
        assert_ne!(table.lookup("s", &eq), table.lookup("s", &add));
        assert!(table.lookup("s", &eq).is_some());
    }
}
