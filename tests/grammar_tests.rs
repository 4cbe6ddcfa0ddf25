// tests/grammar_tests.rs
//
// Grammar soundness: FIRST/FOLLOW computation, conflict detection, and
// left-recursion rejection happen when a parse table is built, never while
// parsing a user query.

use webql::error::GrammarError;
use webql::grammar::{
    self, alt, nt, opt, punct, rep, term, term_value, webql_grammar, Grammar, ProductionRule,
};
use webql::parser::ParseTable;
use webql::token::TokenKind;

// ============================================================================
// The builtin grammar
// ============================================================================

#[test]
fn test_builtin_grammar_has_no_conflicts() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    assert_eq!(table.start(), "query");
}

#[test]
fn test_first_sets_are_nonempty_for_reachable_non_terminals() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    for rule in ["query", "object", "members", "member", "key", "value", "array", "elements"] {
        let first = table.first_set(rule).unwrap();
        assert!(!first.is_empty(), "FIRST({}) is empty", rule);
    }
}

#[test]
fn test_follow_sets_are_nonempty_for_reachable_non_terminals() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    for rule in ["query", "object", "members", "member", "key", "value"] {
        let follow = table.follow_set(rule).unwrap();
        assert!(!follow.is_empty(), "FOLLOW({}) is empty", rule);
    }
}

#[test]
fn test_start_symbol_is_followed_by_end_of_input() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    assert!(table
        .follow_set("query")
        .unwrap()
        .contains(&(TokenKind::EndOfInput, None)));
}

#[test]
fn test_object_first_is_exactly_open_brace() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    let first = table.first_set("object").unwrap();
    assert_eq!(first.len(), 1);
    assert!(first.contains(&(TokenKind::Punctuation, Some("{".to_string()))));
}

#[test]
fn test_nullability() {
    let table = ParseTable::build(webql_grammar()).unwrap();
    assert!(!table.is_nullable("object"));
    assert!(!table.is_nullable("members"));
}

// ============================================================================
// Defective grammars
// ============================================================================

fn ident(value: &str) -> grammar::GrammarSymbol {
    term_value(TokenKind::Identifier, value)
}

#[test]
fn test_overlapping_first_sets_raise_a_conflict() {
    // A -> a A B | a B c
    let grammar = Grammar::new(
        "A",
        vec![
            ProductionRule::new("A", vec![ident("a"), nt("A"), nt("B")]),
            ProductionRule::new("A", vec![ident("a"), nt("B"), ident("c")]),
            ProductionRule::new("B", vec![ident("b")]),
        ],
    )
    .unwrap();
    match ParseTable::build(&grammar) {
        Err(GrammarError::Conflict { non_terminal, lookahead }) => {
            assert_eq!(non_terminal, "A");
            assert_eq!(lookahead, "'a'");
        }
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[test]
fn test_epsilon_follow_overlap_raises_a_conflict() {
    // A -> a | epsilon, used as S -> A a: FIRST(A) and FOLLOW(A) share 'a'
    let grammar = Grammar::new(
        "S",
        vec![
            ProductionRule::new("S", vec![nt("A"), ident("a")]),
            ProductionRule::new("A", vec![ident("a")]),
            ProductionRule::new("A", vec![grammar::GrammarSymbol::Epsilon]),
        ],
    )
    .unwrap();
    assert!(matches!(
        ParseTable::build(&grammar),
        Err(GrammarError::Conflict { .. })
    ));
}

#[test]
fn test_direct_left_recursion_is_rejected() {
    let grammar = Grammar::new(
        "expr",
        vec![
            ProductionRule::new("expr", vec![nt("expr"), punct(','), nt("item")]),
            ProductionRule::new("expr", vec![nt("item")]),
            ProductionRule::new("item", vec![term(TokenKind::Integer)]),
        ],
    )
    .unwrap();
    assert!(matches!(
        ParseTable::build(&grammar),
        Err(GrammarError::LeftRecursion { .. })
    ));
}

#[test]
fn test_indirect_left_recursion_is_rejected() {
    // a -> b x, b -> c, c -> a
    let grammar = Grammar::new(
        "a",
        vec![
            ProductionRule::new("a", vec![nt("b"), ident("x")]),
            ProductionRule::new("b", vec![nt("c")]),
            ProductionRule::new("c", vec![nt("a")]),
        ],
    )
    .unwrap();
    let err = ParseTable::build(&grammar).unwrap_err();
    match err {
        GrammarError::LeftRecursion { cycle } => assert!(cycle.contains("a")),
        other => panic!("expected left recursion, got {:?}", other),
    }
}

#[test]
fn test_left_recursion_through_nullable_prefix_is_rejected() {
    // opt is nullable, so a -> opt a x is leftmost-recursive
    let grammar = Grammar::new(
        "a",
        vec![
            ProductionRule::new("a", vec![opt(vec![ident("o")]), nt("a"), ident("x")]),
            ProductionRule::new("a", vec![ident("y")]),
        ],
    )
    .unwrap();
    assert!(matches!(
        ParseTable::build(&grammar),
        Err(GrammarError::LeftRecursion { .. })
    ));
}

#[test]
fn test_unreachable_non_terminal_reference_fails_construction() {
    let result = Grammar::new(
        "a",
        vec![ProductionRule::new("a", vec![nt("phantom")])],
    );
    assert!(matches!(
        result,
        Err(GrammarError::UnknownNonTerminal { referenced, .. }) if referenced == "phantom"
    ));
}

// ============================================================================
// Macros and value-specific terminals
// ============================================================================

#[test]
fn test_macros_expand_without_conflicts() {
    // s -> '(' opt(x rep(',' x)) ')', x -> int | ident
    let grammar = Grammar::new(
        "s",
        vec![
            ProductionRule::new(
                "s",
                vec![
                    punct('('),
                    opt(vec![nt("x"), rep(vec![punct(','), nt("x")])]),
                    punct(')'),
                ],
            ),
            ProductionRule::new(
                "x",
                vec![alt(vec![
                    vec![term(TokenKind::Integer)],
                    vec![term(TokenKind::Identifier)],
                ])],
            ),
        ],
    )
    .unwrap();
    assert!(ParseTable::build(&grammar).is_ok());
}

#[test]
fn test_value_specific_terminals_coexist_with_kind_fallback() {
    // Distinguishing '$equals' from '$add' while any other identifier
    // takes the generic production.
    let grammar = Grammar::new(
        "s",
        vec![
            ProductionRule::new("s", vec![ident("$equals"), term(TokenKind::Integer)]),
            ProductionRule::new("s", vec![ident("$add"), term(TokenKind::Float)]),
            ProductionRule::new("s", vec![term(TokenKind::Identifier), term(TokenKind::String)]),
        ],
    )
    .unwrap();
    assert!(ParseTable::build(&grammar).is_ok());
}
