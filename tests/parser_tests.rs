// tests/parser_tests.rs

use webql::ast::{AstBuilder, ExprKind, LiteralKind, WebqlOperator};
use webql::error::SyntaxError;
use webql::lexer::tokenize;
use webql::parser::{webql_parse_table, CstNode, CstRoot, Parser};

fn parse(source: &str) -> Result<CstRoot, SyntaxError> {
    let tokens = tokenize(source).unwrap();
    Parser::new(webql_parse_table()).parse(&tokens)
}

fn build(source: &str) -> webql::WebqlQuery {
    AstBuilder::build(&parse(source).unwrap()).unwrap()
}

// ============================================================================
// CST structure
// ============================================================================

#[test]
fn test_root_has_one_child_per_top_level_production() {
    let root = parse("{ $filter: { age: { $greaterEquals: 18 } } }").unwrap();
    assert_eq!(root.node.rule(), Some("query"));
    assert_eq!(root.node.children().len(), 1);
    assert_eq!(root.node.children()[0].rule(), Some("object"));
}

#[test]
fn test_cst_leaves_round_trip_the_token_stream() {
    for source in [
        "{}",
        "{ age: null }",
        "{ $filter: { age: { $greaterEquals: 18 } } }",
        r#"{ $select: { $new: { name: { age: "$" }, tag: 'x' } } }"#,
        "{ $equals: [ { age: null }, 0x12 ] }",
        "{ $and: [ { a: null }, { b: null }, { c: null } ] }",
    ] {
        let tokens = tokenize(source).unwrap();
        let root = Parser::new(webql_parse_table()).parse(&tokens).unwrap();
        let mut leaves: Vec<webql::Token> =
            root.node.tokens().into_iter().cloned().collect();
        leaves.push(root.end.clone());
        assert_eq!(leaves, tokens, "round trip failed for {}", source);
    }
}

#[test]
fn test_internal_nodes_carry_rule_names() {
    let root = parse("{ age: 18 }").unwrap();
    let object = &root.node.children()[0];
    let members = object
        .children()
        .iter()
        .find(|child| child.rule() == Some("members"))
        .expect("members node");
    let member = &members.children()[0];
    assert_eq!(member.rule(), Some("member"));
    let rules: Vec<Option<&str>> = member.children().iter().map(CstNode::rule).collect();
    assert_eq!(rules, vec![Some("key"), None, Some("value")]);
}

// ============================================================================
// Syntax errors: expected vs actual
// ============================================================================

#[test]
fn test_missing_colon() {
    let err = parse("{ age 18 }").unwrap_err();
    match err {
        SyntaxError::UnexpectedToken { expected, found, .. } => {
            assert!(expected.contains(':'), "expected mentions ':': {}", expected);
            assert_eq!(found, "'18'");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_missing_value() {
    let err = parse("{ age: }").unwrap_err();
    assert!(matches!(err, SyntaxError::UnexpectedToken { .. }));
}

#[test]
fn test_truncated_query() {
    let err = parse("{ age: { $equals: 1 }").unwrap_err();
    assert!(matches!(err, SyntaxError::UnexpectedEndOfInput { .. }));
}

#[test]
fn test_trailing_tokens_rejected() {
    let err = parse("{} {}").unwrap_err();
    assert!(matches!(err, SyntaxError::UnexpectedToken { .. }));
}

#[test]
fn test_top_level_must_be_an_object() {
    let err = parse("[ 1, 2 ]").unwrap_err();
    assert!(matches!(err, SyntaxError::UnexpectedToken { .. }));
}

// ============================================================================
// AST building
// ============================================================================

#[test]
fn test_empty_query_builds_an_empty_block() {
    let query = build("{}");
    match &query.node(query.root()).kind {
        ExprKind::Block { expressions } => assert!(expressions.is_empty()),
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn test_member_navigation_desugars_to_member_access() {
    // { age: { $greaterEquals: 18 } } == age >= 18
    let query = build("{ $filter: { age: { $greaterEquals: 18 } } }");
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    let ExprKind::Operation { operator, operands } = &query.node(expressions[0]).kind else {
        panic!("expected the filter operation");
    };
    assert_eq!(*operator, WebqlOperator::Filter);
    assert_eq!(operands.len(), 2);
    assert!(matches!(
        &query.node(operands[0]).kind,
        ExprKind::Reference { identifier } if identifier == "$"
    ));

    let ExprKind::Operation { operator, operands } = &query.node(operands[1]).kind else {
        panic!("expected the predicate operation");
    };
    assert_eq!(*operator, WebqlOperator::GreaterEquals);
    let ExprKind::MemberAccess { target, member } = &query.node(operands[0]).kind else {
        panic!("expected member access");
    };
    assert_eq!(member, "age");
    assert!(matches!(
        &query.node(*target).kind,
        ExprKind::Reference { identifier } if identifier == "$"
    ));
    assert!(matches!(
        &query.node(operands[1]).kind,
        ExprKind::Literal { kind: LiteralKind::Int, raw } if raw == "18"
    ));
}

#[test]
fn test_explicit_operand_array_form() {
    // Spec-style desugared filter
    let query = build("{ $filter: [ $, { $greaterEquals: [ { age: null }, 18 ] } ] }");
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    let ExprKind::Operation { operator, operands } = &query.node(expressions[0]).kind else {
        panic!("expected filter");
    };
    assert_eq!(*operator, WebqlOperator::Filter);
    let ExprKind::Operation { operator, .. } = &query.node(operands[1]).kind else {
        panic!("expected predicate");
    };
    assert_eq!(*operator, WebqlOperator::GreaterEquals);
}

#[test]
fn test_null_member_value_yields_the_member_itself() {
    let query = build("{ $equals: [ { age: null }, 18 ] }");
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    let ExprKind::Operation { operands, .. } = &query.node(expressions[0]).kind else {
        panic!("expected equals");
    };
    assert!(matches!(
        &query.node(operands[0]).kind,
        ExprKind::MemberAccess { member, .. } if member == "age"
    ));
}

#[test]
fn test_literal_classification() {
    let query = build(r#"{ $aggregate: [ null, true, false, 1, 2.5, 0xff, "s" ] }"#);
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    let ExprKind::Operation { operands, .. } = &query.node(expressions[0]).kind else {
        panic!("expected aggregate");
    };
    let kinds: Vec<LiteralKind> = operands
        .iter()
        .map(|id| match &query.node(*id).kind {
            ExprKind::Literal { kind, .. } => *kind,
            other => panic!("expected literal, got {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            LiteralKind::Null,
            LiteralKind::Bool,
            LiteralKind::Bool,
            LiteralKind::Int,
            LiteralKind::Float,
            LiteralKind::Hex,
            LiteralKind::String,
        ]
    );
}

#[test]
fn test_pipeline_stages_chain() {
    // The second stage consumes the first as its implicit source.
    let query = build("{ $filter: { age: { $greaterEquals: 18 } }, $limit: 10 }");
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    assert_eq!(expressions.len(), 1);
    let ExprKind::Operation { operator, operands } = &query.node(expressions[0]).kind else {
        panic!("expected limit");
    };
    assert_eq!(*operator, WebqlOperator::Limit);
    assert!(matches!(
        &query.node(operands[0]).kind,
        ExprKind::Operation { operator: WebqlOperator::Filter, .. }
    ));
}

#[test]
fn test_projection_builds_anonymous_object() {
    let query = build(r#"{ $select: { $new: { name: { age: "$" } } } }"#);
    let ExprKind::Block { expressions } = &query.node(query.root()).kind else {
        panic!("root is a block");
    };
    let ExprKind::Operation { operands, .. } = &query.node(expressions[0]).kind else {
        panic!("expected select");
    };
    let ExprKind::Operation { operator, operands } = &query.node(operands[1]).kind else {
        panic!("expected new");
    };
    assert_eq!(*operator, WebqlOperator::New);
    let ExprKind::AnonymousObject { properties } = &query.node(operands[0]).kind else {
        panic!("expected anonymous object");
    };
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].0, "name");
}

#[test]
fn test_unknown_operator_is_rejected() {
    let tokens = tokenize("{ $frobnicate: 1 }").unwrap();
    let root = Parser::new(webql_parse_table()).parse(&tokens).unwrap();
    let err = AstBuilder::build(&root).unwrap_err();
    assert!(matches!(
        err,
        SyntaxError::UnknownOperator { name, .. } if name == "frobnicate"
    ));
}

#[test]
fn test_array_outside_operand_position_is_rejected() {
    let tokens = tokenize("{ age: [ 1, 2 ] }").unwrap();
    let root = Parser::new(webql_parse_table()).parse(&tokens).unwrap();
    let err = AstBuilder::build(&root).unwrap_err();
    assert!(matches!(err, SyntaxError::MisplacedArray { .. }));
}

#[test]
fn test_spans_point_into_the_source() {
    let query = build("{ $filter: { age: { $greaterEquals: 18 } } }");
    let root_span = query.span(query.root());
    assert_eq!(root_span.start.column, 1);
    assert!(root_span.end.offset > root_span.start.offset);
}
