// tests/lexer_tests.rs

use webql::error::LexicalError;
use webql::lexer::{tokenize, Lexer};
use webql::token::TokenKind;

// ============================================================================
// Token recognition
// ============================================================================

#[test]
fn test_full_query_token_stream() {
    let tokens = tokenize("{ $filter: { age: { $greaterEquals: 18 } } }").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Punctuation, // {
            TokenKind::Identifier,  // $filter
            TokenKind::Punctuation, // :
            TokenKind::Punctuation, // {
            TokenKind::Identifier,  // age
            TokenKind::Punctuation, // :
            TokenKind::Punctuation, // {
            TokenKind::Identifier,  // $greaterEquals
            TokenKind::Punctuation, // :
            TokenKind::Integer,     // 18
            TokenKind::Punctuation, // }
            TokenKind::Punctuation, // }
            TokenKind::Punctuation, // }
            TokenKind::EndOfInput,
        ]
    );
}

#[test]
fn test_dollar_identifiers() {
    let tokens = tokenize("$ $filter $greaterEquals plain _under").unwrap();
    let values: Vec<&str> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.value.as_str())
        .collect();
    assert_eq!(values, vec!["$", "$filter", "$greaterEquals", "plain", "_under"]);
}

#[test]
fn test_keyword_literals_lex_as_identifiers() {
    // true/false/null are disambiguated later by the AST builder
    let tokens = tokenize("true false null").unwrap();
    assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Identifier));
}

#[test]
fn test_numbers() {
    let tokens = tokenize("42 3.14 0x1F 0XaB").unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Integer);
    assert_eq!(tokens[0].value, "42");
    assert_eq!(tokens[1].kind, TokenKind::Float);
    assert_eq!(tokens[1].value, "3.14");
    assert_eq!(tokens[2].kind, TokenKind::Hexadecimal);
    assert_eq!(tokens[2].value, "0x1F");
    assert_eq!(tokens[3].kind, TokenKind::Hexadecimal);
}

#[test]
fn test_integer_then_member_dot_is_not_a_float() {
    // '.' only joins a float when followed by a digit
    let tokens = tokenize("1.x").unwrap_err();
    assert!(matches!(
        tokens,
        LexicalError::UnexpectedCharacter { ch: '.', .. }
    ));
}

#[test]
fn test_strings_keep_raw_lexeme_and_normalize() {
    let tokens = tokenize(r#" "a\nb" 'single' "#).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].value, r#""a\nb""#);
    assert_eq!(tokens[0].normalized(), "a\nb");
    assert_eq!(tokens[1].normalized(), "single");
}

#[test]
fn test_unicode_escape() {
    let tokens = tokenize(r#" "caf\u00e9" "#).unwrap();
    assert_eq!(tokens[0].normalized(), "caf\u{e9}");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unexpected_character() {
    let err = tokenize("{ age: @ }").unwrap_err();
    assert!(matches!(
        err,
        LexicalError::UnexpectedCharacter { ch: '@', .. }
    ));
}

#[test]
fn test_unterminated_string() {
    let err = tokenize(r#" "open "#).unwrap_err();
    assert!(matches!(err, LexicalError::UnterminatedString { .. }));
}

#[test]
fn test_invalid_escape() {
    let err = tokenize(r#" "bad\q" "#).unwrap_err();
    assert!(matches!(err, LexicalError::InvalidEscape { ch: 'q', .. }));
}

#[test]
fn test_hex_without_digits() {
    let err = tokenize("0x").unwrap_err();
    assert!(matches!(err, LexicalError::MalformedNumber { .. }));
}

// ============================================================================
// Contract
// ============================================================================

#[test]
fn test_restartable_fresh_sequences() {
    let source = "{ age: 1 }";
    let first = tokenize(source).unwrap();
    let second = tokenize(source).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_explicit_end_of_input() {
    let tokens = tokenize("").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::EndOfInput);
}

#[test]
fn test_positions_point_at_lexemes() {
    let mut lexer = Lexer::new("age: 18");
    let age = lexer.next_token().unwrap();
    assert_eq!((age.position.line, age.position.column), (1, 1));
    lexer.next_token().unwrap();
    let n = lexer.next_token().unwrap();
    assert_eq!((n.position.line, n.position.column), (1, 6));
}
