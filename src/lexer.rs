use crate::error::LexicalError;
use crate::token::{Position, Token, TokenKind};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char() {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn here(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_' || ch == '$'
    }

    fn is_identifier_part(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '$'
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_identifier_part(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a quoted string, returning the raw lexeme with quotes intact.
    /// Escape sequences are validated here and resolved later by
    /// [`Token::normalized`].
    fn read_string(&mut self, quote: char) -> Result<String, LexicalError> {
        let start = self.here();
        let mut raw = String::new();
        raw.push(quote);
        self.advance();

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    raw.push(c);
                    self.advance();
                    return Ok(raw);
                }
                '\\' => {
                    let escape_at = self.here();
                    raw.push('\\');
                    self.advance();
                    match self.current_char() {
                        Some(c @ ('n' | 't' | 'r' | '0' | '"' | '\'' | '\\' | '/')) => {
                            raw.push(c);
                            self.advance();
                        }
                        Some('u') => {
                            raw.push('u');
                            self.advance();
                            for _ in 0..4 {
                                match self.current_char() {
                                    Some(d) if d.is_ascii_hexdigit() => {
                                        raw.push(d);
                                        self.advance();
                                    }
                                    Some(d) => {
                                        return Err(LexicalError::InvalidEscape {
                                            ch: d,
                                            position: escape_at,
                                        });
                                    }
                                    None => {
                                        return Err(LexicalError::UnterminatedString {
                                            position: start,
                                        });
                                    }
                                }
                            }
                        }
                        Some(c) => {
                            return Err(LexicalError::InvalidEscape {
                                ch: c,
                                position: escape_at,
                            });
                        }
                        None => {
                            return Err(LexicalError::UnterminatedString { position: start });
                        }
                    }
                }
                _ => {
                    raw.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexicalError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> Result<(TokenKind, String), LexicalError> {
        let start = self.here();

        // 0x / 0X prefix switches to hexadecimal
        if self.current_char() == Some('0') && matches!(self.peek_char(1), Some('x' | 'X')) {
            let mut lexeme = String::from("0");
            self.advance();
            lexeme.push(self.current_char().unwrap_or('x'));
            self.advance();
            let mut digits = 0;
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_hexdigit() {
                    lexeme.push(ch);
                    digits += 1;
                    self.advance();
                } else {
                    break;
                }
            }
            if digits == 0 {
                return Err(LexicalError::MalformedNumber {
                    lexeme,
                    position: start,
                });
            }
            return Ok((TokenKind::Hexadecimal, lexeme));
        }

        let mut lexeme = String::new();
        let mut is_float = false;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                lexeme.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                lexeme.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Ok((kind, lexeme))
    }

    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        self.skip_whitespace();
        let position = self.here();

        match self.current_char() {
            None => Ok(Token::end_of_input(position)),
            Some(ch @ ('{' | '}' | '[' | ']' | ':' | ',')) => {
                self.advance();
                Ok(Token::new(TokenKind::Punctuation, ch, position))
            }
            Some(quote @ ('"' | '\'')) => {
                let raw = self.read_string(quote)?;
                Ok(Token::new(TokenKind::String, raw, position))
            }
            Some(ch) if ch.is_ascii_digit() => {
                let (kind, lexeme) = self.read_number()?;
                Ok(Token::new(kind, lexeme, position))
            }
            Some(ch) if Self::is_identifier_start(ch) => {
                let ident = self.read_identifier();
                Ok(Token::new(TokenKind::Identifier, ident, position))
            }
            Some(ch) => Err(LexicalError::UnexpectedCharacter { ch, position }),
        }
    }
}

/// Tokenizes a whole source string. Each call produces a fresh, finite
/// sequence terminated by an [`TokenKind::EndOfInput`] token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::EndOfInput;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[test]
fn test_operator_keywords_lex_as_identifiers() {
    let mut lexer = Lexer::new("$filter $greaterEquals $");
    let token = lexer.next_token().unwrap();
    assert_eq!(token.kind, TokenKind::Identifier);
    assert_eq!(token.value, "$filter");
    assert_eq!(lexer.next_token().unwrap().value, "$greaterEquals");
    assert_eq!(lexer.next_token().unwrap().value, "$");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfInput);
}

#[test]
fn test_punctuation_and_literals() {
    let mut lexer = Lexer::new("{ age: 0x1F, pi: 3.14 }");
    let kinds: Vec<TokenKind> = std::iter::from_fn(|| {
        let t = lexer.next_token().unwrap();
        (t.kind != TokenKind::EndOfInput).then_some(t.kind)
    })
    .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Punctuation,
            TokenKind::Identifier,
            TokenKind::Punctuation,
            TokenKind::Hexadecimal,
            TokenKind::Punctuation,
            TokenKind::Identifier,
            TokenKind::Punctuation,
            TokenKind::Float,
            TokenKind::Punctuation,
        ]
    );
}

#[test]
fn test_unexpected_character_is_an_error() {
    let mut lexer = Lexer::new("{ age: # }");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert!(matches!(
        err,
        LexicalError::UnexpectedCharacter { ch: '#', .. }
    ));
}

#[test]
fn test_positions_track_lines() {
    let mut lexer = Lexer::new("{\n  age: 1\n}");
    lexer.next_token().unwrap();
    let age = lexer.next_token().unwrap();
    assert_eq!(age.position.line, 2);
    assert_eq!(age.position.column, 3);
}
