use std::fmt;

/// Lexical category of a token.
///
/// The parser keys its table lookups on this kind (optionally refined by the
/// token's literal value), so the set is deliberately small: the grammar, not
/// the tokenizer, decides what an identifier or punctuation mark means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Bare word: field names, operator keywords (`$filter`), `true`, `null`
    Identifier,
    /// Quoted string literal (value keeps the quotes; see [`Token::normalized`])
    String,
    /// Decimal integer literal
    Integer,
    /// Floating-point literal
    Float,
    /// Hexadecimal integer literal (`0x1f`)
    Hexadecimal,
    /// Single-character punctuation: `{ } [ ] : ,`
    Punctuation,
    /// Explicit end-of-input marker, so grammar rules can require it
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::Hexadecimal => "hexadecimal",
            TokenKind::Punctuation => "punctuation",
            TokenKind::EndOfInput => "end of input",
        };
        write!(f, "{}", name)
    }
}

/// Location of a character in the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte-independent character offset from the start of the source
    pub offset: usize,
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
}

impl Position {
    pub fn start() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Source range covered by a syntax node, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both operands.
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// A single token produced by the tokenizer.
///
/// Tokens are immutable; `value` holds the raw lexeme exactly as written,
/// quotes and escapes included for strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            value: value.into(),
            position,
        }
    }

    pub fn end_of_input(position: Position) -> Self {
        Token {
            kind: TokenKind::EndOfInput,
            value: String::new(),
            position,
        }
    }

    /// Span covering this token's lexeme.
    pub fn span(&self) -> Span {
        let mut end = self.position;
        end.offset += self.value.chars().count();
        end.column += self.value.chars().count() as u32;
        Span::new(self.position, end)
    }

    /// The string value with surrounding quotes stripped and escape
    /// sequences resolved. For non-string tokens this is the raw lexeme.
    ///
    /// The lexer has already rejected malformed escapes, so the walk here
    /// only has to translate them.
    pub fn normalized(&self) -> String {
        if self.kind != TokenKind::String {
            return self.value.clone();
        }
        let inner: Vec<char> = self.value.chars().collect();
        // strip the surrounding quote pair
        let inner = &inner[1..inner.len() - 1];
        let mut result = String::with_capacity(inner.len());
        let mut chars = inner.iter().copied();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                result.push(ch);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('0') => result.push('\0'),
                Some('u') => {
                    let digits: String = (&mut chars).take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&digits, 16)
                        && let Some(decoded) = char::from_u32(code)
                    {
                        result.push(decoded);
                    }
                }
                Some(other) => result.push(other),
                None => {}
            }
        }
        result
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EndOfInput => write!(f, "end of input"),
            _ => write!(f, "'{}'", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_strips_quotes_and_unescapes() {
        let token = Token::new(TokenKind::String, "\"a\\nb\"", Position::start());
        assert_eq!(token.normalized(), "a\nb");
    }

    #[test]
    fn normalized_resolves_unicode_escapes() {
        let token = Token::new(TokenKind::String, "'\\u00e9'", Position::start());
        assert_eq!(token.normalized(), "é");
    }

    #[test]
    fn span_covers_lexeme() {
        let token = Token::new(TokenKind::Identifier, "$filter", Position::start());
        assert_eq!(token.span().end.column, 8);
    }
}
