/*!
# Lexer for the declarative configuration language

Token set of the reference front end: identifiers, string/int/long/boolean literals and the
punctuation of assignments, calls and blocks. Comments and whitespace are skipped; anything else
becomes an `Error` token so that parsing never fails.
*/

use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum TokenKind {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,
    #[regex(r"-?[0-9]+L")]
    LongLiteral,
    #[regex(r"-?[0-9]+")]
    IntLiteral,

    // Идентификаторы (ниже приоритетом, чем true/false)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 1)]
    Identifier,

    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,
    #[token(";")]
    Semicolon,

    /// Unrecognised input
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::StringLiteral => "string literal",
            TokenKind::LongLiteral => "long literal",
            TokenKind::IntLiteral => "int literal",
            TokenKind::Identifier => "identifier",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Assign => "'='",
            TokenKind::Semicolon => "';'",
            TokenKind::Error => "unrecognised input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Tokenize the whole input; lexical errors become `TokenKind::Error` tokens.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let kind = result.unwrap_or(TokenKind::Error);
        tokens.push(Token { kind, span: lexer.span() });
    }
    tokens
}

/// Decode the body of a string literal token (quotes included in `raw`).
pub fn unescape_string(raw: &str) -> String {
    let body = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(raw);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
