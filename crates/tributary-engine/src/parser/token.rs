//! Token definitions for C++ headers.
//!
//! Keywords are not separate tokens: the declaration parser only cares
//! about a handful of them and compares identifier text instead, which keeps
//! contextual words (`final`, `override`, API macros) uniform.

use std::fmt;

/// A token of a C++ header
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword
    Ident(String),
    /// Numeric literal, kept verbatim
    Number(String),
    /// String literal including quotes
    StringLiteral(String),
    /// Character literal including quotes
    CharLiteral(String),

    // Punctuation
    ColonColon,
    Colon,
    Semicolon,
    Comma,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Less,
    Greater,
    Star,
    Amp,
    AmpAmp,
    Equal,
    Tilde,
    Arrow,
    Ellipsis,
    Dot,
    /// Any other single punctuation character
    Punct(char),

    Eof,
}

impl Token {
    /// Identifier text, if this is an identifier
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is the identifier `word`
    pub fn is_word(&self, word: &str) -> bool {
        self.ident() == Some(word)
    }

    /// Whether a space is needed between this token and `next` when
    /// rebuilding a type spelling
    pub fn needs_space_before(&self, next: &Token) -> bool {
        let wordish = |t: &Token| matches!(t, Token::Ident(_) | Token::Number(_));
        wordish(self) && wordish(next)
    }
}

impl Token {
    /// Fixed spelling of a punctuation token
    fn spelling(&self) -> Option<&'static str> {
        let text = match self {
            Token::ColonColon => "::",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Star => "*",
            Token::Amp => "&",
            Token::AmpAmp => "&&",
            Token::Equal => "=",
            Token::Tilde => "~",
            Token::Arrow => "->",
            Token::Ellipsis => "...",
            Token::Dot => ".",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.spelling() {
            return f.write_str(text);
        }
        match self {
            Token::Ident(text)
            | Token::Number(text)
            | Token::StringLiteral(text)
            | Token::CharLiteral(text) => f.write_str(text),
            Token::Punct(c) => write!(f, "{}", c),
            _ => f.write_str("end of file"),
        }
    }
}

/// Where a token sits in its file: byte offsets plus the 1-based
/// line/column of the first byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Span { start, end, line, column }
    }
}
