//! Lexer for C++ headers.
//!
//! Built on logos. Comments are skipped, preprocessor lines are collected
//! separately (only `#include` targets matter downstream), and everything
//! else becomes a [`Token`] with its [`Span`].

use logos::Logos;
use regex::Regex;
use std::sync::LazyLock;

use crate::parser::token::{Span, Token};

/// Logos-based token enum, converted to [`Token`] after lexing.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f\v]+")]
enum RawToken {
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*", lex_block_comment)]
    BlockComment(Closed),

    #[regex(r"#([^\\\n]|\\\r?\n|\\[^\n])*")]
    Directive,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_.']*")]
    Number,

    #[regex(r#"(u8|u|U|L)?""#, lex_string)]
    String(Closed),

    #[regex(r"'([^'\\\n]|\\.)+'")]
    Char,

    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("*")]
    Star,
    #[token("&")]
    Amp,
    #[token("&&")]
    AmpAmp,
    #[token("=")]
    Equal,
    #[token("~")]
    Tilde,
    #[token("->")]
    Arrow,
    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,

    #[regex(r"[+\-/%^|!?@$'\\]")]
    Punct,
}

/// Whether a comment or literal found its terminator
#[derive(Debug, Clone, Copy, PartialEq)]
struct Closed(bool);

fn lex_block_comment(lex: &mut logos::Lexer<RawToken>) -> Closed {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            Closed(true)
        }
        None => {
            lex.bump(remainder.len());
            Closed(false)
        }
    }
}

/// Scan to the closing quote. An unescaped newline ends the literal unclosed.
fn lex_string(lex: &mut logos::Lexer<RawToken>) -> Closed {
    let mut chars = lex.remainder().char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                lex.bump(i + 1);
                return Closed(true);
            }
            '\\' => {
                chars.next();
            }
            '\n' => {
                lex.bump(i);
                return Closed(false);
            }
            _ => {}
        }
    }
    let rest = lex.remainder().len();
    lex.bump(rest);
    Closed(false)
}

/// Problems found while tokenizing a header. Rendered without a location;
/// the span is reported through the diagnostic that carries the error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character '{}'", .found.escape_default())]
    UnexpectedCharacter { found: char, span: Span },

    #[error("Unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("Unterminated block comment")]
    UnterminatedComment { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match *self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span } => span,
        }
    }

    /// Whether the error makes the file's declarations unreliable
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LexError::UnexpectedCharacter { .. })
    }
}

/// An `#include` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Path as written between the delimiters
    pub target: String,
    /// `<...>` rather than `"..."`
    pub angled: bool,
    pub span: Span,
}

/// Result of lexing one file
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<(Token, Span)>,
    pub includes: Vec<IncludeDirective>,
    pub errors: Vec<LexError>,
}

static INCLUDE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"^#\s*include\s*([<"])([^>"]+)[>"]"#));

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Span for a byte range, with line and column of its start
    pub fn span(&self, start: usize, end: usize) -> Span {
        let line_index = match self.line_starts.binary_search(&start) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        let column = self.source[line_start..start].chars().count() + 1;
        Span::new(start, end, line_index as u32 + 1, column as u32)
    }

    /// Tokenize the whole source. Always ends with [`Token::Eof`].
    pub fn tokenize(self) -> LexOutput {
        let mut output = LexOutput::default();
        let mut raw = RawToken::lexer(self.source);

        while let Some(result) = raw.next() {
            let range = raw.span();
            let span = self.span(range.start, range.end);
            let text = raw.slice();

            let token = match result {
                Ok(raw_token) => match self.convert(raw_token, text, span, &mut output) {
                    Some(token) => token,
                    None => continue,
                },
                Err(()) => {
                    let found = text.chars().next().unwrap_or('\u{fffd}');
                    output.errors.push(LexError::UnexpectedCharacter { found, span });
                    continue;
                }
            };
            output.tokens.push((token, span));
        }

        let end = self.source.len();
        output.tokens.push((Token::Eof, self.span(end, end)));
        output
    }

    fn convert(
        &self,
        raw: RawToken,
        text: &str,
        span: Span,
        output: &mut LexOutput,
    ) -> Option<Token> {
        let token = match raw {
            RawToken::LineComment | RawToken::BlockComment(Closed(true)) => return None,
            RawToken::BlockComment(Closed(false)) => {
                output.errors.push(LexError::UnterminatedComment { span });
                return None;
            }
            RawToken::String(Closed(false)) => {
                output.errors.push(LexError::UnterminatedString { span });
                return None;
            }
            RawToken::Directive => {
                if let Some(include) = parse_include(text, span) {
                    output.includes.push(include);
                }
                return None;
            }
            RawToken::Ident => Token::Ident(text.to_string()),
            RawToken::Number => Token::Number(text.to_string()),
            RawToken::String(Closed(true)) => Token::StringLiteral(text.to_string()),
            RawToken::Char => Token::CharLiteral(text.to_string()),
            RawToken::ColonColon => Token::ColonColon,
            RawToken::Colon => Token::Colon,
            RawToken::Semicolon => Token::Semicolon,
            RawToken::Comma => Token::Comma,
            RawToken::LeftBrace => Token::LeftBrace,
            RawToken::RightBrace => Token::RightBrace,
            RawToken::LeftParen => Token::LeftParen,
            RawToken::RightParen => Token::RightParen,
            RawToken::LeftBracket => Token::LeftBracket,
            RawToken::RightBracket => Token::RightBracket,
            RawToken::Less => Token::Less,
            RawToken::Greater => Token::Greater,
            RawToken::Star => Token::Star,
            RawToken::Amp => Token::Amp,
            RawToken::AmpAmp => Token::AmpAmp,
            RawToken::Equal => Token::Equal,
            RawToken::Tilde => Token::Tilde,
            RawToken::Arrow => Token::Arrow,
            RawToken::Ellipsis => Token::Ellipsis,
            RawToken::Dot => Token::Dot,
            RawToken::Punct => Token::Punct(text.chars().next().unwrap_or('?')),
        };
        Some(token)
    }
}

fn parse_include(directive: &str, span: Span) -> Option<IncludeDirective> {
    let re = INCLUDE_RE.as_ref().ok()?;
    let captures = re.captures(directive)?;
    Some(IncludeDirective {
        target: captures.get(2)?.as_str().trim().to_string(),
        angled: captures.get(1)?.as_str() == "<",
        span,
    })
}
