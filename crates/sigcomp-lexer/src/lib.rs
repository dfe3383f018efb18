//! Token stream for signal and transfer-function expressions.
//!
//! The grammar is deliberately small: identifiers, numeric literals, the
//! arithmetic operators, grouping/indexing brackets, commas and a single
//! `=` for system equations.

use logos::Logos;

#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
    #[regex(r"(\d+\.\d*|\.\d+)([eE][+-]?\d+)?")]
    Float,
    #[regex(r"\d+([eE][+-]?\d+)?")]
    Integer,

    // Operators. `**` is accepted as a spelling of `^`.
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    #[token("**")]
    Caret,
    #[token("=")]
    Assign,

    // Delimiters
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    Error,
}

impl Token {
    /// Human readable description used in parser diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Ident => "identifier",
            Token::Float | Token::Integer => "number",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Caret => "'^'",
            Token::Assign => "'='",
            Token::Comma => "','",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Error => "invalid character",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub lexeme: String,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(input: &str) -> Vec<Token> {
    tokenize_detailed(input)
        .into_iter()
        .map(|t| t.token)
        .collect()
}

pub fn tokenize_detailed(input: &str) -> Vec<SpannedToken> {
    let mut lex = Token::lexer(input);
    let mut out: Vec<SpannedToken> = Vec::new();
    while let Some(res) = lex.next() {
        let span = lex.span();
        let token = match res {
            Ok(tok) => tok,
            // Unrecognised input surfaces as an Error token so the parser can
            // report the offending lexeme with its position.
            Err(_) => Token::Error,
        };
        out.push(SpannedToken {
            token,
            lexeme: lex.slice().to_string(),
            start: span.start,
            end: span.end,
        });
    }
    out
}
