use sigcomp_lexer::{tokenize_detailed, Token};
use sigcomp_symbolic::{Indexing, SignalRole, SymExpr, SymbolEntry, SymbolTable};
use std::fmt;

/// A system equation such as `y[n] = x[n] - x[n-1]`. Plain expressions are
/// accepted too and have no left-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEquation {
    pub lhs: Option<SymExpr>,
    pub rhs: SymExpr,
}

impl fmt::Display for SystemEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lhs {
            Some(lhs) => write!(f, "{lhs}={}", self.rhs),
            None => write!(f, "{}", self.rhs),
        }
    }
}

#[derive(Clone)]
struct TokenInfo {
    token: Token,
    lexeme: String,
    position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub found_token: Option<String>,
    pub expected: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at position {}: {}",
            self.position, self.message
        )?;
        if let Some(found) = &self.found_token {
            write!(f, " (found: '{found}')")?;
        }
        if let Some(expected) = &self.expected {
            write!(f, " (expected: {expected})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Spellings rewritten before lexing, tried in order at each offset. The
/// flag marks rewrites that must not continue an identifier on the left.
const SPELLINGS: [(&str, &str, bool); 4] = [
    ("u(t)", "Heaviside(t)", true),
    ("δ(t)", "DiracDelta(t)", false),
    ("delta(t)", "DiracDelta(t)", true),
    ("δ", "delta", false),
];

#[derive(Debug, Clone, Copy)]
struct Rewrite {
    at: usize,
    len: usize,
    original_at: usize,
    original_len: usize,
}

/// Input text with the step and impulse spellings made canonical: `u(t)`
/// becomes `Heaviside(t)`, `δ(t)` and `delta(t)` become `DiracDelta(t)` and
/// any other `δ` becomes `delta`. Offsets into the rewritten text map back to
/// the text the user typed.
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    text: String,
    original_len: usize,
    rewrites: Vec<Rewrite>,
}

impl NormalizedSource {
    pub fn new(input: &str) -> Self {
        let mut text = String::with_capacity(input.len());
        let mut rewrites = Vec::new();
        let mut offset = 0;
        while let Some(ch) = input[offset..].chars().next() {
            let rest = &input[offset..];
            let glued = input[..offset]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            let spelling = SPELLINGS
                .iter()
                .find(|(from, _, bounded)| rest.starts_with(from) && !(*bounded && glued));
            match spelling {
                Some((from, to, _)) => {
                    rewrites.push(Rewrite {
                        at: text.len(),
                        len: to.len(),
                        original_at: offset,
                        original_len: from.len(),
                    });
                    text.push_str(to);
                    offset += from.len();
                }
                None => {
                    text.push(ch);
                    offset += ch.len_utf8();
                }
            }
        }
        NormalizedSource {
            text,
            original_len: input.len(),
            rewrites,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset in the original input for an offset into [`text`](Self::text).
    /// Offsets inside a rewritten spelling map to where that spelling starts.
    pub fn original_offset(&self, pos: usize) -> usize {
        let mut before = None;
        for rewrite in &self.rewrites {
            if pos < rewrite.at {
                break;
            }
            if pos < rewrite.at + rewrite.len {
                return rewrite.original_at;
            }
            before = Some(rewrite);
        }
        let mapped = match before {
            Some(r) => r.original_at + r.original_len + (pos - r.at - r.len),
            None => pos,
        };
        mapped.min(self.original_len)
    }
}

/// Parse an expression against the global symbol table
pub fn parse(input: &str) -> Result<SymExpr, ParseError> {
    parse_with_table(input, SymbolTable::global())
}

pub fn parse_with_table(input: &str, table: &SymbolTable) -> Result<SymExpr, ParseError> {
    let mut parser = Parser::new(input, table, false)?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse `lhs = rhs` (or a bare expression) with signal references allowed
pub fn parse_equation(input: &str) -> Result<SystemEquation, ParseError> {
    parse_equation_with_table(input, SymbolTable::global())
}

pub fn parse_equation_with_table(
    input: &str,
    table: &SymbolTable,
) -> Result<SystemEquation, ParseError> {
    let mut parser = Parser::new(input, table, true)?;
    let first = parser.parse_expr()?;
    let equation = if parser.consume(&Token::Assign) {
        SystemEquation {
            lhs: Some(first),
            rhs: parser.parse_expr()?,
        }
    } else {
        SystemEquation {
            lhs: None,
            rhs: first,
        }
    };
    parser.expect_end()?;
    Ok(equation)
}

struct Parser<'a> {
    tokens: Vec<TokenInfo>,
    pos: usize,
    input_len: usize,
    table: &'a SymbolTable,
    allow_signals: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &str, table: &'a SymbolTable, allow_signals: bool) -> Result<Self, ParseError> {
        let source = NormalizedSource::new(input);
        let mut tokens = Vec::new();
        for t in tokenize_detailed(source.text()) {
            let position = source.original_offset(t.start);
            if matches!(t.token, Token::Error) {
                return Err(ParseError {
                    message: format!("Invalid token: '{}'", t.lexeme),
                    position,
                    found_token: Some(t.lexeme),
                    expected: None,
                });
            }
            tokens.push(TokenInfo {
                token: t.token,
                lexeme: t.lexeme,
                position,
            });
        }
        if tokens.is_empty() {
            return Err(ParseError {
                message: "empty expression".to_string(),
                position: 0,
                found_token: None,
                expected: Some("an expression".to_string()),
            });
        }
        log::trace!("parsing '{}' ({} tokens)", source.text(), tokens.len());
        Ok(Parser {
            tokens,
            pos: 0,
            input_len: input.len(),
            table,
            allow_signals,
        })
    }

    fn error(&self, message: &str) -> ParseError {
        let (position, found_token) = match self.tokens.get(self.pos) {
            Some(info) => (info.position, Some(info.lexeme.clone())),
            None => (self.input_len, None),
        };
        ParseError {
            message: message.to_string(),
            position,
            found_token,
            expected: None,
        }
    }

    fn error_with_expected(&self, message: &str, expected: &str) -> ParseError {
        ParseError {
            expected: Some(expected.to_string()),
            ..self.error(message)
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.pos < self.tokens.len() {
            return Err(self.error_with_expected("unexpected trailing input", "end of input"));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<SymExpr, ParseError> {
        self.parse_add_sub()
    }

    /// A chain of `+`/`-` becomes one flat sum; `a - b` is `a + (-b)`.
    fn parse_add_sub(&mut self) -> Result<SymExpr, ParseError> {
        let mut terms = vec![self.parse_mul_div()?];
        loop {
            if self.consume(&Token::Plus) {
                terms.push(self.parse_mul_div()?);
            } else if self.consume(&Token::Minus) {
                terms.push(SymExpr::neg(self.parse_mul_div()?));
            } else {
                break;
            }
        }
        Ok(SymExpr::add(terms))
    }

    /// A chain of `*`/`/` becomes one flat product; `a / b` is `a * b^-1`.
    fn parse_mul_div(&mut self) -> Result<SymExpr, ParseError> {
        let mut factors = vec![self.parse_unary()?];
        loop {
            if self.consume(&Token::Star) {
                factors.push(self.parse_unary()?);
            } else if self.consume(&Token::Slash) {
                factors.push(SymExpr::recip(self.parse_unary()?));
            } else {
                break;
            }
        }
        Ok(SymExpr::mul(factors))
    }

    fn parse_unary(&mut self) -> Result<SymExpr, ParseError> {
        if self.consume(&Token::Plus) {
            self.parse_unary()
        } else if self.consume(&Token::Minus) {
            Ok(SymExpr::neg(self.parse_unary()?))
        } else {
            self.parse_pow()
        }
    }

    fn parse_pow(&mut self) -> Result<SymExpr, ParseError> {
        let base = self.parse_primary()?;
        if !self.consume(&Token::Caret) {
            return Ok(base);
        }
        // Right associative; the exponent may carry its own sign (2^-t)
        let exp = self.parse_exponent()?;
        Ok(SymExpr::pow(base, exp))
    }

    fn parse_exponent(&mut self) -> Result<SymExpr, ParseError> {
        if self.consume(&Token::Plus) {
            self.parse_exponent()
        } else if self.consume(&Token::Minus) {
            Ok(SymExpr::neg(self.parse_exponent()?))
        } else {
            self.parse_pow()
        }
    }

    fn parse_primary(&mut self) -> Result<SymExpr, ParseError> {
        let Some(info) = self.peek_info() else {
            return Err(self.error_with_expected("unexpected end of input", "an operand"));
        };
        match info.token {
            Token::Integer | Token::Float => {
                self.pos += 1;
                self.parse_number(&info)
            }
            Token::Ident => {
                self.pos += 1;
                self.parse_identifier(&info)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error_with_expected("unexpected token", "an operand")),
        }
    }

    fn parse_number(&self, info: &TokenInfo) -> Result<SymExpr, ParseError> {
        if info.token == Token::Integer {
            if let Ok(n) = info.lexeme.parse::<i64>() {
                return Ok(SymExpr::int(n));
            }
        }
        match info.lexeme.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(SymExpr::float(value)),
            _ => Err(ParseError {
                message: "numeric literal out of range".to_string(),
                position: info.position,
                found_token: Some(info.lexeme.clone()),
                expected: None,
            }),
        }
    }

    fn parse_identifier(&mut self, info: &TokenInfo) -> Result<SymExpr, ParseError> {
        let unknown = || ParseError {
            message: format!("unknown identifier '{}'", info.lexeme),
            position: info.position,
            found_token: Some(info.lexeme.clone()),
            expected: None,
        };
        let table = self.table;
        match table.lookup(&info.lexeme).ok_or_else(unknown)? {
            SymbolEntry::Variable(sym) => Ok(SymExpr::symbol(sym.clone())),
            SymbolEntry::Constant(c) => Ok(SymExpr::constant(*c)),
            SymbolEntry::Function(func) => {
                let func = *func;
                self.expect(&Token::LParen)?;
                let mut args = vec![self.parse_expr()?];
                while self.consume(&Token::Comma) {
                    args.push(self.parse_expr()?);
                }
                self.expect(&Token::RParen)?;
                if args.len() != func.arity() {
                    return Err(ParseError {
                        message: format!(
                            "{} expects {} argument(s), got {}",
                            info.lexeme,
                            func.arity(),
                            args.len()
                        ),
                        position: info.position,
                        found_token: Some(info.lexeme.clone()),
                        expected: None,
                    });
                }
                Ok(SymExpr::func(func.canonical_name(), args))
            }
            SymbolEntry::Signal(role) => {
                if !self.allow_signals {
                    let kind = match role {
                        SignalRole::Input => "input",
                        SignalRole::Output => "output",
                    };
                    return Err(ParseError {
                        message: format!(
                            "{kind} signal '{}' is only allowed in system equations",
                            info.lexeme
                        ),
                        position: info.position,
                        found_token: Some(info.lexeme.clone()),
                        expected: None,
                    });
                }
                let (indexing, close) = if self.consume(&Token::LParen) {
                    (Indexing::Call, Token::RParen)
                } else if self.consume(&Token::LBracket) {
                    (Indexing::Index, Token::RBracket)
                } else {
                    return Err(self.error_with_expected(
                        "signal reference needs an argument",
                        "'(' or '['",
                    ));
                };
                let index = self.parse_expr()?;
                self.expect(&close)?;
                Ok(SymExpr::signal(info.lexeme.clone(), index, indexing))
            }
        }
    }

    fn expect(&mut self, t: &Token) -> Result<(), ParseError> {
        if self.consume(t) {
            Ok(())
        } else {
            Err(self.error_with_expected("unexpected token", t.describe()))
        }
    }

    fn peek_info(&self) -> Option<TokenInfo> {
        self.tokens.get(self.pos).cloned()
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn consume(&mut self, t: &Token) -> bool {
        if self.peek_token() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
