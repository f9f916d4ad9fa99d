//! Restricted arithmetic over story variables.
//!
//! Authored expressions are untrusted text. After variable and
//! `random(a,b)` substitution the expression must consist only of
//! `0-9 + - * / . ( )` and spaces; anything else evaluates to `0`.

use rand::rngs::StdRng;
use rand::Rng;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

use crate::core::variables::{format_number, VariableStore};

static VARIABLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid variable token regex"));

static RANDOM_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"random\((\d+),\s*(\d+)\)").expect("valid random() regex")
});

const ALLOWED_CHARS: &str = "0123456789+-*/.() ";

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("disallowed character '{0}'")]
    DisallowedChar(char),
    #[error("random({0},{1}) has an empty range")]
    EmptyRange(u64, u64),
    #[error("malformed number '{0}'")]
    BadNumber(String),
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
}

/// Evaluates authored arithmetic such as `{gold} * 2 + random(1,6)`.
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Evaluate `expr`, returning `0` for anything malformed or disallowed.
    pub fn evaluate<S: VariableStore + ?Sized>(expr: &str, store: &S, rng: &mut StdRng) -> f64 {
        match Self::try_evaluate(expr, store, rng) {
            Ok(value) => value,
            Err(e) => {
                warn!(expression = expr, error = %e, "expression rejected, using 0");
                0.0
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate) but reports why an expression
    /// was rejected.
    pub fn try_evaluate<S: VariableStore + ?Sized>(
        expr: &str,
        store: &S,
        rng: &mut StdRng,
    ) -> Result<f64, ExpressionError> {
        let substituted = Self::substitute_variables(expr, store);
        let substituted = Self::substitute_random(&substituted, rng)?;

        if let Some(bad) = substituted.chars().find(|c| !ALLOWED_CHARS.contains(*c)) {
            return Err(ExpressionError::DisallowedChar(bad));
        }

        let tokens = tokenize(&substituted)?;
        let mut parser = Parser { tokens, pos: 0 };
        let value = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(ExpressionError::UnexpectedToken(parser.pos));
        }
        if !value.is_finite() {
            return Err(ExpressionError::NotFinite);
        }
        Ok(value)
    }

    /// Replace every `{name}` with the variable's current value
    /// (missing variables read as `0`).
    fn substitute_variables<S: VariableStore + ?Sized>(expr: &str, store: &S) -> String {
        VARIABLE_TOKEN
            .replace_all(expr, |caps: &Captures| format_number(store.variable(&caps[1])))
            .into_owned()
    }

    /// Replace every `random(a,b)` with one integer drawn from `[a, b]`.
    fn substitute_random(expr: &str, rng: &mut StdRng) -> Result<String, ExpressionError> {
        let mut out = String::with_capacity(expr.len());
        let mut last = 0;
        for caps in RANDOM_CALL.captures_iter(expr) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let low: u64 = caps[1]
                .parse()
                .map_err(|_| ExpressionError::BadNumber(caps[1].to_string()))?;
            let high: u64 = caps[2]
                .parse()
                .map_err(|_| ExpressionError::BadNumber(caps[2].to_string()))?;
            if low > high {
                return Err(ExpressionError::EmptyRange(low, high));
            }
            out.push_str(&expr[last..whole.start()]);
            out.push_str(&rng.gen_range(low..=high).to_string());
            last = whole.end();
        }
        out.push_str(&expr[last..]);
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::StarStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::SlashSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if start == i {
                    return Err(ExpressionError::DisallowedChar(c));
                }
                let literal: String = chars[start..i].iter().collect();
                if literal == "." {
                    return Err(ExpressionError::BadNumber(literal));
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::BadNumber(literal.clone()))?;
                tokens.push(Token::Num(value));
            }
        }
    }

    Ok(tokens)
}

/// Recursive-descent evaluator. Precedence, lowest first: `+ -`,
/// `* / //`, unary sign, `**` (right associative, binds tighter than a
/// unary sign on its left).
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expression(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value /= divisor;
                }
                Some(Token::SlashSlash) => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value = (value / divisor).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, ExpressionError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::StarStar) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, ExpressionError> {
        let at = self.pos;
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(ExpressionError::UnexpectedToken(self.pos - 1)),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(_) => Err(ExpressionError::UnexpectedToken(at)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}
