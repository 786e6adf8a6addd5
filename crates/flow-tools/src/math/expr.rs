//! Arithmetic expression evaluator
//!
//! Supports numbers, `$name` variables, `+ - * / % ^`, unary minus and
//! parentheses. `^` binds tighter than unary minus and is right-associative,
//! so `-2^2` is `-4` and `2^3^2` is `512`.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unexpected '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Unknown variable ${0}")]
    UnknownVariable(String),

    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Nesting allowed for parentheses, signs and `^` chains
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Var(String),
    Op(char),
    Open,
    Close,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Var(name) => format!("${}", name),
            Token::Op(op) => op.to_string(),
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = text.parse().map_err(|_| ExprError::InvalidNumber(text.clone()))?;
                tokens.push((Token::Number(n), pos));
            }
            '$' => {
                chars.next();
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_lowercase() {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(ExprError::UnexpectedChar { ch: '$', pos });
                }
                tokens.push((Token::Var(name), pos));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                chars.next();
                tokens.push((Token::Op(ch), pos));
            }
            '(' => {
                chars.next();
                tokens.push((Token::Open, pos));
            }
            ')' => {
                chars.next();
                tokens.push((Token::Close, pos));
            }
            _ => return Err(ExprError::UnexpectedChar { ch, pos }),
        }
    }

    Ok(tokens)
}

struct Parser<'a, F> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    lookup: &'a F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<f64>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), ExprError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn binding_power(op: char) -> (u8, u8) {
        match op {
            '+' | '-' => (1, 2),
            '*' | '/' | '%' => (3, 4),
            // right-associative
            _ => (8, 7),
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<f64, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = self.binary(min_bp);
        self.depth -= 1;
        value
    }

    fn binary(&mut self, min_bp: u8) -> Result<f64, ExprError> {
        let mut lhs = self.operand()?;

        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let (left_bp, right_bp) = Self::binding_power(op);
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(right_bp)?;
            lhs = match op {
                '+' => lhs + rhs,
                '-' => lhs - rhs,
                '*' => lhs * rhs,
                '/' => lhs / rhs,
                '%' => lhs % rhs,
                _ => lhs.powf(rhs),
            };
        }

        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, ExprError> {
        let (token, pos) = self.next()?;
        match token {
            Token::Number(n) => Ok(n),
            Token::Var(name) => (self.lookup)(&name).ok_or(ExprError::UnknownVariable(name)),
            Token::Op('-') => Ok(-self.expression(5)?),
            Token::Op('+') => self.expression(5),
            Token::Open => {
                let value = self.expression(0)?;
                match self.next()? {
                    (Token::Close, _) => Ok(value),
                    (token, pos) => Err(ExprError::UnexpectedToken { token: token.text(), pos }),
                }
            }
            token => Err(ExprError::UnexpectedToken { token: token.text(), pos }),
        }
    }
}

/// Evaluate an expression, resolving `$name` through `lookup`
pub fn evaluate<F>(src: &str, lookup: F) -> Result<f64, ExprError>
where
    F: Fn(&str) -> Option<f64>,
{
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        depth: 0,
        lookup: &lookup,
    };
    let value = parser.expression(0)?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some((token, pos)) => Err(ExprError::UnexpectedToken {
            token: token.text(),
            pos: *pos,
        }),
    }
}

fn variable_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([a-z]+)").ok()).as_ref()
}

/// Variable names in order of first appearance
pub fn variables(src: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let Some(pattern) = variable_pattern() else {
        return names;
    };
    for captures in pattern.captures_iter(src) {
        let name = &captures[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Result<f64, ExprError> {
        evaluate(src, |name| match name {
            "x" => Some(3.0),
            "y" => Some(4.0),
            _ => None,
        })
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(eval("10 - 4 - 3"), Ok(3.0));
        assert_eq!(eval("2 ^ 3 ^ 2"), Ok(512.0));
        assert_eq!(eval("-2 ^ 2"), Ok(-4.0));
        assert_eq!(eval("2 ^ -1"), Ok(0.5));
        assert_eq!(eval("7 % 4 * 2"), Ok(6.0));
    }

    #[test]
    fn test_variables() {
        assert_eq!(eval("$x * $x + $y * $y"), Ok(25.0));
        assert_eq!(eval("-$x"), Ok(-3.0));
        assert_eq!(eval("$z"), Err(ExprError::UnknownVariable("z".to_string())));
        assert_eq!(variables("$b + $a * $b - 2"), vec!["b", "a"]);
        assert!(variables("$ + 1").is_empty());
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("1 +"), Err(ExprError::UnexpectedEnd));
        assert_eq!(eval(""), Err(ExprError::UnexpectedEnd));
        assert_eq!(eval("2 # 3"), Err(ExprError::UnexpectedChar { ch: '#', pos: 2 }));
        assert_eq!(
            eval("(1 + 2"),
            Err(ExprError::UnexpectedEnd)
        );
        assert_eq!(
            eval("1 2"),
            Err(ExprError::UnexpectedToken { token: "2".to_string(), pos: 2 })
        );
        assert_eq!(eval("1.2.3"), Err(ExprError::InvalidNumber("1.2.3".to_string())));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(eval(&nested(100)), Ok(1.0));
        assert_eq!(eval(&nested(200_000)), Err(ExprError::TooDeep(MAX_DEPTH)));
        assert_eq!(eval(&format!("{}1", "-".repeat(200_000))), Err(ExprError::TooDeep(MAX_DEPTH)));
        assert_eq!(eval(&format!("{}1", "-".repeat(10))), Ok(1.0));
    }
}
