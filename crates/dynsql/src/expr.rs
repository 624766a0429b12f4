//! Activation expressions for conditional rules.
//!
//! A small Pratt parser over a boolean/comparison language:
//!
//! ```text
//! name != null and name.isEmpty() == false
//! :age >= 18 || vip
//! !(ids.size() > 100)
//! ```
//!
//! Unknown parameter names evaluate to null; the result is the truthiness of the value.

use std::cmp::Ordering;

use crate::error::{TemplateError, TemplateResult};
use crate::source::{SqlArgSource, resolve};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(Value),
    Path(String),
    Method(String, String),
    LeftParen,
    RightParen,
    Not,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Parsed activation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Method { path: String, method: String },
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Returns `(left_bp, right_bp)` for infix operators; higher binds tighter.
const fn infix_binding_power(token: &Token) -> Option<(u8, u8, BinaryOp)> {
    match token {
        Token::Or => Some((1, 2, BinaryOp::Or)),
        Token::And => Some((3, 4, BinaryOp::And)),
        Token::Eq => Some((5, 6, BinaryOp::Eq)),
        Token::NotEq => Some((5, 6, BinaryOp::NotEq)),
        Token::Lt => Some((5, 6, BinaryOp::Lt)),
        Token::LtEq => Some((5, 6, BinaryOp::LtEq)),
        Token::Gt => Some((5, 6, BinaryOp::Gt)),
        Token::GtEq => Some((5, 6, BinaryOp::GtEq)),
        _ => None,
    }
}

/// Prefix `!` / `not` binds tighter than any infix operator.
const NOT_BINDING_POWER: u8 = 7;

impl Expr {
    /// Parse expression text.
    pub fn parse(text: &str) -> TemplateResult<Expr> {
        let tokens = tokenize(text)?;
        let mut parser = ExprParser {
            text,
            tokens,
            pos: 0,
        };
        let expr = parser.expr(0)?;
        if parser.pos < parser.tokens.len() {
            return Err(TemplateError::expression(
                text,
                format!("unexpected token {:?}", parser.tokens[parser.pos]),
            ));
        }
        Ok(expr)
    }

    /// Evaluate against a parameter source.
    pub fn evaluate(&self, source: &dyn SqlArgSource) -> TemplateResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(path) => Ok(resolve(source, path)?.unwrap_or(Value::Null)),
            Expr::Method { path, method } => {
                let target = resolve(source, path)?.unwrap_or(Value::Null);
                call_method(&target, path, method)
            }
            Expr::Not(inner) => Ok(Value::Bool(!inner.evaluate(source)?.truthy())),
            Expr::Binary { op, left, right } => {
                let lhs = left.evaluate(source)?;
                match op {
                    BinaryOp::And => {
                        if !lhs.truthy() {
                            return Ok(Value::Bool(false));
                        }
                        Ok(Value::Bool(right.evaluate(source)?.truthy()))
                    }
                    BinaryOp::Or => {
                        if lhs.truthy() {
                            return Ok(Value::Bool(true));
                        }
                        Ok(Value::Bool(right.evaluate(source)?.truthy()))
                    }
                    cmp => {
                        let rhs = right.evaluate(source)?;
                        Ok(Value::Bool(compare(*cmp, &lhs, &rhs)))
                    }
                }
            }
        }
    }

    /// Parameter names (roots of paths) the expression reads.
    pub fn referenced_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path(path) | Expr::Method { path, .. } => out.push(path),
            Expr::Not(inner) => inner.collect_paths(out),
            Expr::Binary { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
        }
    }
}

/// Parse and evaluate `text`, returning its truthiness.
pub fn eval_condition(text: &str, source: &dyn SqlArgSource) -> TemplateResult<bool> {
    Ok(Expr::parse(text)?.evaluate(source)?.truthy())
}

fn call_method(target: &Value, path: &str, method: &str) -> TemplateResult<Value> {
    match method {
        "isEmpty" => Ok(Value::Bool(target.is_empty())),
        "isBlank" => Ok(Value::Bool(match target.as_str() {
            Some(s) => s.trim().is_empty(),
            None => target.is_empty(),
        })),
        "size" | "length" => Ok(match target.len() {
            Some(n) => Value::from(n),
            None if target.is_null() => Value::Null,
            None => {
                return Err(TemplateError::expression(
                    format!("{path}.{method}()"),
                    format!("{} value has no length", target.kind()),
                ));
            }
        }),
        other => Err(TemplateError::expression(
            format!("{path}.{other}()"),
            "unknown method",
        )),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ordering = order(lhs.plain(), rhs.plain());
    match op {
        BinaryOp::Eq => ordering == Some(Ordering::Equal),
        BinaryOp::NotEq => ordering != Some(Ordering::Equal),
        BinaryOp::Lt => ordering == Some(Ordering::Less),
        BinaryOp::LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => ordering == Some(Ordering::Greater),
        BinaryOp::GtEq => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        BinaryOp::And | BinaryOp::Or => false,
    }
}

/// Ordering between two values; `None` when they are not comparable.
///
/// Null equals only null. Numbers compare numerically, also against numeric text.
fn order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(s), other) | (other, Value::Text(s)) if other.as_f64().is_some() => {
            let parsed = s.trim().parse::<f64>().ok()?;
            let num = other.as_f64()?;
            if matches!(lhs, Value::Text(_)) {
                parsed.partial_cmp(&num)
            } else {
                num.partial_cmp(&parsed)
            }
        }
        (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (a, b) => (a == b).then_some(Ordering::Equal),
    }
}

struct ExprParser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self, min_bp: u8) -> TemplateResult<Expr> {
        let mut lhs = match self.next() {
            Some(Token::Literal(v)) => Expr::Literal(v),
            Some(Token::Path(p)) => Expr::Path(p),
            Some(Token::Method(path, method)) => Expr::Method { path, method },
            Some(Token::Not) => Expr::Not(Box::new(self.expr(NOT_BINDING_POWER)?)),
            Some(Token::LeftParen) => {
                let inner = self.expr(0)?;
                match self.next() {
                    Some(Token::RightParen) => inner,
                    _ => return Err(TemplateError::expression(self.text, "expected ')'")),
                }
            }
            Some(other) => {
                return Err(TemplateError::expression(
                    self.text,
                    format!("unexpected token {other:?}"),
                ));
            }
            None => {
                return Err(TemplateError::expression(self.text, "unexpected end of expression"));
            }
        };

        loop {
            let Some((l_bp, r_bp, op)) = self.peek().and_then(infix_binding_power) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(r_bp)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }
}

fn is_path_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$'
}

fn tokenize(text: &str) -> TemplateResult<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            _ if c.is_ascii_whitespace() => i += 1,
            b'(' => {
                tokens.push(Token::LeftParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RightParen);
                i += 1;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            b'!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            b'=' => {
                tokens.push(Token::Eq);
                i += if bytes.get(i + 1) == Some(&b'=') { 2 } else { 1 };
            }
            b'<' if bytes.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            b'<' | b'>' => {
                let eq = bytes.get(i + 1) == Some(&b'=');
                tokens.push(match (c, eq) {
                    (b'<', false) => Token::Lt,
                    (b'<', true) => Token::LtEq,
                    (_, false) => Token::Gt,
                    (_, true) => Token::GtEq,
                });
                i += if eq { 2 } else { 1 };
            }
            b'\'' | b'"' => {
                let (s, end) = read_string(text, i)?;
                tokens.push(Token::Literal(Value::Text(s)));
                i = end;
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let num = &text[start..i];
                let value = if num.contains('.') {
                    num.parse::<f64>().map(Value::Float).ok()
                } else {
                    num.parse::<i64>().map(Value::Int).ok()
                };
                let value = value.ok_or_else(|| {
                    TemplateError::expression(text, format!("invalid number `{num}`"))
                })?;
                tokens.push(Token::Literal(value));
            }
            b':' | b'&' | b'#' => {
                // template-style prefixes on names
                i += 1;
            }
            _ if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                let start = i;
                while i < bytes.len() {
                    if is_path_byte(bytes[i]) {
                        i += 1;
                    } else if bytes[i] == b'[' {
                        let close = bracket_end(bytes, i).ok_or_else(|| {
                            TemplateError::expression(text, "unclosed '['")
                        })?;
                        i = close + 1;
                    } else {
                        break;
                    }
                }
                let word = &text[start..i];
                tokens.push(word_token(text, word, bytes, &mut i)?);
            }
            _ => {
                return Err(TemplateError::expression(
                    text,
                    format!("unexpected character '{}'", char::from(c)),
                ));
            }
        }
    }
    Ok(tokens)
}

fn word_token(text: &str, word: &str, bytes: &[u8], i: &mut usize) -> TemplateResult<Token> {
    let keyword = match word.to_ascii_lowercase().as_str() {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "eq" => Some(Token::Eq),
        "neq" | "ne" => Some(Token::NotEq),
        "lt" => Some(Token::Lt),
        "lte" | "le" => Some(Token::LtEq),
        "gt" => Some(Token::Gt),
        "gte" | "ge" => Some(Token::GtEq),
        "true" => Some(Token::Literal(Value::Bool(true))),
        "false" => Some(Token::Literal(Value::Bool(false))),
        "null" => Some(Token::Literal(Value::Null)),
        _ => None,
    };
    if let Some(token) = keyword {
        return Ok(token);
    }

    // `path.method()` call
    let mut j = *i;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    if bytes.get(j) == Some(&b'(') {
        let Some((path, method)) = word.rsplit_once('.') else {
            return Err(TemplateError::expression(
                text,
                format!("function calls are not supported: {word}()"),
            ));
        };
        let mut k = j + 1;
        while k < bytes.len() && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if bytes.get(k) != Some(&b')') {
            return Err(TemplateError::expression(
                text,
                format!("method {method}() takes no arguments"),
            ));
        }
        *i = k + 1;
        return Ok(Token::Method(path.to_string(), method.to_string()));
    }

    Ok(Token::Path(word.to_string()))
}

fn bracket_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(open + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b']' => return Some(i),
            None => {}
        }
    }
    None
}

fn read_string(text: &str, start: usize) -> TemplateResult<(String, usize)> {
    let bytes = text.as_bytes();
    let quote = bytes[start];
    let mut out = String::new();
    let mut i = start + 1;
    let mut seg_start = i;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push_str(&text[seg_start..i]);
                seg_start = i + 1;
                i += 2;
            }
            b if b == quote => {
                out.push_str(&text[seg_start..i]);
                return Ok((out, i + 1));
            }
            _ => i += 1,
        }
    }
    Err(TemplateError::expression(text, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn eval(text: &str) -> bool {
        let source = params! {
            "name" => "alice",
            "empty" => "",
            "age" => 30,
            "ids" => vec![1, 2, 3],
            "none" => Value::Null,
            "vip" => true,
            "user" => serde_json::json!({"roles": ["admin"]}),
        };
        eval_condition(text, &source).unwrap()
    }

    #[test]
    fn literals_and_names() {
        assert!(eval("true"));
        assert!(!eval("false"));
        assert!(!eval("null"));
        assert!(eval("name"));
        assert!(!eval("empty"));
        assert!(!eval("none"));
        assert!(!eval("missing"));
        assert!(eval(":vip"));
    }

    #[test]
    fn comparisons() {
        assert!(eval("age == 30"));
        assert!(eval("age >= 18 and age < 65"));
        assert!(eval("name == 'alice'"));
        assert!(eval("name != \"bob\""));
        assert!(eval("none == null"));
        assert!(eval("missing == null"));
        assert!(!eval("name == null"));
        assert!(eval("age gt 29"));
        assert!(eval("age == '30'"));
        assert!(!eval("none > 1"));
    }

    #[test]
    fn logic_and_precedence() {
        assert!(eval("false || age > 1 && vip"));
        assert!(!eval("!(vip)"));
        assert!(eval("!missing"));
        assert!(eval("not empty and name"));
        assert!(eval("(age < 10 or vip) and !none"));
    }

    #[test]
    fn methods_and_paths() {
        assert!(eval("ids.size() == 3"));
        assert!(eval("empty.isEmpty()"));
        assert!(!eval("name.isEmpty()"));
        assert!(eval("name.length() > 3"));
        assert!(eval("user.roles[0] == 'admin'"));
        assert!(eval("user.roles.size() > 0"));
        assert!(!eval("missing.size() > 0"));
    }

    #[test]
    fn errors() {
        let source = params! {};
        assert!(eval_condition("age ==", &source).is_err());
        assert!(eval_condition("(age", &source).is_err());
        assert!(eval_condition("'open", &source).is_err());
        assert!(eval_condition("a.frobnicate()", &source).is_err());
        assert!(eval_condition("a ~ b", &source).is_err());
    }

    #[test]
    fn referenced_paths() {
        let expr = Expr::parse("a > 1 and b.size() > 0 or !c.d").unwrap();
        assert_eq!(expr.referenced_paths(), vec!["a", "b", "c.d"]);
    }
}
