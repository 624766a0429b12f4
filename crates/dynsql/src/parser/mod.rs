//! Placeholder parser.
//!
//! A single left-to-right pass turns template text into a flat list of [`Segment`]s:
//!
//! - `?` → [`Segment::Positional`]
//! - `:expr` / `&expr` → [`Segment::Named`] (`::` casts stay literal)
//! - `${expr}` → [`Segment::Injection`]
//! - `#{expr, key=value}` → [`Segment::Value`]
//! - `@{rule, activeExpr, body}` → [`Segment::Rule`]
//!
//! Quoted strings, quoted identifiers and comments are copied through untouched.

pub mod config;

#[cfg(test)]
mod tests;

use crate::error::{TemplateError, TemplateResult};
use crate::scanner::{skip_quoted, skip_quoted_or_comment};
use crate::segment::{RuleInvocation, Segment};

pub use config::{ArgConfig, MAX_CONFIG_TOKENS, parse_value_arg};

/// Characters that end a `:name` / `&name` expression (besides whitespace).
const PARAMETER_SEPARATORS: &[u8] = b":,;(){}\\|&^~!=<>+-*%/";

fn is_parameter_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || PARAMETER_SEPARATORS.contains(&b)
}

/// Parse template text into segments.
pub fn parse_segments(template: &str) -> TemplateResult<Vec<Segment>> {
    let mut parser = Parser::new(template);
    parser.run()?;
    Ok(parser.segments)
}

struct Parser<'a> {
    sql: &'a str,
    bytes: &'a [u8],
    segments: Vec<Segment>,
    /// Start of the pending literal.
    pos: usize,
    /// Positional counter shared by `?`, `:name`, `&name` and `#{}`.
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            bytes: sql.as_bytes(),
            segments: Vec::new(),
            pos: 0,
            position: 0,
        }
    }

    fn run(&mut self) -> TemplateResult<()> {
        let len = self.bytes.len();
        let mut i = 0;
        while i < len {
            let skip_to = skip_quoted_or_comment(self.bytes, i);
            if skip_to != i {
                i = skip_to;
                continue;
            }

            match self.bytes[i] {
                b'?' => {
                    self.flush_literal(i);
                    self.segments.push(Segment::Positional(self.position));
                    self.position += 1;
                    i += 1;
                    self.pos = i;
                }
                c @ (b':' | b'&') => {
                    if c == b':' && self.bytes.get(i + 1) == Some(&b':') {
                        i += 2;
                        continue;
                    }
                    i = self.named(i, c == b'&')?;
                }
                c @ (b'@' | b'#' | b'$') if self.bytes.get(i + 1) == Some(&b'{') => {
                    if i > 0 && self.bytes[i - 1] == b'\\' {
                        i += 1;
                        continue;
                    }
                    i = self.braced(i, c)?;
                }
                _ => i += 1,
            }
        }

        self.flush_literal(len);
        Ok(())
    }

    fn flush_literal(&mut self, end: usize) {
        if end > self.pos {
            push_literal(&mut self.segments, &self.sql[self.pos..end]);
        }
        self.pos = end;
    }

    /// `:expr` / `&expr` starting at `start`; returns the index to continue from.
    fn named(&mut self, start: usize, raw: bool) -> TemplateResult<usize> {
        let mut j = start + 1;
        while j < self.bytes.len() && !is_parameter_separator(self.bytes[j]) {
            j += 1;
        }
        if j - start <= 1 {
            // lone ':' or '&' is plain text
            return Ok(start + 1);
        }

        let expr = &self.sql[start + 1..j];
        if expr.contains(['#', '@']) {
            return Err(TemplateError::parse(
                start,
                format!("expression cannot include '#' or '@': {expr}"),
            ));
        }

        self.flush_literal(start);
        self.segments.push(Segment::Named {
            expr: expr.to_string(),
            raw,
        });
        self.position += 1;
        self.pos = j;
        Ok(j)
    }

    /// `@{..}`, `#{..}` or `${..}` starting at `start`; returns the index to continue from.
    fn braced(&mut self, start: usize, kind: u8) -> TemplateResult<usize> {
        let open = start + 1;
        let close = find_closing_brace(self.bytes, open).ok_or_else(|| {
            TemplateError::parse(
                start,
                format!("unterminated {}{{ placeholder", char::from(kind)),
            )
        })?;
        let content = &self.sql[open + 1..close];
        if content.trim().is_empty() {
            return Err(TemplateError::parse(
                start,
                format!("empty {}{{}} placeholder", char::from(kind)),
            ));
        }

        let segment = match kind {
            b'@' => Segment::Rule(
                parse_rule_invocation(content).map_err(|e| reoffset(e, start))?,
            ),
            b'#' => {
                let (expr, config) =
                    parse_value_arg(content).map_err(|e| TemplateError::parse(start, e.to_string()))?;
                self.position += 1;
                Segment::Value {
                    content: content.to_string(),
                    expr,
                    config,
                }
            }
            _ => Segment::Injection(content.to_string()),
        };

        self.flush_literal(start);
        self.segments.push(segment);
        self.pos = close + 1;
        Ok(close + 1)
    }
}

fn reoffset(err: TemplateError, start: usize) -> TemplateError {
    match err {
        TemplateError::Parse { offset, message } => TemplateError::parse(start + offset, message),
        other => TemplateError::parse(start, other.to_string()),
    }
}

/// Append literal text, merging with a preceding literal.
pub(crate) fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Index of the `}` matching the `{` at `open`. Quotes are skipped, nested braces counted and
/// `\}` treated as escaped.
fn find_closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        let next = skip_quoted(bytes, i);
        if next != i {
            i = next;
            continue;
        }
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the next top-level `,` in `content` from `start` (or `content.len()`).
///
/// Commas inside quotes (with backslash escapes), braces or parentheses do not split.
fn next_token_index(content: &[u8], start: usize) -> usize {
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    for (index, &c) in content.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == b'\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'\'' | b'"' => quote = Some(c),
                b'{' | b'(' => depth += 1,
                b'}' | b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => return index,
                _ => {}
            },
        }
    }
    content.len()
}

/// Split `@{...}` content into rule name, activation expression and body.
pub(crate) fn parse_rule_invocation(content: &str) -> TemplateResult<RuleInvocation> {
    let bytes = content.as_bytes();
    let name_end = next_token_index(bytes, 0);
    let name = content[..name_end].trim();
    if name.is_empty() {
        return Err(TemplateError::parse(0, "rule name is empty"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(TemplateError::parse(0, format!("invalid rule name: {name}")));
    }

    let (active_expr, body, tail) = if name_end < bytes.len() {
        let tail_start = name_end + 1;
        let active_end = next_token_index(bytes, tail_start);
        let body = (active_end < bytes.len()).then(|| content[active_end + 1..].to_string());
        (
            Some(content[tail_start..active_end].to_string()),
            body,
            Some(content[tail_start..].to_string()),
        )
    } else {
        (None, None, None)
    };

    Ok(RuleInvocation {
        content: content.to_string(),
        name: name.to_string(),
        active_expr,
        body,
        tail,
    })
}
