//! Property paths such as `user.name`, `items[0]` or `attrs['key']`.

use std::fmt;

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

use super::SqlArgSource;

/// One step after the root name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// A parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    root: String,
    steps: Vec<PathStep>,
}

impl PropertyPath {
    /// Parse a path. A leading `:` or `&` is ignored so template syntax can be reused.
    pub fn parse(expr: &str) -> TemplateResult<Self> {
        let text = expr.trim();
        let text = text
            .strip_prefix(':')
            .or_else(|| text.strip_prefix('&'))
            .unwrap_or(text);
        let bytes = text.as_bytes();

        let root_end = bytes
            .iter()
            .position(|&b| b == b'.' || b == b'[')
            .unwrap_or(bytes.len());
        let root = text[..root_end].trim();
        if root.is_empty() {
            return Err(TemplateError::expression(expr, "empty property name"));
        }

        let mut steps = Vec::new();
        let mut i = root_end;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    let start = i + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|&b| b == b'.' || b == b'[')
                        .map_or(bytes.len(), |p| start + p);
                    let key = text[start..end].trim();
                    if key.is_empty() {
                        return Err(TemplateError::expression(expr, "empty property after '.'"));
                    }
                    steps.push(PathStep::Key(key.to_string()));
                    i = end;
                }
                b'[' => {
                    let close = find_bracket_end(bytes, i + 1)
                        .ok_or_else(|| TemplateError::expression(expr, "unclosed '['"))?;
                    let inner = text[i + 1..close].trim();
                    steps.push(parse_bracket(expr, inner)?);
                    i = close + 1;
                }
                _ => {
                    return Err(TemplateError::expression(
                        expr,
                        format!("unexpected character at {i}"),
                    ));
                }
            }
        }

        Ok(Self {
            root: root.to_string(),
            steps,
        })
    }

    /// The top-level parameter name.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Resolve against a source.
    ///
    /// Returns `None` when the root name is absent. Missing keys, out-of-range indexes and
    /// null intermediates resolve to [`Value::Null`].
    pub fn resolve(&self, source: &dyn SqlArgSource) -> TemplateResult<Option<Value>> {
        let Some(root) = source.get_value(&self.root) else {
            return Ok(None);
        };
        let mut current = root.plain();
        for step in &self.steps {
            current = match (current, step) {
                (Value::Null, _) => return Ok(Some(Value::Null)),
                (Value::Map(map), PathStep::Key(key)) => match map.get(key) {
                    Some(v) => v.plain(),
                    None => return Ok(Some(Value::Null)),
                },
                (Value::List(items), PathStep::Index(index)) => match items.get(*index) {
                    Some(v) => v.plain(),
                    None => return Ok(Some(Value::Null)),
                },
                (Value::List(items), PathStep::Key(key)) => match key.parse::<usize>() {
                    Ok(index) => match items.get(index) {
                        Some(v) => v.plain(),
                        None => return Ok(Some(Value::Null)),
                    },
                    Err(_) => return Err(self.step_error(current, step)),
                },
                (Value::Map(map), PathStep::Index(index)) => match map.get(&index.to_string()) {
                    Some(v) => v.plain(),
                    None => return Ok(Some(Value::Null)),
                },
                (other, step) => return Err(self.step_error(other, step)),
            };
        }
        Ok(Some(current.clone()))
    }

    fn step_error(&self, value: &Value, step: &PathStep) -> TemplateError {
        let step = match step {
            PathStep::Key(k) => format!(".{k}"),
            PathStep::Index(i) => format!("[{i}]"),
        };
        TemplateError::expression(
            self.to_string(),
            format!("cannot apply `{step}` to {} value", value.kind()),
        )
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for step in &self.steps {
            match step {
                PathStep::Key(k) => write!(f, ".{k}")?,
                PathStep::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

fn find_bracket_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
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

fn parse_bracket(expr: &str, inner: &str) -> TemplateResult<PathStep> {
    for q in ['\'', '"'] {
        if let Some(key) = inner.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return Ok(PathStep::Key(key.to_string()));
        }
    }
    inner
        .parse::<usize>()
        .map(PathStep::Index)
        .map_err(|_| TemplateError::expression(expr, format!("invalid index `[{inner}]`")))
}

/// Resolve an expression: an exact key first (names may contain dots), then a property path.
pub fn resolve(source: &dyn SqlArgSource, expr: &str) -> TemplateResult<Option<Value>> {
    let expr = expr.trim();
    if let Some(value) = source.get_value(expr) {
        return Ok(Some(value.clone()));
    }
    PropertyPath::parse(expr)?.resolve(source)
}

/// Top-level name referenced by an expression.
pub fn root_name(expr: &str) -> TemplateResult<String> {
    Ok(PropertyPath::parse(expr)?.root().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn parses_mixed_paths() {
        let path = PropertyPath::parse("id.ccc['aaa'][0]").unwrap();
        assert_eq!(path.root(), "id");
        assert_eq!(
            path.steps(),
            &[
                PathStep::Key("ccc".into()),
                PathStep::Key("aaa".into()),
                PathStep::Index(0)
            ]
        );
        assert!(PropertyPath::parse("a[").is_err());
        assert!(PropertyPath::parse("a.").is_err());
        assert!(PropertyPath::parse("a[x]").is_err());
    }

    #[test]
    fn resolves_nested_values() {
        let source = params! {
            "user" => serde_json::json!({"name": "alice", "tags": ["a", "b"]}),
        };
        assert_eq!(resolve(&source, "user.name").unwrap(), Some(Value::from("alice")));
        assert_eq!(resolve(&source, "user.tags[1]").unwrap(), Some(Value::from("b")));
        assert_eq!(resolve(&source, "user['name']").unwrap(), Some(Value::from("alice")));
        assert_eq!(resolve(&source, "user.missing").unwrap(), Some(Value::Null));
        assert_eq!(resolve(&source, "user.tags[9]").unwrap(), Some(Value::Null));
        assert_eq!(resolve(&source, "nobody.name").unwrap(), None);
        assert!(resolve(&source, "user.name.first").is_err());
    }

    #[test]
    fn exact_key_with_dots_wins() {
        let source = params! { "a.b" => 1 };
        assert_eq!(resolve(&source, "a.b").unwrap(), Some(Value::Int(1)));
    }
}
