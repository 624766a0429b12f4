//! Error types for dynsql

use thiserror::Error;

/// Result type alias for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Error types for parsing and binding templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template text (unterminated placeholder, forbidden characters, ...)
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A rule failed while expanding its body
    #[error("Rule '{rule}' failed on `{body}`: {source}")]
    Rule {
        rule: String,
        body: String,
        #[source]
        source: Box<TemplateError>,
    },

    /// No rule registered under this name
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// No macro registered under this name
    #[error("Unknown macro: {0}")]
    UnknownMacro(String),

    /// A required parameter is absent from the source
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Activation expression could not be parsed or evaluated
    #[error("Expression error in `{expr}`: {message}")]
    Expression { expr: String, message: String },

    /// Malformed argument configuration, unknown type or handler
    #[error("Config error: {0}")]
    Config(String),

    /// Value conversion error
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Nested rule/macro expansion went deeper than allowed
    #[error("Rule expansion exceeded maximum depth of {0}")]
    RecursionLimit(usize),
}

impl TemplateError {
    /// Create a parse error at a byte offset of the template
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Wrap an error raised while evaluating a rule
    pub fn rule(rule: impl Into<String>, body: impl Into<String>, source: TemplateError) -> Self {
        Self::Rule {
            rule: rule.into(),
            body: body.into(),
            source: Box::new(source),
        }
    }

    /// Create an expression error
    pub fn expression(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Check if this is a parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check if this is (or wraps) a missing parameter error
    pub fn is_missing_parameter(&self) -> bool {
        match self {
            Self::MissingParameter(_) => true,
            Self::Rule { source, .. } => source.is_missing_parameter(),
            _ => false,
        }
    }

    /// The innermost error, looking through rule wrappers
    pub fn root_cause(&self) -> &TemplateError {
        match self {
            Self::Rule { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Conversion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_error_keeps_rule_and_body() {
        let err = TemplateError::rule(
            "in",
            ":a :b",
            TemplateError::config("in rule expects exactly 1 parameter, found 2"),
        );
        let msg = err.to_string();
        assert!(msg.contains("'in'"));
        assert!(msg.contains(":a :b"));
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn missing_parameter_is_seen_through_rule_wrappers() {
        let err = TemplateError::rule(
            "macro",
            "cols",
            TemplateError::rule("if", ":x", TemplateError::MissingParameter("x".into())),
        );
        assert!(err.is_missing_parameter());
        assert!(matches!(err.root_cause(), TemplateError::MissingParameter(n) if n == "x"));
    }
}
