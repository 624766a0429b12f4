//! `key=value` argument configuration shared by `#{...}` placeholders and the `arg` rule.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::QueryContext;
use crate::error::{TemplateError, TemplateResult};
use crate::types::{SqlArg, SqlMode, SqlType};

/// Upper bound on comma separated tokens in a `#{...}` placeholder.
pub const MAX_CONFIG_TOKENS: usize = 10;

const VALUE_ARG_FORMAT: &str = "expected #{expr [,mode=IN|OUT|INOUT|CURSOR] [,jdbcType=INTEGER] \
     [,javaType=name] [,typeHandler=name]}";

/// Binding metadata declared next to a parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgConfig {
    pub mode: Option<SqlMode>,
    pub sql_type: Option<SqlType>,
    pub value_type: Option<String>,
    pub type_handler: Option<String>,
    /// Explicit argument name (`name=...`), used when no expression is given.
    pub name: Option<String>,
    /// Unrecognized keys, kept for collaborators.
    pub extra: BTreeMap<String, String>,
}

impl ArgConfig {
    /// Parse `key=value` tokens. Keys are case-insensitive; blank tokens are ignored.
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> TemplateResult<Self> {
        let mut config = ArgConfig::default();
        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let Some((key, value)) = token.split_once('=') else {
                return Err(TemplateError::config(format!(
                    "argument option `{token}` is not key=value"
                )));
            };
            let (key, value) = (key.trim(), value.trim());
            match key.to_ascii_lowercase().as_str() {
                "mode" => config.mode = Some(value.parse()?),
                "jdbctype" | "sqltype" => config.sql_type = Some(value.parse()?),
                "javatype" | "valuetype" => config.value_type = Some(value.to_string()),
                "typehandler" => config.type_handler = Some(value.to_string()),
                "name" => config.name = Some(value.to_string()),
                _ => {
                    config.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(config)
    }

    /// Parse a comma separated `key=value` list.
    pub fn parse(text: &str) -> TemplateResult<Self> {
        Self::from_tokens(text.split(','))
    }

    /// Copy the declared metadata onto `arg`, resolving the type handler through `ctx`.
    pub fn apply(&self, arg: &mut SqlArg, ctx: &dyn QueryContext) -> TemplateResult<()> {
        if let Some(mode) = self.mode {
            arg.mode = mode;
        }
        if let Some(sql_type) = self.sql_type {
            arg.sql_type = Some(sql_type);
        }
        if let Some(value_type) = &self.value_type {
            arg.value_type = Some(value_type.clone());
        }
        if let Some(handler) = &self.type_handler {
            let found = ctx
                .find_type_handler(handler)
                .ok_or_else(|| TemplateError::config(format!("unknown type handler: {handler}")))?;
            arg.handler = Some(found);
        } else if arg.handler.is_none() {
            if let Some(sql_type) = arg.sql_type {
                arg.handler = ctx.find_type_handler_for(sql_type);
            }
        }
        Ok(())
    }

    /// Mode, defaulting to `IN`.
    pub fn mode_or_default(&self) -> SqlMode {
        self.mode.unwrap_or_default()
    }
}

impl fmt::Display for ArgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(mode) = self.mode {
            parts.push(format!("mode={mode}"));
        }
        if let Some(sql_type) = self.sql_type {
            parts.push(format!("jdbcType={sql_type:?}"));
        }
        if let Some(value_type) = &self.value_type {
            parts.push(format!("javaType={value_type}"));
        }
        if let Some(handler) = &self.type_handler {
            parts.push(format!("typeHandler={handler}"));
        }
        for (k, v) in &self.extra {
            parts.push(format!("{k}={v}"));
        }
        f.write_str(&parts.join(", "))
    }
}

/// Split `#{...}` content into its expression and configuration.
///
/// When the first token already contains `=` the placeholder has no expression and is
/// identified by its `name=` option instead.
pub fn parse_value_arg(content: &str) -> TemplateResult<(String, ArgConfig)> {
    let tokens: Vec<&str> = content.split(',').collect();
    if tokens.len() > MAX_CONFIG_TOKENS {
        return Err(TemplateError::config(format!(
            "too many options ({} > {MAX_CONFIG_TOKENS}), {VALUE_ARG_FORMAT}",
            tokens.len()
        )));
    }

    let (expr, options) = match tokens.split_first() {
        Some((first, rest)) if !first.contains('=') => (first.trim().to_string(), rest),
        _ => (String::new(), tokens.as_slice()),
    };
    let config = ArgConfig::from_tokens(options.iter().copied())
        .map_err(|e| TemplateError::config(format!("{e}, {VALUE_ARG_FORMAT}")))?;

    if expr.is_empty() && config.name.is_none() && config.mode_or_default().is_input() {
        return Err(TemplateError::config(format!(
            "input argument needs an expression or name=, {VALUE_ARG_FORMAT}"
        )));
    }
    Ok((expr, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expression_and_options() {
        let (expr, config) =
            parse_value_arg("user.id, mode=inout, jdbcType=INTEGER, typeHandler=integer").unwrap();
        assert_eq!(expr, "user.id");
        assert_eq!(config.mode, Some(SqlMode::InOut));
        assert_eq!(config.sql_type, Some(SqlType::Integer));
        assert_eq!(config.type_handler.as_deref(), Some("integer"));
    }

    #[test]
    fn options_only_uses_name() {
        let (expr, config) = parse_value_arg("name=total, mode=OUT, jdbcType=bigint").unwrap();
        assert_eq!(expr, "");
        assert_eq!(config.name.as_deref(), Some("total"));
        assert_eq!(config.mode, Some(SqlMode::Out));
    }

    #[test]
    fn unknown_keys_are_kept() {
        let config = ArgConfig::parse("scale=2, MODE=out").unwrap();
        assert_eq!(config.extra.get("scale").map(String::as_str), Some("2"));
        assert_eq!(config.mode, Some(SqlMode::Out));
    }

    #[test]
    fn rejects_malformed_options() {
        assert!(parse_value_arg("a, mode").is_err());
        assert!(parse_value_arg("a, mode=sideways").is_err());
        assert!(parse_value_arg("a, jdbcType=nope").is_err());
        assert!(parse_value_arg("a,b=1,c=1,d=1,e=1,f=1,g=1,h=1,i=1,j=1,k=1").is_err());
        assert!(parse_value_arg("mode=IN").is_err());
    }
}
