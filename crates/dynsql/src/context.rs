//! Query context: the lookup facade rules use for other rules, macros and type handlers.

use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::error::TemplateResult;
use crate::registry::{self, MacroRegistry, RuleRegistry};
use crate::rule::Rule;
use crate::segment::DynamicSql;
use crate::types::{SqlType, TypeHandler, TypeHandlerRegistry};

/// How the `in` rule renders a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InListStyle {
    /// `(?, ?, ?)` with one bound argument per element.
    #[default]
    Bind,
    /// `[v1, v2]` rendered as SQL literals.
    Literal,
}

/// What happens when a placeholder names a parameter the source does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail the bind with [`crate::TemplateError::MissingParameter`].
    #[default]
    Error,
    /// Bind NULL.
    BindNull,
}

/// Binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Rendering of `in` rule collections.
    pub in_list_style: InListStyle,
    /// Handling of absent parameters outside conditional rules.
    pub missing_parameter: MissingPolicy,
    /// Maximum nesting of rule/macro expansion.
    pub max_depth: usize,
    /// Truncate SQL in log output to this many bytes.
    pub max_log_sql_length: Option<usize>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            in_list_style: InListStyle::Bind,
            missing_parameter: MissingPolicy::Error,
            max_depth: 32,
            max_log_sql_length: Some(200),
        }
    }
}

impl TemplateConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `in` rule rendering.
    pub fn in_list_style(mut self, style: InListStyle) -> Self {
        self.in_list_style = style;
        self
    }

    /// Set the missing parameter policy.
    pub fn missing_parameter(mut self, policy: MissingPolicy) -> Self {
        self.missing_parameter = policy;
        self
    }

    /// Set the maximum rule/macro nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the SQL length limit for log output (`None` logs full SQL).
    pub fn max_log_sql_length(mut self, len: Option<usize>) -> Self {
        self.max_log_sql_length = len;
        self
    }

    /// Truncate `sql` for logging.
    pub(crate) fn log_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_log_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end]).into()
            }
            _ => sql.into(),
        }
    }
}

/// Lookups available to rules while binding.
pub trait QueryContext {
    fn find_rule(&self, name: &str) -> Option<Arc<dyn Rule>>;

    fn find_macro(&self, name: &str) -> Option<Arc<DynamicSql>>;

    /// Type handler referenced by name (`typeHandler=...`).
    fn find_type_handler(&self, name: &str) -> Option<Arc<dyn TypeHandler>>;

    /// Default type handler for a declared type.
    fn find_type_handler_for(&self, _sql_type: SqlType) -> Option<Arc<dyn TypeHandler>> {
        None
    }

    fn config(&self) -> &TemplateConfig {
        static DEFAULT: OnceLock<TemplateConfig> = OnceLock::new();
        DEFAULT.get_or_init(TemplateConfig::default)
    }
}

/// Context backed by local registries that fall back to the process-wide defaults.
#[derive(Debug, Clone)]
pub struct RegistryContext {
    rules: RuleRegistry,
    macros: MacroRegistry,
    handlers: TypeHandlerRegistry,
    config: TemplateConfig,
}

impl Default for RegistryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryContext {
    /// Empty local registries, built-in type handlers, default configuration.
    pub fn new() -> Self {
        Self {
            rules: RuleRegistry::new(),
            macros: MacroRegistry::new(),
            handlers: TypeHandlerRegistry::with_builtins(),
            config: TemplateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TemplateConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a rule visible only through this context.
    pub fn with_rule(mut self, name: &str, rule: Arc<dyn Rule>) -> Self {
        self.rules.register(name, rule);
        self
    }

    /// Register a macro visible only through this context.
    pub fn with_macro(mut self, name: &str, template: &str) -> TemplateResult<Self> {
        self.macros.register(name, template)?;
        Ok(self)
    }

    pub fn with_type_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handlers.register(handler);
        self
    }

    pub fn rules_mut(&mut self) -> &mut RuleRegistry {
        &mut self.rules
    }

    pub fn macros_mut(&mut self) -> &mut MacroRegistry {
        &mut self.macros
    }

    pub fn handlers_mut(&mut self) -> &mut TypeHandlerRegistry {
        &mut self.handlers
    }

    pub fn config_mut(&mut self) -> &mut TemplateConfig {
        &mut self.config
    }
}

impl QueryContext for RegistryContext {
    fn find_rule(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.rules
            .find(name)
            .or_else(|| registry::find_default_rule(name))
    }

    fn find_macro(&self, name: &str) -> Option<Arc<DynamicSql>> {
        self.macros
            .find(name)
            .or_else(|| registry::find_default_macro(name))
    }

    fn find_type_handler(&self, name: &str) -> Option<Arc<dyn TypeHandler>> {
        self.handlers.find(name)
    }

    fn find_type_handler_for(&self, sql_type: SqlType) -> Option<Arc<dyn TypeHandler>> {
        self.handlers.find_for_type(sql_type)
    }

    fn config(&self) -> &TemplateConfig {
        &self.config
    }
}
