//! Rule and macro registries.
//!
//! Each [`RegistryContext`](crate::RegistryContext) owns local registries and falls back to the
//! process-wide defaults kept here. Registration is expected during start-up; later
//! registrations replace earlier ones under the same name.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::TemplateResult;
use crate::rule::{self, Rule};
use crate::segment::DynamicSql;

/// Case-insensitive name → rule map.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<dyn Rule>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in rule.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        rule::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a rule.
    pub fn register(&mut self, name: &str, rule: Arc<dyn Rule>) {
        self.rules.insert(name.trim().to_ascii_lowercase(), rule);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.rules.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Name → pre-parsed template map.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<DynamicSql>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a macro template.
    pub fn register(&mut self, name: &str, template: &str) -> TemplateResult<()> {
        let parsed = DynamicSql::parse(template)?;
        self.register_parsed(name, Arc::new(parsed));
        Ok(())
    }

    pub fn register_parsed(&mut self, name: &str, template: Arc<DynamicSql>) {
        self.macros.insert(name.trim().to_string(), template);
    }

    pub fn find(&self, name: &str) -> Option<Arc<DynamicSql>> {
        self.macros.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.macros.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Static macro registration entry, collected with `inventory`.
///
/// Use the [`register_macro!`](crate::register_macro) macro to submit one.
pub struct MacroRegistration {
    pub name: &'static str,
    pub template: &'static str,
}

inventory::collect!(MacroRegistration);

/// Register a macro in the process-wide default registry at link time.
///
/// ```ignore
/// dynsql::register_macro!("user_columns", "id, login_name, email");
/// ```
#[macro_export]
macro_rules! register_macro {
    ($name:expr, $template:expr $(,)?) => {
        $crate::inventory::submit! {
            $crate::MacroRegistration {
                name: $name,
                template: $template,
            }
        }
    };
}

fn default_rules() -> &'static RwLock<RuleRegistry> {
    static RULES: OnceLock<RwLock<RuleRegistry>> = OnceLock::new();
    RULES.get_or_init(|| RwLock::new(RuleRegistry::with_builtins()))
}

fn default_macros() -> &'static RwLock<MacroRegistry> {
    static MACROS: OnceLock<RwLock<MacroRegistry>> = OnceLock::new();
    MACROS.get_or_init(|| {
        let mut registry = MacroRegistry::new();
        for reg in inventory::iter::<MacroRegistration> {
            if let Err(e) = registry.register(reg.name, reg.template) {
                tracing::warn!(
                    target: "dynsql.registry",
                    name = reg.name,
                    error = %e,
                    "skipping unparsable registered macro"
                );
            }
        }
        RwLock::new(registry)
    })
}

/// Register a rule in the process-wide default registry.
pub fn register_default_rule(name: &str, rule: Arc<dyn Rule>) {
    default_rules()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, rule);
}

pub fn find_default_rule(name: &str) -> Option<Arc<dyn Rule>> {
    default_rules()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .find(name)
}

/// Parse and register a macro in the process-wide default registry.
pub fn register_default_macro(name: &str, template: &str) -> TemplateResult<()> {
    let parsed = Arc::new(DynamicSql::parse(template)?);
    default_macros()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_parsed(name, parsed);
    Ok(())
}

pub fn find_default_macro(name: &str) -> Option<Arc<DynamicSql>> {
    default_macros()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .find(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rule_names_are_case_insensitive() {
        let registry = RuleRegistry::with_builtins();
        for name in [
            "if", "ifAnd", "ifOr", "ifIn", "ifText", "ifMacro", "ifSet", "and", "or", "set",
            "text", "in", "macro", "md5", "uuid32", "uuid36", "arg", "resultSet",
            "resultUpdate", "default",
        ] {
            assert!(registry.contains(name), "missing rule {name}");
            assert!(registry.contains(&name.to_ascii_uppercase()));
        }
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = MacroRegistry::new();
        registry.register("m", "a").unwrap();
        registry.register("m", "b").unwrap();
        assert_eq!(registry.find("m").unwrap().to_template(), "b");
        assert_eq!(registry.names(), vec!["m".to_string()]);
    }

    #[test]
    fn invalid_macro_is_rejected() {
        let mut registry = MacroRegistry::new();
        assert!(registry.register("bad", "@{if").is_err());
        assert!(registry.find("bad").is_none());
    }

    #[test]
    fn default_macros_are_shared() {
        register_default_macro("registry_test_cols", "id, name").unwrap();
        assert!(find_default_macro("registry_test_cols").is_some());
    }
}
