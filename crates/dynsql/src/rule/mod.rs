//! Rules: named handlers behind `@{name, ...}` placeholders.
//!
//! A rule receives the split placeholder text, the parameter source, the query context and the
//! builder of the running bind. It may write SQL and arguments, re-enter the parser on its body
//! or declare results. Rules are stateless and shared through the registries.
//!
//! | rule | writes |
//! |---|---|
//! | `if`, `ifText`, `ifMacro` | body (template / raw text / macro) when the condition holds |
//! | `and`, `or`, `set` (+ `ifAnd`, `ifOr`, `ifSet`) | body joined with `where` / connector / `set` |
//! | `in`, `ifIn` | `(?, ?, ...)` for one collection parameter |
//! | `text`, `macro` | raw text / a registered macro |
//! | `md5`, `uuid32`, `uuid36` | one generated bound value |
//! | `arg` | one bound argument with `#{}`-style options |
//! | `resultSet`, `resultUpdate`, `default` | a result declaration, no SQL |

mod compose;
mod condition;
mod declare;
mod generate;
mod in_list;
mod macros;


use std::fmt;
use std::sync::Arc;

use crate::builder::{ResultKind, SqlBuilder};
use crate::context::QueryContext;
use crate::error::TemplateResult;
use crate::expr;
use crate::registry::RuleRegistry;
use crate::segment::{DynamicSql, Segment};
use crate::source::{SqlArgSource, resolve};

pub use compose::{Join, JoinRule};
pub use condition::{IfRule, TextRule};
pub use declare::{ArgRule, ResultRule};
pub use generate::{Md5Rule, UuidRule};
pub use in_list::InRule;
pub use macros::MacroRule;

/// The split text of one `@{...}` placeholder.
///
/// For `@{name, a, b, c}`: `active_expr` is `" a"`, `body` is `" b, c"` and `tail` is
/// `" a, b, c"`. Whitespace is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleCall<'a> {
    pub name: &'a str,
    pub active_expr: Option<&'a str>,
    pub body: Option<&'a str>,
    pub tail: Option<&'a str>,
}

/// A named placeholder handler.
pub trait Rule: fmt::Debug + Send + Sync {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()>;
}

/// Register every built-in rule (with aliases) into `registry`.
pub fn register_builtins(registry: &mut RuleRegistry) {
    let mut add = |names: &[&str], rule: Arc<dyn Rule>| {
        for name in names {
            registry.register(name, rule.clone());
        }
    };
    add(&["if"], Arc::new(IfRule));
    add(&["text"], Arc::new(TextRule { conditional: false }));
    add(&["ifText"], Arc::new(TextRule { conditional: true }));
    add(&["and"], Arc::new(JoinRule::new(Join::And, false)));
    add(&["ifAnd"], Arc::new(JoinRule::new(Join::And, true)));
    add(&["or"], Arc::new(JoinRule::new(Join::Or, false)));
    add(&["ifOr"], Arc::new(JoinRule::new(Join::Or, true)));
    add(&["set"], Arc::new(JoinRule::new(Join::Set, false)));
    add(&["ifSet"], Arc::new(JoinRule::new(Join::Set, true)));
    add(&["in"], Arc::new(InRule { conditional: false }));
    add(&["ifIn"], Arc::new(InRule { conditional: true }));
    add(&["macro"], Arc::new(MacroRule { conditional: false }));
    add(&["ifMacro"], Arc::new(MacroRule { conditional: true }));
    add(&["md5"], Arc::new(Md5Rule));
    add(&["uuid32"], Arc::new(UuidRule { hyphenated: false }));
    add(&["uuid36"], Arc::new(UuidRule { hyphenated: true }));
    add(&["arg"], Arc::new(ArgRule));
    add(&["resultSet", "result"], Arc::new(ResultRule::new(ResultKind::ResultSet)));
    add(&["resultUpdate"], Arc::new(ResultRule::new(ResultKind::UpdateCount)));
    add(&["default", "defaultResult"], Arc::new(ResultRule::new(ResultKind::Default)));
}

/// Text of an optional part, `None` when absent or blank.
pub(crate) fn non_blank(part: Option<&str>) -> Option<&str> {
    part.filter(|p| !p.trim().is_empty())
}

/// Evaluate a conditional rule's activation.
///
/// With an activation expression its truthiness decides. Without one, the rule is active when
/// every parameter its body reads is present and not null.
pub(crate) fn is_active(call: &RuleCall<'_>, source: &dyn SqlArgSource) -> TemplateResult<bool> {
    let active = match non_blank(call.active_expr) {
        Some(text) => expr::eval_condition(text.trim(), source)?,
        None => match non_blank(call.body) {
            Some(body) => parameters_present(&DynamicSql::parse(body)?, source)?,
            None => false,
        },
    };
    if !active {
        tracing::trace!(target: "dynsql.bind", rule = call.name, "condition is false, skipping");
    }
    Ok(active)
}

/// Whether every named parameter of `program` resolves to a non-null value.
///
/// Positional placeholders are not checked. Nested composition rules are checked too; nested
/// conditional rules (`if...`) decide for themselves.
pub(crate) fn parameters_present(
    program: &DynamicSql,
    source: &dyn SqlArgSource,
) -> TemplateResult<bool> {
    segments_present(program.segments(), source)
}

fn segments_present(segments: &[Segment], source: &dyn SqlArgSource) -> TemplateResult<bool> {
    for segment in segments {
        let present = match segment {
            Segment::Literal(_) | Segment::Positional(_) => true,
            Segment::Named { expr, .. } | Segment::Injection(expr) => value_present(source, expr)?,
            Segment::Value { expr, config, .. } => {
                let key = if expr.is_empty() {
                    config.name.as_deref().unwrap_or_default()
                } else {
                    expr.as_str()
                };
                key.is_empty()
                    || !config.mode_or_default().is_input()
                    || value_present(source, key)?
            }
            Segment::Rule(rule) => {
                if rule.name.to_ascii_lowercase().starts_with("if") {
                    true
                } else {
                    match rule.tail.as_deref().map(DynamicSql::parse) {
                        Some(Ok(nested)) => segments_present(nested.segments(), source)?,
                        _ => true,
                    }
                }
            }
        };
        if !present {
            return Ok(false);
        }
    }
    Ok(true)
}

fn value_present(source: &dyn SqlArgSource, expr: &str) -> TemplateResult<bool> {
    Ok(resolve(source, expr.trim())?.is_some_and(|v| !v.is_null()))
}
