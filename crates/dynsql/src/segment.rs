//! Segment program: the parsed, immutable form of a template.
//!
//! A [`DynamicSql`] is produced once per distinct template text and may be shared between
//! threads. Binding walks the segments in order and writes into a caller-owned
//! [`SqlBuilder`]; nothing in the program is mutated.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::BitOr;

use crate::builder::{BoundSql, SqlBuilder};
use crate::context::{MissingPolicy, QueryContext};
use crate::error::{TemplateError, TemplateResult};
use crate::parser::{self, ArgConfig};
use crate::rule::RuleCall;
use crate::source::{SqlArgSource, resolve, root_name};
use crate::types::SqlArg;
use crate::value::Value;

/// One unit of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim.
    Literal(String),
    /// `?`, bound to `arg{index}` of the source.
    Positional(usize),
    /// `:expr` (typed) or `&expr` (raw).
    Named { expr: String, raw: bool },
    /// `${expr}`: textual substitution, never bound.
    Injection(String),
    /// `#{expr, key=value, ...}`.
    Value {
        content: String,
        expr: String,
        config: ArgConfig,
    },
    /// `@{rule, activeExpr, body}`.
    Rule(RuleInvocation),
}

/// A parsed `@{...}` placeholder.
///
/// `tail` is everything after the rule name; `active_expr` and `body` split it at the next
/// top-level comma. Conditional rules read `active_expr`/`body`, composition rules the `tail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInvocation {
    pub content: String,
    pub name: String,
    pub active_expr: Option<String>,
    pub body: Option<String>,
    pub tail: Option<String>,
}

impl RuleInvocation {
    pub fn call(&self) -> RuleCall<'_> {
        RuleCall {
            name: &self.name,
            active_expr: self.active_expr.as_deref(),
            body: self.body.as_deref(),
            tail: self.tail.as_deref(),
        }
    }
}

/// Placeholder families present in a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SqlModifier(u8);

impl SqlModifier {
    pub const NONE: SqlModifier = SqlModifier(0);
    pub const POSITION: SqlModifier = SqlModifier(1);
    pub const NAMED: SqlModifier = SqlModifier(1 << 1);
    pub const RULE: SqlModifier = SqlModifier(1 << 2);
    pub const INJECTION: SqlModifier = SqlModifier(1 << 3);

    pub fn contains(self, other: SqlModifier) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SqlModifier) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SqlModifier {
    type Output = SqlModifier;

    fn bitor(self, rhs: SqlModifier) -> SqlModifier {
        SqlModifier(self.0 | rhs.0)
    }
}

impl fmt::Display for SqlModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (SqlModifier::POSITION, "position"),
            (SqlModifier::NAMED, "named"),
            (SqlModifier::RULE, "rule"),
            (SqlModifier::INJECTION, "injection"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSql {
    segments: Vec<Segment>,
    modifiers: SqlModifier,
}

impl DynamicSql {
    /// Parse template text.
    pub fn parse(template: &str) -> TemplateResult<Self> {
        let segments = parser::parse_segments(template)?;
        let modifiers = modifiers_of(&segments);
        tracing::trace!(
            target: "dynsql.parse",
            segment_count = segments.len(),
            modifiers = %modifiers,
            "parsed template"
        );
        Ok(Self {
            segments,
            modifiers,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn modifiers(&self) -> SqlModifier {
        self.modifiers
    }

    /// Whether the template uses `${...}` text substitution anywhere.
    pub fn has_injection(&self) -> bool {
        self.modifiers.contains(SqlModifier::INJECTION)
    }

    /// Reconstruct the template text.
    pub fn to_template(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Positional(_) => out.push('?'),
                Segment::Named { expr, raw } => {
                    out.push(if *raw { '&' } else { ':' });
                    out.push_str(expr);
                }
                Segment::Injection(expr) => {
                    out.push_str("${");
                    out.push_str(expr);
                    out.push('}');
                }
                Segment::Value { content, .. } => {
                    out.push_str("#{");
                    out.push_str(content);
                    out.push('}');
                }
                Segment::Rule(rule) => {
                    out.push_str("@{");
                    out.push_str(&rule.content);
                    out.push('}');
                }
            }
        }
        out
    }

    /// `(expr, raw)` of each top-level `:expr` / `&expr`.
    pub fn named_params(&self) -> Vec<(&str, bool)> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Named { expr, raw } => Some((expr.as_str(), *raw)),
                _ => None,
            })
            .collect()
    }

    pub fn rule_invocations(&self) -> Vec<&RuleInvocation> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    /// Trimmed expressions of top-level `${...}` placeholders.
    pub fn injections(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Injection(expr) => Some(expr.trim()),
                _ => None,
            })
            .collect()
    }

    pub fn positional_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Positional(_)))
            .count()
    }

    /// Parameter names the template reads, including those inside statically parseable rule
    /// bodies. Positional placeholders appear as `arg0, arg1, ...`.
    pub fn referenced_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        collect_names(&self.segments, &mut names);
        names.into_iter().collect()
    }

    /// Bind into an existing builder. Rules use this to splice nested programs.
    pub fn build_query(
        &self,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    builder.push(text);
                }
                Segment::Positional(index) => {
                    let name = format!("arg{index}");
                    let value = lookup(source, &name, ctx)?;
                    builder.push_arg(SqlArg::named(name, value));
                }
                Segment::Named { expr, raw } => {
                    let value = lookup(source, expr, ctx)?;
                    let arg = if *raw {
                        SqlArg::named(expr.as_str(), value.plain().clone())
                    } else {
                        typed_arg(expr, value, ctx)
                    };
                    builder.push_arg(arg);
                }
                Segment::Injection(expr) => {
                    let value = lookup(source, expr.trim(), ctx)?;
                    builder.push(&value.to_text());
                }
                Segment::Value { expr, config, .. } => {
                    builder.push_arg(value_arg(expr, config, source, ctx)?);
                }
                Segment::Rule(invocation) => {
                    bind_rule(invocation, source, ctx, builder)?;
                }
            }
        }
        Ok(())
    }

    /// Bind into a fresh builder.
    pub fn bind(&self, source: &dyn SqlArgSource, ctx: &dyn QueryContext) -> TemplateResult<BoundSql> {
        let mut builder = SqlBuilder::new();
        self.build_query(source, ctx, &mut builder)?;
        let bound = builder.into_bound();
        tracing::debug!(
            target: "dynsql.bind",
            param_count = bound.args().len(),
            sql = %ctx.config().log_sql(bound.sql()),
            "bound template"
        );
        Ok(bound)
    }
}

impl fmt::Display for DynamicSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_template())
    }
}

impl std::str::FromStr for DynamicSql {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DynamicSql::parse(s)
    }
}

fn modifiers_of(segments: &[Segment]) -> SqlModifier {
    let mut modifiers = SqlModifier::NONE;
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Positional(_) => modifiers.insert(SqlModifier::POSITION),
            Segment::Named { .. } | Segment::Value { .. } => modifiers.insert(SqlModifier::NAMED),
            Segment::Injection(_) => modifiers.insert(SqlModifier::INJECTION),
            Segment::Rule(rule) => {
                modifiers.insert(SqlModifier::RULE);
                if let Some(nested) = rule_tail_segments(rule) {
                    if modifiers_of(&nested).contains(SqlModifier::INJECTION) {
                        modifiers.insert(SqlModifier::INJECTION);
                    }
                }
            }
        }
    }
    modifiers
}

/// Best-effort parse of a rule tail; tails that are not templates (expressions, config) yield
/// `None`.
fn rule_tail_segments(rule: &RuleInvocation) -> Option<Vec<Segment>> {
    rule.tail
        .as_deref()
        .and_then(|tail| parser::parse_segments(tail).ok())
}

fn collect_names(segments: &[Segment], names: &mut BTreeSet<String>) {
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Positional(index) => {
                names.insert(format!("arg{index}"));
            }
            Segment::Named { expr, .. } | Segment::Injection(expr) => {
                if let Ok(name) = root_name(expr) {
                    names.insert(name);
                }
            }
            Segment::Value { expr, config, .. } => {
                let key = if expr.is_empty() {
                    config.name.as_deref().unwrap_or_default()
                } else {
                    expr.as_str()
                };
                if let Ok(name) = root_name(key) {
                    names.insert(name);
                }
            }
            Segment::Rule(rule) => {
                if let Some(nested) = rule_tail_segments(rule) {
                    collect_names(&nested, names);
                }
            }
        }
    }
}

/// Resolve `expr`, applying the missing parameter policy.
pub(crate) fn lookup(source: &dyn SqlArgSource, expr: &str, ctx: &dyn QueryContext) -> TemplateResult<Value> {
    match resolve(source, expr)? {
        Some(value) => Ok(value),
        None => match ctx.config().missing_parameter {
            MissingPolicy::Error => Err(TemplateError::MissingParameter(expr.to_string())),
            MissingPolicy::BindNull => Ok(Value::Null),
        },
    }
}

/// A `:expr` argument: a [`Value::Arg`] keeps its declared metadata.
fn typed_arg(expr: &str, value: Value, ctx: &dyn QueryContext) -> SqlArg {
    match value {
        Value::Arg(arg) => {
            let mut arg = *arg;
            if arg.name.is_none() {
                arg.name = Some(expr.to_string());
            }
            if arg.handler.is_none() {
                arg.handler = arg.sql_type.and_then(|t| ctx.find_type_handler_for(t));
            }
            arg
        }
        value => SqlArg::named(expr, value),
    }
}

/// A `#{...}` argument (also used by the `arg` rule).
pub(crate) fn value_arg(
    expr: &str,
    config: &ArgConfig,
    source: &dyn SqlArgSource,
    ctx: &dyn QueryContext,
) -> TemplateResult<SqlArg> {
    let key = if expr.is_empty() {
        config.name.as_deref().unwrap_or_default()
    } else {
        expr
    };
    let mode = config.mode_or_default();

    let value = if key.is_empty() {
        Value::Null
    } else if mode.is_input() {
        lookup(source, key, ctx)?
    } else {
        resolve(source, key)?.unwrap_or(Value::Null)
    };

    let mut arg = match value {
        Value::Arg(arg) => *arg,
        value => SqlArg::new(value),
    };
    if !key.is_empty() {
        arg.name = Some(key.to_string());
    }
    arg.mode = mode;
    config.apply(&mut arg, ctx)?;
    Ok(arg)
}

fn bind_rule(
    invocation: &RuleInvocation,
    source: &dyn SqlArgSource,
    ctx: &dyn QueryContext,
    builder: &mut SqlBuilder,
) -> TemplateResult<()> {
    builder.enter(ctx.config().max_depth)?;
    let result = match ctx.find_rule(&invocation.name) {
        Some(rule) => rule.evaluate(&invocation.call(), source, ctx, builder),
        None => Err(TemplateError::UnknownRule(invocation.name.clone())),
    };
    builder.leave();
    result.map_err(|e| match e {
        TemplateError::RecursionLimit(_) => e,
        other => TemplateError::rule(invocation.name.as_str(), invocation.content.as_str(), other),
    })
}
