use crate::builder::SqlBuilder;
use crate::context::{InListStyle, QueryContext};
use crate::error::{TemplateError, TemplateResult};
use crate::segment::{self, DynamicSql, Segment};
use crate::source::SqlArgSource;
use crate::types::SqlArg;
use crate::value::Value;

use super::{Rule, RuleCall, is_active, non_blank};

/// `@{in, :ids}` / `@{ifIn, condition, :ids}`: expand one collection parameter.
///
/// Elements are bound in source order as `(?, ?, ?)`, or rendered as `[v1, v2]` with
/// [`InListStyle::Literal`]. An empty or null collection becomes `(NULL)`. Declared metadata of a
/// typed parameter ([`Value::Arg`]) is copied onto every element.
#[derive(Debug, Clone, Copy, Default)]
pub struct InRule {
    pub conditional: bool,
}

impl Rule for InRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let body = if self.conditional {
            if !is_active(call, source)? {
                return Ok(());
            }
            call.body
        } else {
            call.tail
        };
        let Some(body) = non_blank(body) else {
            return Ok(());
        };

        let program = DynamicSql::parse(body.trim())?;
        let params = program
            .segments()
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    Segment::Positional(_) | Segment::Named { .. } | Segment::Value { .. }
                )
            })
            .count();
        if params != 1 {
            return Err(TemplateError::config(format!(
                "in rule expects exactly 1 parameter, found {params}"
            )));
        }

        for seg in program.segments() {
            match seg {
                Segment::Literal(text) => {
                    builder.push(text);
                }
                Segment::Positional(index) => {
                    let value = segment::lookup(source, &format!("arg{index}"), ctx)?;
                    expand(builder, SqlArg::new(value), ctx);
                }
                Segment::Injection(expr) => {
                    let value = segment::lookup(source, expr.trim(), ctx)?;
                    builder.push(&value.to_text());
                }
                Segment::Named { expr, .. } => {
                    let value = segment::lookup(source, expr.trim(), ctx)?;
                    let template = match value {
                        Value::Arg(arg) => *arg,
                        value => SqlArg::new(value),
                    };
                    expand(builder, template.with_name(expr.as_str()), ctx);
                }
                Segment::Value { expr, config, .. } => {
                    let arg = segment::value_arg(expr, config, source, ctx)?;
                    expand(builder, arg, ctx);
                }
                Segment::Rule(rule) => {
                    return Err(TemplateError::config(format!(
                        "in rule cannot contain rule `{}`",
                        rule.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Write the collection held by `template` using its metadata for every element.
fn expand(builder: &mut SqlBuilder, template: SqlArg, ctx: &dyn QueryContext) {
    let items: Vec<Value> = match template.value.plain() {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    };

    match ctx.config().in_list_style {
        InListStyle::Literal => {
            builder.push(&Value::List(items).to_sql_literal());
        }
        InListStyle::Bind => {
            let args = items.into_iter().map(|value| SqlArg {
                value,
                ..template.clone()
            });
            builder.push("(").push_arg_list(args).push(")");
        }
    }
}
