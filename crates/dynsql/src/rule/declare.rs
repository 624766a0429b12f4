use crate::builder::{ResultArg, ResultKind, SqlBuilder};
use crate::context::QueryContext;
use crate::error::{TemplateError, TemplateResult};
use crate::parser::parse_value_arg;
use crate::segment;
use crate::source::SqlArgSource;

use super::{Rule, RuleCall, non_blank};

/// `@{arg, condition, expr [, mode=..., jdbcType=..., typeHandler=...]}`.
///
/// Binds like `#{expr, ...}` when the condition holds (a blank condition always holds).
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgRule;

impl Rule for ArgRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        if let Some(condition) = non_blank(call.active_expr) {
            if !crate::expr::eval_condition(condition.trim(), source)? {
                return Ok(());
            }
        }
        let Some(body) = non_blank(call.body) else {
            return Err(TemplateError::config("arg rule needs an argument expression"));
        };

        let (expr, config) = parse_value_arg(body)?;
        let arg = segment::value_arg(&expr, &config, source, ctx)?;
        builder.push_arg(arg);
        Ok(())
    }
}

/// `@{resultSet, name=users, javaType=User}`, `@{resultUpdate, affected}`, `@{default, rest}`.
///
/// Declares how an execution result is surfaced; writes no SQL.
#[derive(Debug, Clone, Copy)]
pub struct ResultRule {
    kind: ResultKind,
}

impl ResultRule {
    pub fn new(kind: ResultKind) -> Self {
        Self { kind }
    }
}

impl Rule for ResultRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        _source: &dyn SqlArgSource,
        _ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let mut result = ResultArg::new(self.kind);
        for token in call.tail.unwrap_or_default().split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => match key.trim().to_ascii_lowercase().as_str() {
                    "name" => result.name = Some(value.trim().to_string()),
                    "javatype" | "valuetype" | "type" => {
                        result.value_type = Some(value.trim().to_string());
                    }
                    other => {
                        return Err(TemplateError::config(format!(
                            "unknown result option `{other}`"
                        )));
                    }
                },
                None if result.name.is_none() => result.name = Some(token.to_string()),
                None => {
                    return Err(TemplateError::config(format!(
                        "result declaration has more than one name: {token}"
                    )));
                }
            }
        }
        builder.add_result(result);
        Ok(())
    }
}
