use crate::builder::SqlBuilder;
use crate::context::QueryContext;
use crate::error::TemplateResult;
use crate::segment::DynamicSql;
use crate::source::SqlArgSource;

use super::{Rule, RuleCall, is_active, non_blank};

/// `@{if, condition, body}`: bind `body` as a template when `condition` holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfRule;

impl Rule for IfRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let Some(body) = non_blank(call.body) else {
            return Ok(());
        };
        if !is_active(call, source)? {
            return Ok(());
        }
        DynamicSql::parse(body)?.build_query(source, ctx, builder)
    }
}

/// `@{text, raw}` / `@{ifText, condition, raw}`: write text without parsing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRule {
    pub conditional: bool,
}

impl Rule for TextRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        _ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let text = if self.conditional {
            if !is_active(call, source)? {
                return Ok(());
            }
            call.body
        } else {
            call.tail
        };
        if let Some(text) = text {
            builder.push(text);
        }
        Ok(())
    }
}
