use crate::builder::SqlBuilder;
use crate::context::QueryContext;
use crate::error::{TemplateError, TemplateResult};
use crate::source::SqlArgSource;

use super::{Rule, RuleCall, is_active, non_blank};

/// `@{macro, name}` / `@{ifMacro, condition, name}`: splice a registered macro.
///
/// The macro is bound against the same source and builder as the enclosing template.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroRule {
    pub conditional: bool,
}

impl Rule for MacroRule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let name = if self.conditional {
            if !is_active(call, source)? {
                return Ok(());
            }
            call.body
        } else {
            call.tail
        };
        let Some(name) = non_blank(name).map(str::trim) else {
            return Err(TemplateError::config("macro rule needs a macro name"));
        };

        let program = ctx
            .find_macro(name)
            .ok_or_else(|| TemplateError::UnknownMacro(name.to_string()))?;
        program.build_query(source, ctx, builder)
    }
}
