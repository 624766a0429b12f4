use md5::{Digest, Md5};
use uuid::Uuid;

use crate::builder::SqlBuilder;
use crate::context::QueryContext;
use crate::error::TemplateResult;
use crate::segment::lookup;
use crate::source::SqlArgSource;

use super::{Rule, RuleCall, non_blank};

/// `@{md5, expr}`: bind the hex MD5 of a parameter's text (`expr` or `:expr`), or of a random UUID
/// without `expr`. A missing parameter follows the context's missing parameter policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Rule;

impl Rule for Md5Rule {
    fn evaluate(
        &self,
        call: &RuleCall<'_>,
        source: &dyn SqlArgSource,
        ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let input = match non_blank(call.tail) {
            Some(expr) => {
                let expr = expr.trim();
                let expr = expr.strip_prefix(':').unwrap_or(expr);
                lookup(source, expr, ctx)?.to_text()
            }
            None => Uuid::new_v4().to_string(),
        };
        builder.push_bind(md5_hex(&input));
        Ok(())
    }
}

pub(crate) fn md5_hex(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// `@{uuid32}` / `@{uuid36}`: bind a random UUID, without or with hyphens.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRule {
    pub hyphenated: bool,
}

impl Rule for UuidRule {
    fn evaluate(
        &self,
        _call: &RuleCall<'_>,
        _source: &dyn SqlArgSource,
        _ctx: &dyn QueryContext,
        builder: &mut SqlBuilder,
    ) -> TemplateResult<()> {
        let id = Uuid::new_v4();
        let text = if self.hyphenated {
            id.hyphenated().to_string()
        } else {
            id.simple().to_string()
        };
        builder.push_bind(text);
        Ok(())
    }
}
