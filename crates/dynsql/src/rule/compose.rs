use crate::builder::SqlBuilder;
use crate::context::QueryContext;
use crate::error::TemplateResult;
use crate::scanner;
use crate::segment::DynamicSql;
use crate::source::SqlArgSource;

use super::{Rule, RuleCall, is_active, non_blank, parameters_present};

/// Clause a [`JoinRule`] contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// `where ... and ...`
    And,
    /// `where ... or ...`
    Or,
    /// `set ..., ...`
    Set,
}

impl Join {
    /// Keyword opening the clause.
    fn clause(self) -> &'static str {
        match self {
            Join::And | Join::Or => "where",
            Join::Set => "set",
        }
    }

    /// Text joining this fragment to a previous one.
    fn connector(self) -> &'static str {
        match self {
            Join::And => "and",
            Join::Or => "or",
            Join::Set => ",",
        }
    }

    /// Whether the builder already ends where a fragment can follow directly.
    fn open_at_end(self, sql: &str) -> bool {
        let trimmed = sql.trim_end();
        match self {
            Join::And | Join::Or => {
                trimmed.ends_with('(')
                    || ["where", "and", "or", "not"]
                        .iter()
                        .any(|kw| scanner::ends_with_keyword(trimmed, kw))
            }
            Join::Set => trimmed.ends_with(',') || scanner::ends_with_keyword(trimmed, "set"),
        }
    }
}

/// `and`/`or`/`set` and their conditional variants.
///
/// The body is written after `where` (or `set`) when the current statement has none yet, after
/// the connector otherwise, and directly when the SQL already ends with a keyword or separator.
/// A body starting with its own connector (`AND x = :x`) keeps that connector text. `and`/`or`
/// fragments that bind no argument, or that read a missing/null parameter, are dropped.
#[derive(Debug, Clone, Copy)]
pub struct JoinRule {
    join: Join,
    conditional: bool,
}

impl JoinRule {
    pub fn new(join: Join, conditional: bool) -> Self {
        Self { join, conditional }
    }

    /// Split a leading connector off the body; returns `(connector, rest)`.
    fn split_connector<'a>(&self, body: &'a str) -> (Option<&'a str>, &'a str) {
        let trimmed = body.trim_start();
        match self.join {
            Join::And | Join::Or => {
                let kw = self.join.connector();
                if scanner::starts_with_keyword(trimmed, kw) {
                    let (connector, rest) = trimmed.split_at(kw.len());
                    (Some(connector), rest.trim_start())
                } else {
                    (None, body)
                }
            }
            Join::Set => {
                let rest = trimmed.strip_prefix(',').map(str::trim_start);
                let rest = rest.unwrap_or(body);
                let rest = rest.trim_end().strip_suffix(',').unwrap_or(rest);
                (None, rest)
            }
        }
    }
}

impl Rule for JoinRule {
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

        let (connector, rest) = self.split_connector(body);
        let program = DynamicSql::parse(rest)?;
        if !parameters_present(&program, source)? {
            tracing::trace!(
                target: "dynsql.bind",
                rule = call.name,
                "fragment reads a missing parameter, skipping"
            );
            return Ok(());
        }

        let mark = builder.mark();
        let lead = if builder.sql().trim().is_empty() {
            Some(self.join.clause())
        } else if self.join.open_at_end(builder.sql()) {
            None
        } else if scanner::last_statement_contains_keyword(builder.sql(), self.join.clause()) {
            Some(connector.unwrap_or(self.join.connector()))
        } else {
            Some(self.join.clause())
        };
        if let Some(lead) = lead {
            if !builder.sql().is_empty() && !builder.sql().ends_with(char::is_whitespace) {
                builder.push(" ");
            }
            builder.push(lead).push(" ");
        }
        program.build_query(source, ctx, builder)?;

        if self.join != Join::Set && builder.args_since(mark) == 0 {
            builder.rollback(mark);
        }
        Ok(())
    }
}
