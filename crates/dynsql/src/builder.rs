//! Bind-time accumulator and its output.
//!
//! A [`SqlBuilder`] is owned by one bind operation. Segments and rules append SQL text,
//! bound arguments (`?` placeholders) and result declarations to it in order. When binding
//! completes it is turned into an immutable [`BoundSql`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tokio_postgres::types::{ToSql, Type};

use crate::error::{TemplateError, TemplateResult};
use crate::scanner;
use crate::types::SqlArg;
use crate::value::Value;

/// Kind of execution result a [`ResultArg`] declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultKind {
    /// A result set (rows).
    ResultSet,
    /// An update count.
    UpdateCount,
    /// Fallback for results no positional declaration matches.
    Default,
}

impl ResultKind {
    /// Key a collaborator uses for the `index`-th (1-based) result when it has no declared name.
    pub fn raw_key(self, index: usize) -> String {
        match self {
            ResultKind::ResultSet | ResultKind::Default => format!("#result-set-{index}"),
            ResultKind::UpdateCount => format!("#update-count-{index}"),
        }
    }
}

/// Declaration of an execution result the caller wants surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultArg {
    pub name: Option<String>,
    pub kind: ResultKind,
    /// Free-form row/value type name (`javaType=` in templates).
    #[serde(rename = "valueType")]
    pub value_type: Option<String>,
}

impl ResultArg {
    pub fn new(kind: ResultKind) -> Self {
        Self {
            name: None,
            kind,
            value_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }
}

/// A position in a builder that can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderMark {
    sql_len: usize,
    args_len: usize,
    results_len: usize,
}

/// Mutable accumulator for one bind operation.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    sql: String,
    args: Vec<SqlArg>,
    result_args: Vec<ResultArg>,
    depth: usize,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a `?` placeholder bound to `arg`.
    pub fn push_arg(&mut self, arg: SqlArg) -> &mut Self {
        self.sql.push('?');
        self.args.push(arg);
        self
    }

    /// Append a `?` placeholder bound to a plain value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.push_arg(SqlArg::new(value))
    }

    /// Append `?, ?, ...` for each argument.
    ///
    /// If `args` is empty this appends `NULL`, so `IN (NULL)` stays valid SQL and matches no row.
    pub fn push_arg_list(&mut self, args: impl IntoIterator<Item = SqlArg>) -> &mut Self {
        let mut iter = args.into_iter();
        let Some(first) = iter.next() else {
            return self.push("NULL");
        };

        self.push_arg(first);
        for arg in iter {
            self.push(", ");
            self.push_arg(arg);
        }
        self
    }

    /// Record a result declaration.
    pub fn add_result(&mut self, result: ResultArg) -> &mut Self {
        self.result_args.push(result);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    pub fn result_args(&self) -> &[ResultArg] {
        &self.result_args
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.args.is_empty() && self.result_args.is_empty()
    }

    /// Remember the current position.
    pub fn mark(&self) -> BuilderMark {
        BuilderMark {
            sql_len: self.sql.len(),
            args_len: self.args.len(),
            results_len: self.result_args.len(),
        }
    }

    /// Discard everything written since `mark`.
    pub fn rollback(&mut self, mark: BuilderMark) {
        self.sql.truncate(mark.sql_len);
        self.args.truncate(mark.args_len);
        self.result_args.truncate(mark.results_len);
    }

    /// Arguments bound since `mark`.
    pub fn args_since(&self, mark: BuilderMark) -> usize {
        self.args.len().saturating_sub(mark.args_len)
    }

    /// Enter one level of nested rule expansion.
    pub(crate) fn enter(&mut self, max_depth: usize) -> TemplateResult<()> {
        if self.depth >= max_depth {
            return Err(TemplateError::RecursionLimit(max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn into_bound(self) -> BoundSql {
        BoundSql {
            sql: self.sql,
            args: self.args,
            result_args: self.result_args,
        }
    }
}

/// A fully bound statement: SQL with `?` placeholders, ordered arguments and result declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundSql {
    sql: String,
    args: Vec<SqlArg>,
    #[serde(rename = "resultArgs")]
    result_args: Vec<ResultArg>,
}

impl BoundSql {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    pub fn result_args(&self) -> &[ResultArg] {
        &self.result_args
    }

    /// Plain argument values in placeholder order.
    pub fn values(&self) -> Vec<&Value> {
        self.args.iter().map(|a| a.value.plain()).collect()
    }

    /// SQL with `?` rewritten to PostgreSQL `$1, $2, ...`.
    pub fn to_numbered_sql(&self) -> String {
        scanner::number_placeholders(&self.sql)
    }

    /// Parameters for tokio-postgres, type handlers applied on encode.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
    }

    /// Declared parameter types for `prepare_typed`; undeclared types are left for the server
    /// to infer (`Type::UNKNOWN`).
    pub fn param_types(&self) -> Vec<Type> {
        self.args
            .iter()
            .map(|a| a.sql_type.and_then(|t| t.pg_type()).unwrap_or(Type::UNKNOWN))
            .collect()
    }

    /// Arguments returning values (`OUT`, `INOUT`, `CURSOR`).
    pub fn output_args(&self) -> impl Iterator<Item = &SqlArg> {
        self.args.iter().filter(|a| a.mode.is_output())
    }

    /// Name for the `index`-th (1-based) execution result of `kind`.
    ///
    /// The declaration at the same position is used when its kind matches; otherwise the
    /// `default` declaration (if any) applies, falling back to [`ResultKind::raw_key`].
    pub fn result_name(&self, index: usize, kind: ResultKind) -> String {
        let declared = index
            .checked_sub(1)
            .and_then(|i| self.result_args.get(i))
            .filter(|r| r.kind == kind)
            .or_else(|| {
                self.result_args
                    .iter()
                    .find(|r| r.kind == ResultKind::Default)
            });
        declared
            .and_then(|r| r.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .map_or_else(|| kind.raw_key(index), str::to_string)
    }

    /// Name execution results (in order) using the declarations.
    pub fn collect_results<V>(
        &self,
        results: impl IntoIterator<Item = (ResultKind, V)>,
    ) -> BTreeMap<String, V> {
        results
            .into_iter()
            .enumerate()
            .map(|(i, (kind, value))| (self.result_name(i + 1, kind), value))
            .collect()
    }

    /// Keep only declared results and output arguments of a raw result map.
    ///
    /// With no declarations (or a `default` declaration) the map is returned unchanged.
    pub fn filter_results<V>(&self, raw: BTreeMap<String, V>) -> BTreeMap<String, V> {
        if self.result_args.is_empty()
            || self
                .result_args
                .iter()
                .any(|r| r.kind == ResultKind::Default)
        {
            return raw;
        }

        let keep: Vec<&str> = self
            .result_args
            .iter()
            .filter_map(|r| r.name.as_deref())
            .chain(self.output_args().filter_map(|a| a.name.as_deref()))
            .collect();
        raw.into_iter()
            .filter(|(k, _)| keep.contains(&k.as_str()))
            .collect()
    }
}

impl fmt::Display for BoundSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
