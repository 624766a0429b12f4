//! # dynsql
//!
//! A runtime SQL template compiler.
//!
//! Templates are plain SQL with placeholders. They are parsed once into a [`DynamicSql`]
//! segment program and bound many times against a parameter source, producing SQL with `?`
//! placeholders plus an ordered list of typed arguments ([`BoundSql`]).
//!
//! ## Placeholders
//!
//! | syntax | meaning |
//! |---|---|
//! | `?` | positional parameter (`arg0`, `arg1`, ...) |
//! | `:expr` | named parameter, `expr` may be a property path (`user.name`, `ids[0]`) |
//! | `&expr` | named parameter bound as its raw value |
//! | `${expr}` | text substitution (never bound) |
//! | `#{expr, mode=OUT, jdbcType=INTEGER, typeHandler=json}` | parameter with binding metadata |
//! | `@{rule, activeExpr, body}` | rule invocation (`if`, `and`, `in`, `macro`, ...) |
//!
//! Placeholder syntax inside quoted strings, quoted identifiers and comments is left alone,
//! and `::` casts are not parameters.
//!
//! ## Example
//!
//! ```ignore
//! use dynsql::{DynamicSql, RegistryContext, params};
//!
//! let program = DynamicSql::parse(
//!     "select * from users where 1=1 @{and, AND age >= :age} and id in @{in, :ids}",
//! )?;
//! let bound = program.bind(
//!     &params! { "age" => 18, "ids" => vec![1, 2, 3] },
//!     &RegistryContext::new(),
//! )?;
//!
//! assert_eq!(
//!     bound.sql(),
//!     "select * from users where 1=1 AND age >= ? and id in (?, ?, ?)",
//! );
//! let rows = client.query(&bound.to_numbered_sql(), &bound.params_ref()).await?;
//! ```

pub mod builder;
pub mod cache;
pub mod context;
pub mod error;
pub mod expr;
pub mod parser;
pub mod registry;
pub mod rule;
pub mod scanner;
pub mod segment;
pub mod source;
pub mod types;
pub mod value;

pub use builder::{BoundSql, BuilderMark, ResultArg, ResultKind, SqlBuilder};
pub use cache::TemplateCache;
pub use context::{InListStyle, MissingPolicy, QueryContext, RegistryContext, TemplateConfig};
pub use error::{TemplateError, TemplateResult};
pub use parser::ArgConfig;
pub use registry::{
    MacroRegistration, MacroRegistry, RuleRegistry, find_default_macro, find_default_rule,
    register_default_macro, register_default_rule,
};
pub use rule::{Rule, RuleCall};
pub use segment::{DynamicSql, RuleInvocation, Segment, SqlModifier};
pub use source::{BeanSource, EmptySource, MergedSource, SqlArgSource, positional};
pub use types::{BuiltinHandler, SqlArg, SqlMode, SqlType, TypeHandler, TypeHandlerRegistry};
pub use value::Value;

#[doc(hidden)]
pub use inventory;

/// Parse a template.
pub fn parse(template: &str) -> TemplateResult<DynamicSql> {
    DynamicSql::parse(template)
}

/// Parse and bind a template with the default context.
pub fn render(template: &str, source: &dyn SqlArgSource) -> TemplateResult<BoundSql> {
    DynamicSql::parse(template)?.bind(source, &RegistryContext::new())
}
