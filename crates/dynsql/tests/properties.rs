//! Property-based tests for parsing and binding.

use dynsql::{DynamicSql, Segment, SqlModifier, Value, positional};
use proptest::prelude::*;

/// SQL text without placeholder or quoting syntax.
fn plain_sql_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ =<>,.()*]{0,24}"
}

/// Single-quoted string literal content, possibly holding placeholder syntax.
fn quoted_strategy() -> impl Strategy<Value = String> {
    "[a-z?:#@${} ]{0,12}".prop_map(|s| format!("'{s}'"))
}

fn template_piece() -> impl Strategy<Value = String> {
    prop_oneof![
        plain_sql_strategy(),
        quoted_strategy(),
        Just("?".to_string()),
        "[a-z][a-z0-9_]{0,8}".prop_map(|name| format!(":{name} ")),
        "[a-z][a-z0-9_]{0,8}".prop_map(|name| format!("${{{name}}}")),
        "[a-z][a-z0-9_]{0,8}".prop_map(|name| format!("#{{{name}, jdbcType=INTEGER}}")),
        "[a-z][a-z0-9_]{0,8}".prop_map(|name| format!("@{{and, x = :{name} }}")),
    ]
}

proptest! {
    #[test]
    fn to_template_reproduces_input(pieces in prop::collection::vec(template_piece(), 0..8)) {
        let template = pieces.concat();
        let program = DynamicSql::parse(&template).unwrap();
        prop_assert_eq!(program.to_template(), template);
    }

    #[test]
    fn positional_templates_bind_in_order(
        fragments in prop::collection::vec(plain_sql_strategy(), 1..6),
        values in prop::collection::vec(any::<i64>(), 5),
    ) {
        let template = fragments.join("?");
        let count = fragments.len() - 1;
        let program = DynamicSql::parse(&template).unwrap();
        prop_assert_eq!(program.positional_count(), count);

        let bound = program
            .bind(&positional(values.clone()), &dynsql::RegistryContext::new())
            .unwrap();
        prop_assert_eq!(bound.sql(), template.as_str());
        let expected: Vec<Value> = values.iter().take(count).map(|v| Value::Int(*v)).collect();
        let actual: Vec<Value> = bound.values().into_iter().cloned().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn quoted_text_is_never_a_placeholder(
        prefix in plain_sql_strategy(),
        quoted in quoted_strategy(),
    ) {
        let template = format!("{prefix}{quoted}");
        let program = DynamicSql::parse(&template).unwrap();
        prop_assert!(program.modifiers().is_empty());
        prop_assert!(program
            .segments()
            .iter()
            .all(|s| matches!(s, Segment::Literal(_))));
        prop_assert!(!program.modifiers().contains(SqlModifier::INJECTION));
    }
}
