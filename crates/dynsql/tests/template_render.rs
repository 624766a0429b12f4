//! End-to-end binding through the public API.

use std::collections::BTreeMap;

use dynsql::{
    BeanSource, DynamicSql, InListStyle, MergedSource, MissingPolicy, RegistryContext,
    ResultKind, SqlType, TemplateCache, TemplateConfig, TemplateError, Value, params,
};
use serde::Serialize;
use tokio_postgres::types::Type;

#[derive(Serialize)]
struct UserSearch {
    name: Option<String>,
    min_age: Option<i32>,
    ids: Vec<i64>,
}

const SEARCH: &str = "select id, name from users where 1=1 \
                      @{and, AND name = :name} \
                      @{and, AND age >= :min_age} \
                      @{ifAnd, not ids.isEmpty(), AND id in @{in, :ids}} \
                      order by id";

#[test]
fn search_skips_absent_filters() {
    let search = UserSearch {
        name: Some("alice".into()),
        min_age: None,
        ids: vec![1, 2],
    };
    let source = BeanSource::new(&search).unwrap();
    let bound = dynsql::render(SEARCH, &source).unwrap();

    assert_eq!(
        bound.sql(),
        "select id, name from users where 1=1 AND name = ?  AND id in (?, ?) order by id"
    );
    assert_eq!(
        bound.values(),
        vec![&Value::from("alice"), &Value::Int(1), &Value::Int(2)]
    );
}

#[test]
fn search_with_no_filters_keeps_only_static_sql() {
    let search = UserSearch {
        name: None,
        min_age: None,
        ids: vec![],
    };
    let source = BeanSource::new(&search).unwrap();
    let bound = dynsql::render(SEARCH, &source).unwrap();

    assert_eq!(bound.sql(), "select id, name from users where 1=1    order by id");
    assert!(bound.args().is_empty());
}

#[test]
fn where_is_added_once() {
    let source = params! { "a" => 1, "b" => 2 };
    let bound = dynsql::render("select * from t @{and,a = :a} @{and,b = :b}", &source).unwrap();
    assert_eq!(bound.sql(), "select * from t where a = ? and b = ?");
    assert_eq!(bound.values(), vec![&Value::Int(1), &Value::Int(2)]);
}

#[test]
fn numbered_sql_and_declared_types() {
    let bound = dynsql::render(
        "select * from t where a = #{a, jdbcType=INTEGER} and b = :b and c = '?'",
        &params! { "a" => 1, "b" => "x" },
    )
    .unwrap();

    assert_eq!(
        bound.to_numbered_sql(),
        "select * from t where a = $1 and b = $2 and c = '?'"
    );
    assert_eq!(bound.param_types(), vec![Type::INT4, Type::UNKNOWN]);
    assert_eq!(bound.params_ref().len(), 2);
    assert_eq!(bound.args()[0].sql_type, Some(SqlType::Integer));
}

#[test]
fn procedure_results_are_named_and_filtered() {
    let bound = dynsql::render(
        "call report(#{day}, #{name=total, mode=OUT, jdbcType=BIGINT}) \
         @{resultSet, rows}@{resultUpdate, affected}",
        &params! { "day" => "2024-01-01" },
    )
    .unwrap();

    assert_eq!(bound.sql(), "call report(?, ?) ");
    let outputs: Vec<_> = bound.output_args().collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name.as_deref(), Some("total"));

    let mut named = bound.collect_results([
        (ResultKind::ResultSet, 10),
        (ResultKind::UpdateCount, 3),
        (ResultKind::ResultSet, 4),
    ]);
    assert_eq!(named.get("rows"), Some(&10));
    assert_eq!(named.get("affected"), Some(&3));
    assert_eq!(named.get("#result-set-3"), Some(&4));

    named.insert("total".to_string(), 99);
    let filtered = bound.filter_results(named);
    let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["affected", "rows", "total"]);
}

#[test]
fn positional_arguments_with_aliases() {
    let mut source = MergedSource::with_args([Value::Int(5), Value::from("bob")], &["id", ""]);
    assert!(!source.put("arg0", 6));
    assert!(source.put("status", "active"));

    let bound = dynsql::render(
        "select * from users where id = :id and name = ? and status = :status",
        &source,
    )
    .unwrap();
    assert_eq!(
        bound.values(),
        vec![&Value::Int(5), &Value::from("bob"), &Value::from("active")]
    );
}

#[test]
fn missing_parameter_policies() {
    let program = DynamicSql::parse("select * from t where a = :a").unwrap();

    let err = program.bind(&params!(), &RegistryContext::new()).unwrap_err();
    assert!(err.is_missing_parameter());

    let ctx = RegistryContext::new()
        .with_config(TemplateConfig::new().missing_parameter(MissingPolicy::BindNull));
    let bound = program.bind(&params!(), &ctx).unwrap();
    assert_eq!(bound.values(), vec![&Value::Null]);
}

#[test]
fn literal_in_lists() {
    let ctx = RegistryContext::new()
        .with_config(TemplateConfig::new().in_list_style(InListStyle::Literal));
    let bound = DynamicSql::parse("id in @{in, :ids}")
        .unwrap()
        .bind(&params! { "ids" => vec![1, 2] }, &ctx)
        .unwrap();
    assert_eq!(bound.sql(), "id in [1, 2]");
    assert!(bound.args().is_empty());
}

#[test]
fn mutually_recursive_macros_stop_at_depth_limit() {
    let ctx = RegistryContext::new()
        .with_config(TemplateConfig::new().max_depth(4))
        .with_macro("ping", "a @{macro, pong}")
        .unwrap()
        .with_macro("pong", "b @{macro, ping}")
        .unwrap();
    let err = DynamicSql::parse("@{macro, ping}")
        .unwrap()
        .bind(&params!(), &ctx)
        .unwrap_err();
    assert!(matches!(err, TemplateError::RecursionLimit(4)));
}

#[test]
fn rule_errors_name_the_rule() {
    let err = dynsql::render("id in @{in, :a :b}", &params! { "a" => 1, "b" => 2 }).unwrap_err();
    match &err {
        TemplateError::Rule { rule, body, .. } => {
            assert_eq!(rule, "in");
            assert_eq!(body, "in, :a :b");
        }
        other => panic!("expected rule error, got {other:?}"),
    }
    assert!(matches!(err.root_cause(), TemplateError::Config(_)));
}

#[test]
fn cached_program_binds_independently() {
    let cache = TemplateCache::new(8);
    let program = cache
        .get_or_parse("select * from t where 1=1 @{and, AND a = :a}")
        .unwrap();
    let ctx = RegistryContext::new();

    let with = program.bind(&params! { "a" => 1 }, &ctx).unwrap();
    let without = program.bind(&params!(), &ctx).unwrap();
    let again = cache
        .get_or_parse("select * from t where 1=1 @{and, AND a = :a}")
        .unwrap()
        .bind(&params! { "a" => 1 }, &ctx)
        .unwrap();

    assert_eq!(with.sql(), "select * from t where 1=1 AND a = ?");
    assert_eq!(without.sql(), "select * from t where 1=1 ");
    assert_eq!(with, again);
}

#[test]
fn hash_map_sources_work() {
    let mut source = std::collections::HashMap::new();
    source.insert("tags".to_string(), Value::from(vec!["a", "b"]));
    let bound = dynsql::render("select * from t where tag in @{in, :tags}", &source).unwrap();
    assert_eq!(bound.sql(), "select * from t where tag in (?, ?)");

    let json: BTreeMap<String, Value> = [(
        "user".to_string(),
        Value::from(serde_json::json!({ "roles": ["admin"] })),
    )]
    .into_iter()
    .collect();
    let bound = dynsql::render(
        "select 1 @{if, user.roles[0] == 'admin', where admin = true}",
        &json,
    )
    .unwrap();
    assert_eq!(bound.sql(), "select 1  where admin = true");
}
