use std::collections::BTreeMap;
use std::path::Path;

use dynsql::{BoundSql, DynamicSql, SqlMode, Value};

use crate::cli::RenderArgs;
use crate::config::ProjectConfig;
use crate::input::read_template;

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let template = read_template(&args.input)?;
    let project = ProjectConfig::load_optional(args.config.as_deref())?;
    let ctx = project.context()?;
    let source = match &args.params {
        Some(path) => load_params(path)?,
        None => BTreeMap::new(),
    };

    let program =
        DynamicSql::parse(&template).map_err(|e| anyhow::anyhow!("failed to parse template: {e}"))?;
    let bound = program
        .bind(&source, &ctx)
        .map_err(|e| anyhow::anyhow!("failed to bind template: {e}"))?;

    println!("{}", format_bound(&bound, args.numbered, args.json)?);
    Ok(())
}

fn load_params(path: &Path) -> anyhow::Result<BTreeMap<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse parameters {}: {e}", path.display()))?;
    params_from_json(json)
}

/// An object becomes named parameters, an array positional `arg0..argN`.
fn params_from_json(json: serde_json::Value) -> anyhow::Result<BTreeMap<String, Value>> {
    match json {
        serde_json::Value::Object(map) => {
            Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
        }
        serde_json::Value::Array(items) => Ok(dynsql::positional(items)),
        serde_json::Value::Null => Ok(BTreeMap::new()),
        other => anyhow::bail!(
            "parameters must be a JSON object or array, found {}",
            Value::from(other).kind()
        ),
    }
}

fn format_bound(bound: &BoundSql, numbered: bool, json: bool) -> anyhow::Result<String> {
    let sql = if numbered {
        bound.to_numbered_sql()
    } else {
        bound.sql().to_string()
    };

    if json {
        let doc = serde_json::json!({
            "sql": sql,
            "args": bound.args(),
            "resultArgs": bound.result_args(),
        });
        return Ok(serde_json::to_string_pretty(&doc)?);
    }

    let mut out = sql;
    for (i, arg) in bound.args().iter().enumerate() {
        out.push_str(&format!("\n  ${} = {}", i + 1, arg.value.to_sql_literal()));
        let mut notes = Vec::new();
        if arg.mode != SqlMode::In {
            notes.push(arg.mode.to_string());
        }
        if let Some(sql_type) = arg.sql_type {
            notes.push(format!("{sql_type:?}"));
        }
        if let Some(handler) = arg.handler_name() {
            notes.push(format!("handler={handler}"));
        }
        if !notes.is_empty() {
            out.push_str(&format!(" ({})", notes.join(", ")));
        }
    }
    for result in bound.result_args() {
        out.push_str(&format!(
            "\n  result {:?} {}",
            result.kind,
            result.name.as_deref().unwrap_or("-")
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynsql::RegistryContext;

    fn bind(template: &str, params: serde_json::Value) -> BoundSql {
        let source = params_from_json(params).unwrap();
        DynamicSql::parse(template)
            .unwrap()
            .bind(&source, &RegistryContext::new())
            .unwrap()
    }

    #[test]
    fn object_params_are_named() {
        let bound = bind(
            "select * from t where a = :a and id in @{in, :ids}",
            serde_json::json!({ "a": "x", "ids": [1, 2] }),
        );
        assert_eq!(
            format_bound(&bound, true, false).unwrap(),
            "select * from t where a = $1 and id in ($2, $3)\n  $1 = 'x'\n  $2 = 1\n  $3 = 2"
        );
    }

    #[test]
    fn array_params_are_positional() {
        let bound = bind("select ?, ?", serde_json::json!([true, null]));
        assert_eq!(
            format_bound(&bound, false, false).unwrap(),
            "select ?, ?\n  $1 = true\n  $2 = NULL"
        );
    }

    #[test]
    fn scalar_params_are_rejected() {
        assert!(params_from_json(serde_json::json!(5)).is_err());
        assert!(params_from_json(serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn notes_and_results() {
        let bound = bind(
            "call p(#{n, jdbcType=INTEGER}, #{name=total, mode=OUT}) @{resultSet, rows}",
            serde_json::json!({ "n": 3 }),
        );
        assert_eq!(
            format_bound(&bound, false, false).unwrap(),
            "call p(?, ?) \n  $1 = 3 (Integer, handler=integer)\n  $2 = NULL (OUT)\n  result ResultSet rows"
        );
    }

    #[test]
    fn json_output() {
        let bound = bind("select :a", serde_json::json!({ "a": 1 }));
        let out = format_bound(&bound, true, true).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["sql"], "select $1");
        assert_eq!(doc["args"][0]["value"], 1);
        assert_eq!(doc["args"][0]["mode"], "IN");
        assert!(doc["resultArgs"].as_array().unwrap().is_empty());
    }
}
