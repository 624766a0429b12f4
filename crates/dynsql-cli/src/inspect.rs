use dynsql::{DynamicSql, Segment};

use crate::cli::InspectArgs;
use crate::input::read_template;

pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let template = read_template(&args.input)?;
    let program =
        DynamicSql::parse(&template).map_err(|e| anyhow::anyhow!("failed to parse template: {e}"))?;
    println!("{}", describe(&program));
    Ok(())
}

fn describe(program: &DynamicSql) -> String {
    let mut lines: Vec<String> = program.segments().iter().map(describe_segment).collect();
    lines.push(format!("modifiers: {}", program.modifiers()));
    let names = program.referenced_names();
    lines.push(format!(
        "names: {}",
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    ));
    if program.has_injection() {
        lines.push("warning: template substitutes text with ${...}".to_string());
    }
    lines.join("\n")
}

fn describe_segment(segment: &Segment) -> String {
    match segment {
        Segment::Literal(text) => format!("literal    {text:?}"),
        Segment::Positional(index) => format!("positional arg{index}"),
        Segment::Named { expr, raw: false } => format!("named      :{expr}"),
        Segment::Named { expr, raw: true } => format!("raw        &{expr}"),
        Segment::Injection(expr) => format!("injection  {}", expr.trim()),
        Segment::Value { expr, config, .. } => {
            let config = config.to_string();
            match (expr.is_empty(), config.is_empty()) {
                (false, true) => format!("value      {expr}"),
                (false, false) => format!("value      {expr} [{config}]"),
                (true, _) => format!("value      [{config}]"),
            }
        }
        Segment::Rule(rule) => match rule.tail.as_deref().map(str::trim) {
            Some(tail) if !tail.is_empty() => format!("rule       {} {tail:?}", rule.name),
            _ => format!("rule       {}", rule.name),
        },
    }
}
