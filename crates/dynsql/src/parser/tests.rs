use super::*;

fn named(expr: &str) -> Segment {
    Segment::Named {
        expr: expr.to_string(),
        raw: false,
    }
}

fn lit(text: &str) -> Segment {
    Segment::Literal(text.to_string())
}

fn params(segments: &[Segment]) -> usize {
    segments
        .iter()
        .filter(|s| !matches!(s, Segment::Literal(_)))
        .count()
}

// ==================== Skipping ====================

#[test]
fn quoted_question_mark_is_literal() {
    let segments = parse_segments("select '?' from t where a = ?").unwrap();
    assert_eq!(
        segments,
        vec![lit("select '?' from t where a = "), Segment::Positional(0)]
    );
}

#[test]
fn comments_hide_placeholders() {
    let segments = parse_segments("select 1 -- :fake\n where a = :real").unwrap();
    assert_eq!(params(&segments), 1);
    assert_eq!(segments.last(), Some(&named("real")));

    let segments = parse_segments("select /* :a ? ${b} */ :c").unwrap();
    assert_eq!(segments, vec![lit("select /* :a ? ${b} */ "), named("c")]);
}

#[test]
fn quoted_identifiers_and_escaped_quotes() {
    let segments = parse_segments(r#"select "a?b", 'it''s :x' from t where c = :c"#).unwrap();
    assert_eq!(params(&segments), 1);
    assert_eq!(segments.last(), Some(&named("c")));
}

#[test]
fn unterminated_quote_consumes_rest() {
    let segments = parse_segments("select 'abc :x").unwrap();
    assert_eq!(segments, vec![lit("select 'abc :x")]);
}

// ==================== Named parameters ====================

#[test]
fn cast_is_not_a_parameter() {
    let segments = parse_segments("a::int = :x").unwrap();
    assert_eq!(segments, vec![lit("a::int = "), named("x")]);
}

#[test]
fn named_parameter_boundaries() {
    let segments = parse_segments("(:a,:b.c[0])+&raw").unwrap();
    assert_eq!(
        segments,
        vec![
            lit("("),
            named("a"),
            lit(","),
            named("b.c[0]"),
            lit(")+"),
            Segment::Named {
                expr: "raw".to_string(),
                raw: true
            },
        ]
    );
}

#[test]
fn lone_colon_and_ampersand_are_text() {
    let segments = parse_segments("select a : b, c & d").unwrap();
    assert_eq!(segments, vec![lit("select a : b, c & d")]);
}

#[test]
fn injection_guard() {
    for template in [":#{x}", ":@{x}", "a = :x#y"] {
        let err = parse_segments(template).unwrap_err();
        assert!(err.is_parse(), "{template}");
        assert!(err.to_string().contains("'#' or '@'"), "{template}");
    }
}

// ==================== Braced placeholders ====================

#[test]
fn injection_is_kept_verbatim() {
    let segments = parse_segments("order by ${ col } desc").unwrap();
    assert_eq!(
        segments,
        vec![
            lit("order by "),
            Segment::Injection(" col ".to_string()),
            lit(" desc")
        ]
    );
}

#[test]
fn escaped_braces_stay_literal() {
    let segments = parse_segments(r"select '\${a}' || \${b}").unwrap();
    assert_eq!(segments, vec![lit(r"select '\${a}' || \${b}")]);
}

#[test]
fn value_arg_options() {
    let segments = parse_segments("#{id, mode=INOUT, jdbcType=INTEGER}").unwrap();
    let Segment::Value { expr, config, .. } = &segments[0] else {
        panic!("expected value segment, got {segments:?}");
    };
    assert_eq!(expr, "id");
    assert_eq!(config.mode, Some(crate::types::SqlMode::InOut));
}

#[test]
fn value_arg_errors() {
    assert!(parse_segments("#{a,b=1,c=1,d=1,e=1,f=1,g=1,h=1,i=1,j=1,k=1}").is_err());
    assert!(parse_segments("#{a, mode}").is_err());
    assert!(parse_segments("#{ }").is_err());
    assert!(parse_segments("select #{a").unwrap_err().is_parse());
}

#[test]
fn positions_count_every_bound_placeholder() {
    let segments = parse_segments("? :a #{b} ${c} ?").unwrap();
    assert_eq!(segments[0], Segment::Positional(0));
    assert_eq!(segments.last(), Some(&Segment::Positional(3)));
}

// ==================== Rules ====================

#[test]
fn rule_content_is_split() {
    let segments = parse_segments("x @{ifAnd, age > 1, and age = :age} y").unwrap();
    let Segment::Rule(rule) = &segments[1] else {
        panic!("expected rule segment, got {segments:?}");
    };
    assert_eq!(rule.name, "ifAnd");
    assert_eq!(rule.active_expr.as_deref(), Some(" age > 1"));
    assert_eq!(rule.body.as_deref(), Some(" and age = :age"));
    assert_eq!(rule.tail.as_deref(), Some(" age > 1, and age = :age"));
}

#[test]
fn rule_split_respects_quotes_and_nesting() {
    let rule = parse_rule_invocation("if, name == 'a,b', x in @{in, :ids}").unwrap();
    assert_eq!(rule.active_expr.as_deref(), Some(" name == 'a,b'"));
    assert_eq!(rule.body.as_deref(), Some(" x in @{in, :ids}"));

    let rule = parse_rule_invocation("uuid32").unwrap();
    assert_eq!(rule.name, "uuid32");
    assert!(rule.tail.is_none());
}

#[test]
fn rule_errors() {
    assert!(parse_segments("@{and, a = :a").unwrap_err().is_parse());
    assert!(parse_segments("@{, a}").unwrap_err().is_parse());
    assert!(parse_segments("@{bad name, a}").unwrap_err().is_parse());

    let err = parse_segments("select @{ }").unwrap_err();
    assert!(matches!(err, TemplateError::Parse { offset: 7, .. }));
}

#[test]
fn empty_braced_placeholders_are_rejected() {
    for template in ["select ${}", "select #{ }", "select @{}"] {
        let err = parse_segments(template).unwrap_err();
        assert!(matches!(err, TemplateError::Parse { offset: 7, .. }), "{template}: {err}");
        assert!(err.to_string().contains("empty"), "{err}");
    }
}
