use super::*;
use serde::Serialize;

// ==================== MergedSource ====================

#[test]
fn locked_layer_keeps_its_value_against_own_map_put() {
    let mut merged = MergedSource::new();
    merged.append_locked([("id", 5)]);

    assert!(!merged.put("id", 9));
    assert_eq!(merged.get("id"), Some(&Value::Int(5)));
}

#[test]
fn own_map_is_scanned_before_layers() {
    let mut merged = MergedSource::new();
    merged.append_unlocked([("name", "layer")]);
    merged.put("other", "own");

    assert_eq!(merged.get("name"), Some(&Value::from("layer")));
    assert_eq!(merged.get("other"), Some(&Value::from("own")));
}

#[test]
fn layers_are_scanned_in_registration_order() {
    let mut merged = MergedSource::new();
    merged.append_unlocked([("k", 1)]);
    merged.append_unlocked([("k", 2)]);
    assert_eq!(merged.get("k"), Some(&Value::Int(1)));
}

#[test]
fn containment_decides_not_nullness() {
    let mut merged = MergedSource::new();
    merged.append_unlocked([("k", Value::Null)]);
    merged.append_unlocked([("k", 7)]);
    assert_eq!(merged.get("k"), Some(&Value::Null));
    assert!(merged.has_value("k"));
}

#[test]
fn put_routes_to_the_owning_unlocked_layer() {
    let mut merged = MergedSource::new();
    merged.append_unlocked([("k", 1)]);
    assert!(merged.put("k", 2));
    assert_eq!(merged.get("k"), Some(&Value::Int(2)));

    merged.clear();
    assert!(!merged.has_value("k"));
}

#[test]
fn remove_and_clear_preserve_locked_keys() {
    let mut merged = MergedSource::new();
    merged.append_locked([("locked", 1)]);
    merged.append_unlocked([("loose", 2)]);
    merged.put("own", 3);

    assert_eq!(merged.remove("locked"), None);
    assert_eq!(merged.get("locked"), Some(&Value::Int(1)));
    assert_eq!(merged.remove("loose"), Some(Value::Int(2)));

    merged.clear();
    assert_eq!(merged.get("locked"), Some(&Value::Null));
    assert!(!merged.has_value("own"));
    assert_eq!(merged.names(), vec!["locked".to_string()]);
}

#[test]
fn positional_args_with_aliases() {
    let merged = MergedSource::with_args(vec![Value::from(10), Value::from("x")], &["id", ""]);
    assert_eq!(merged.get("arg0"), Some(&Value::Int(10)));
    assert_eq!(merged.get("id"), Some(&Value::Int(10)));
    assert_eq!(merged.get("arg1"), Some(&Value::from("x")));
    assert_eq!(merged.len(), 3);
}

#[test]
fn explicit_map_takes_precedence_over_positional_fallback() {
    let mut merged = MergedSource::new();
    merged.append_locked([("id", 1)]);
    merged.append_locked([("arg0", 2), ("id", 3)]);
    assert_eq!(merged.get("id"), Some(&Value::Int(1)));
    assert_eq!(merged.get("arg0"), Some(&Value::Int(2)));
}

// ==================== BeanSource ====================

#[derive(Serialize)]
struct User {
    id: i64,
    #[serde(rename = "loginName")]
    login_name: String,
    tags: Vec<String>,
}

#[test]
fn bean_source_uses_serde_field_names() {
    let user = User {
        id: 1,
        login_name: "alice".into(),
        tags: vec!["a".into()],
    };
    let source = BeanSource::new(&user).unwrap();
    assert!(source.has_value("loginName"));
    assert_eq!(source.get_value("id"), Some(&Value::Int(1)));
    assert_eq!(resolve(&source, "tags[0]").unwrap(), Some(Value::from("a")));
    assert_eq!(
        source.names(),
        vec!["id".to_string(), "loginName".to_string(), "tags".to_string()]
    );
}

#[test]
fn bean_source_rejects_scalars() {
    assert!(BeanSource::new(&5).is_err());
}

// ==================== Helpers ====================

#[test]
fn positional_helper_names_args() {
    let source = positional(vec![1, 2]);
    assert_eq!(source.get_value("arg1"), Some(&Value::Int(2)));
}

#[test]
fn params_macro_builds_map() {
    let source = crate::params! { "a" => 1, "b" => "x" };
    assert_eq!(source.names(), vec!["a".to_string(), "b".to_string()]);
    assert!(crate::params!().is_empty());
}
