//! Macros registered at link time through `register_macro!`.

use dynsql::{RegistryContext, Value, find_default_macro, params, register_macro};

register_macro!("user_columns", "id, login_name, email");
register_macro!(
    "active_filter",
    "status = :status @{ifAnd, not roles.isEmpty(), AND role in @{in, :roles}}"
);
register_macro!("broken_macro", "@{if");

#[test]
fn registered_macros_are_found() {
    let columns = find_default_macro("user_columns").expect("macro registered");
    assert_eq!(columns.to_template(), "id, login_name, email");
    assert!(find_default_macro("no_such_macro").is_none());
}

#[test]
fn unparsable_registrations_are_skipped() {
    assert!(find_default_macro("broken_macro").is_none());
}

#[test]
fn templates_splice_registered_macros() {
    let source = params! {
        "status" => "active",
        "roles" => vec!["admin", "ops"],
    };
    let bound = dynsql::render(
        "select @{macro, user_columns} from users where @{macro, active_filter}",
        &source,
    )
    .unwrap();

    assert_eq!(
        bound.sql(),
        "select id, login_name, email from users where status = ? AND role in (?, ?)"
    );
    assert_eq!(
        bound.values(),
        vec![&Value::from("active"), &Value::from("admin"), &Value::from("ops")]
    );
}

#[test]
fn local_macros_shadow_registered_ones() {
    let ctx = RegistryContext::new()
        .with_macro("user_columns", "id")
        .unwrap();
    let bound = dynsql::parse("select @{macro, user_columns} from users")
        .unwrap()
        .bind(&params!(), &ctx)
        .unwrap();
    assert_eq!(bound.sql(), "select id from users");
}
