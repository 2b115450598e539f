//! Errors reported while parsing and generating schema files.

mod common;

use common::{generate_err, parse_err, DIALECTS};

#[test]
fn duplicate_default_is_a_parse_error() {
    let err = parse_err("model Post {\n  status Text @default('a') @default('b')\n}");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("Duplicate decorator '@default'"));
}

#[test]
fn unknown_type_reports_position() {
    let err = parse_err("model Post {\n  price Money\n}");
    assert_eq!((err.line, err.column), (2, 9));
    assert!(err.message.contains("Unknown type 'Money'"));
}

#[test]
fn unknown_decorator_reports_column() {
    let err = parse_err("model Post { id Int @primary }");
    assert!(err.message.contains("Unknown decorator '@primary'"));
}

#[test]
fn unmatched_brace_points_at_opening_brace() {
    let err = parse_err("model Post {\n  id Int\n");
    assert_eq!((err.line, err.column), (1, 12));
}

#[test]
fn stray_token_at_top_level() {
    let err = parse_err("table Post { id Int }");
    assert!(err
        .to_string()
        .starts_with("Unexpected token: expected 'model' or a raw SQL line"));
}

#[test]
fn duplicate_model() {
    let err = parse_err("model A { id Int }\nmodel A { id Int }");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("Duplicate model 'A'"));
}

#[test]
fn pk_with_argument_fails_generation() {
    for dialect in DIALECTS {
        let err = generate_err(dialect, "model User { id Serial @pk('x') }");
        assert_eq!(err.model, "User");
        assert_eq!(err.column.as_deref(), Some("id"));
        assert!(err.message.contains("@pk takes no arguments"));
    }
}

#[test]
fn on_delete_without_ref_fails_generation() {
    for dialect in DIALECTS {
        let err = generate_err(dialect, "model Post { author Int @onDelete(cascade) }");
        assert_eq!(err.to_string(), "Post.author: @onDelete requires @ref on the same column");
    }
}

#[test]
fn invalid_on_delete_action() {
    let err = generate_err(
        DIALECTS[0],
        "model Post { author Int @ref(User.id) @onDelete(explode) }",
    );
    assert!(err.message.contains("invalid @onDelete action 'explode'"));
}

#[test]
fn ref_without_dot() {
    let err = generate_err(DIALECTS[2], "model Post { author Int @ref(User) }");
    assert!(err.message.contains("@ref expects 'Table.column'"));
}

#[test]
fn default_arity() {
    let err = generate_err(DIALECTS[1], "model Post { n Int @default(1, 2) }");
    assert!(err.message.contains("@default takes exactly one argument, got 2"));
}

#[test]
fn mysql_identifier_limit() {
    let name = "t".repeat(65);
    let err = generate_err(DIALECTS[1], &format!("model {name} {{ id Int }}"));
    assert_eq!(err.column, None);
    assert!(err.message.contains("the limit is 64"));
}
