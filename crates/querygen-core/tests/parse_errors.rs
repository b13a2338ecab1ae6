//! Parser error cases. Every failure is a single diagnostic carrying
//! the offending span.

mod common;
use common::*;

#[test]
fn unknown_option() {
    let input = "%option frobnicate = \"x\"";
    let err = parse_err(input);
    assert!(err.message.contains("unknown option"));
    assert_eq!(err.snippet(input), "frobnicate");
}

#[test]
fn valued_option_requires_equals() {
    let err = parse_err("%option prefix \"x\"");
    assert!(err.message.contains('='));
}

#[test]
fn valued_option_requires_string() {
    let err = parse_err("%option prefix = 42");
    assert!(err.message.contains("string"));
}

#[test]
fn migration_requires_version() {
    let err = parse_err("%upgrade { CREATE TABLE t (id INTEGER); }");
    assert!(err.message.contains("version"));
}

#[test]
fn migration_requires_body() {
    let err = parse_err("%upgrade 1");
    assert!(err.message.contains('{'));
}

#[test]
fn unterminated_migration_body() {
    let err = parse_err("%upgrade 1 { CREATE TABLE t (id INTEGER);");
    assert!(err.message.contains('}'));
}

#[test]
fn unterminated_string() {
    let err = parse_err("%option prefix = \"oops");
    assert!(err.message.contains("quote"));
}

#[test]
fn unterminated_block_comment() {
    let err = parse_err("/* never closed");
    assert!(err.message.contains("*/"));
}

#[test]
fn unknown_query_type() {
    let input = "%query q(int id) { type merge table t }";
    let err = parse_err(input);
    assert!(err.message.contains("unknown query type"));
    assert_eq!(err.snippet(input), "merge");
}

#[test]
fn update_column_must_resolve() {
    let input = "%query q(int id) { type update height table t }";
    let err = parse_err(input);
    assert!(err.message.contains("height"));
}

#[test]
fn bind_argument_must_resolve() {
    let input = "%query q(int id) { type exists table t bind missing }";
    let err = parse_err(input);
    assert!(err.message.contains("missing"));
    assert!(err.message.contains("does not exist"));
}

#[test]
fn unknown_parameter_qualifier() {
    let err = parse_err("%query q(int id maybe) { type exists table t }");
    assert!(err.message.contains("qualifier"));
}

#[test]
fn parameter_list_requires_name() {
    let err = parse_err("%query q(int) { type exists table t }");
    assert!(err.message.contains("parameter name"));
}

#[test]
fn struct_type_requires_name() {
    let err = parse_err("%query q(struct) { }");
    assert!(err.message.contains("struct"));
}

#[test]
fn query_requires_parameter_list() {
    let err = parse_err("%query q { type exists }");
    assert!(err.message.contains('('));
}

#[test]
fn unknown_body_directive() {
    let err = parse_err("%query q(int id) { limit 5 }");
    assert!(err.message.contains("expecting"));
}

#[test]
fn stray_top_level_token() {
    let err = parse_err("; %query q(int id) { type exists table t }");
    assert!(err.message.contains("top level"));
}
