//! Statement synthesis per query kind, plus the bind-order and
//! placeholder invariants.

mod common;
use common::*;

use querygen_core::sql::{bind_order, statement_sql};

#[test]
fn insert_without_row_output_is_insert_or_ignore() {
    let sql = only_query_sql(
        "%query add(const char* name, int age) { type insert table people }",
    );
    assert_eq!(sql, "INSERT OR IGNORE INTO people (name, age) VALUES (?, ?);");
}

#[test]
fn insert_with_return_reinjects_returning() {
    let sql = only_query_sql(
        "%query add(const char* name, int age) { type insert table people return id }",
    );
    // The first input column is reassigned so the conflicting row is
    // still returned; an id-like column must not be touched.
    assert_eq!(
        sql,
        "INSERT INTO people (name, age) VALUES (?, ?) \
         ON CONFLICT DO UPDATE SET name=excluded.name RETURNING id;"
    );
}

#[test]
fn insert_with_return_and_callback_lists_all_columns() {
    let sql = only_query_sql(
        "%query add(const char* name, int age) {
            type insert
            table people
            return id
            callback int id, const char* name, int age
        }",
    );
    assert!(sql.ends_with("RETURNING id, id, name, age;"));
}

#[test]
fn upsert_assigns_every_input_column() {
    let sql = only_query_sql(
        "%query put(const char* name, int age) {
            type upsert
            table people
            callback int id, const char* name, int age
        }",
    );
    assert_eq!(
        sql,
        "INSERT INTO people (name, age) VALUES (?, ?) \
         ON CONFLICT DO UPDATE SET name=excluded.name, age=excluded.age \
         RETURNING id, name, age;"
    );
}

#[test]
fn upsert_without_row_output_has_no_returning() {
    let sql = only_query_sql(
        "%query put(const char* name, int age) { type upsert table people }",
    );
    assert!(!sql.contains("RETURNING"));
    assert!(sql.starts_with("INSERT INTO people"));
}

#[test]
fn update_partitions_set_and_where() {
    let sql = only_query_sql(
        "%query update_age(const char* name, int age) { type update age table people }",
    );
    assert_eq!(sql, "UPDATE people SET age=? WHERE name=?;");
}

#[test]
fn update_set_and_where_are_disjoint() {
    let input = "%query up(const char* name, int age, int height) {
        type update age, height
        table people
    }";
    let sql = only_query_sql(input);
    let (set_part, where_part) = sql.split_once(" WHERE ").expect("has WHERE");
    assert!(set_part.contains("age=?") && set_part.contains("height=?"));
    assert!(!set_part.contains("name=?"));
    assert_eq!(where_part, "name=?;");
}

#[test]
fn delete_filters_all_inputs() {
    let sql = only_query_sql("%query del(const char* name, int age) { type delete table people }");
    assert_eq!(sql, "DELETE FROM people WHERE name=? AND age=?;");
}

#[test]
fn exists_selects_one_with_limit() {
    let sql = only_query_sql("%query has(const char* name) { type exists table people }");
    assert_eq!(sql, "SELECT 1 FROM people WHERE name=? LIMIT 1;");
}

#[test]
fn select_first_has_limit_select_all_does_not() {
    let first = only_query_sql(
        "%query get(int age) { type select-first table people return id callback const char* name }",
    );
    assert_eq!(first, "SELECT id, name FROM people WHERE age=? LIMIT 1;");

    let all = only_query_sql(
        "%query get_all() { type select-all table pets callback const char* name, const char* food }",
    );
    assert_eq!(all, "SELECT name, food FROM pets;");
}

#[test]
fn placeholder_count_matches_bind_count() {
    let inputs = [
        "%query a(const char* name, int age) { type insert table t }",
        "%query b(const char* name, int age) { type update age table t }",
        "%query c(const char* name, int age, int h null) { type delete table t }",
        "%query d(const char* name) { type exists table t }",
        "%query e(int x) { type select-all table t callback int id bind x }",
    ];
    for input in inputs {
        let root = parse(input);
        let query = &root.queries[0];
        let sql = statement_sql(query, input);
        let placeholders = sql.matches('?').count();
        assert_eq!(
            placeholders,
            bind_order(query).len(),
            "placeholder mismatch for {sql}"
        );
    }
}

#[test]
fn synthesized_update_binds_set_columns_first() {
    let input = "%query up(const char* name, int age) { type update age table people }";
    let root = parse(input);
    let order: Vec<&str> = bind_order(&root.queries[0])
        .iter()
        .map(|a| a.name.text(input))
        .collect();
    assert_eq!(order, vec!["age", "name"]);
}

#[test]
fn explicit_bind_keeps_declaration_order() {
    let input = "%query up(const char* name, int age) {
        type update age
        table people
        stmt { UPDATE people SET age=? WHERE name=? }
        bind name, age
    }";
    let root = parse(input);
    // `age` is an update target, but an explicit bind list is taken
    // as written, with no update-first reordering.
    let order: Vec<&str> = bind_order(&root.queries[0])
        .iter()
        .map(|a| a.name.text(input))
        .collect();
    assert_eq!(order, vec!["name", "age"]);
}

#[test]
fn explicit_stmt_collapses_whitespace() {
    let input = "%query q() {
        stmt {
            SELECT id
            FROM people
            WHERE age > 40
        }
        callback int id
    }";
    let sql = only_query_sql(input);
    assert_eq!(sql, "SELECT id FROM people WHERE age > 40");
}

#[test]
fn explicit_stmt_round_trips_modulo_whitespace() {
    let original = "SELECT id FROM people WHERE age > 40";
    let input = format!("%query q() {{ stmt {{ {original} }} callback int id }}");
    let root = parse(&input);
    assert_eq!(statement_sql(&root.queries[0], &input), original);
}

#[test]
fn query_without_kind_or_stmt_renders_nothing() {
    let input = "%query q(int id) { table people }";
    assert_eq!(only_query_sql(input), "");
}
