//! Shared helpers for the integration suites.
#![allow(dead_code)]

use querygen_core::{ir, ParseError, Parser, Root};

/// Parses and normalizes a definition, panicking on failure.
pub fn parse(input: &str) -> Root {
    let mut root = Parser::new(input)
        .parse()
        .expect("definition should parse");
    ir::normalize(&mut root);
    root
}

/// Parses a definition that must fail, returning the diagnostic.
pub fn parse_err(input: &str) -> ParseError {
    Parser::new(input)
        .parse()
        .expect_err("definition should not parse")
}

/// Renders the header for a definition.
pub fn header(input: &str) -> String {
    querygen_core::emit::generate_header(&parse(input), input)
}

/// Renders the source for a definition.
pub fn source(input: &str) -> String {
    querygen_core::emit::generate_source(&parse(input), input)
}

/// Renders the SQL of the only top-level query in a definition.
pub fn only_query_sql(input: &str) -> String {
    let root = parse(input);
    assert_eq!(root.queries.len(), 1, "expected a single top-level query");
    querygen_core::sql::statement_sql(&root.queries[0], input)
}

/// A migration pair matching the original two-version people schema.
pub const PEOPLE_MIGRATIONS: &str = "
%upgrade 1 {
    CREATE TABLE people (
        id INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        age INTEGER NOT NULL);
}
%downgrade 0 {
    DROP TABLE people;
}
";
