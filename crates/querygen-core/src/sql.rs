//! SQL statement templating.
//!
//! Renders each query's statement text: either the user-supplied
//! `stmt` normalized for embedding, or a statement synthesized from
//! the query kind. User SQL is never rewritten beyond whitespace
//! normalization.

use crate::ir::{Arg, Query, QueryKind};

/// Renders the SQL text for a query.
///
/// An explicit `stmt` wins over synthesis; its lines are trimmed and
/// joined with single spaces. Without a statement or a kind the result
/// is empty.
#[must_use]
pub fn statement_sql(query: &Query, src: &str) -> String {
    if let Some(stmt) = query.stmt {
        return collapse_lines(stmt.text(src));
    }
    let Some(kind) = query.kind else {
        return String::new();
    };
    let table = query.table.map_or("", |t| t.text(src));
    match kind {
        QueryKind::Insert => synth_insert(query, src, table),
        QueryKind::Upsert => synth_upsert(query, src, table),
        QueryKind::Update => synth_update(query, src, table),
        QueryKind::Delete => synth_delete(query, src, table),
        QueryKind::Exists => synth_exists(query, src, table),
        QueryKind::SelectFirst => synth_select(query, src, table, true),
        QueryKind::SelectAll => synth_select(query, src, table, false),
    }
}

/// Bind order for a query: update targets first in declaration order,
/// then the filter keys. For queries without update targets this is
/// plain declaration order.
#[must_use]
pub fn bind_order(query: &Query) -> Vec<&Arg> {
    query
        .bind_args
        .iter()
        .filter(|a| a.update)
        .chain(query.bind_args.iter().filter(|a| !a.update))
        .collect()
}

/// Joins the lines of a user statement with single spaces, trimming
/// each line. Decodes back to the original modulo whitespace.
fn collapse_lines(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
    }
    out
}

fn name_list(args: &[Arg], src: &str) -> String {
    args.iter()
        .map(|a| a.name.text(src))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `col=? AND col=? ...` over the given arguments.
fn filter_clause<'a>(args: impl Iterator<Item = &'a Arg>, src: &str) -> String {
    args.map(|a| format!("{}=?", a.name.text(src)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// The RETURNING (and SELECT) column list: the scalar return column
/// first, then every callback column.
fn row_columns(query: &Query, src: &str) -> String {
    let mut cols = Vec::new();
    if let Some(name) = query.return_name {
        cols.push(name.text(src).to_string());
    }
    cols.extend(query.cb_args.iter().map(|a| a.name.text(src).to_string()));
    cols.join(", ")
}

fn synth_insert(query: &Query, src: &str, table: &str) -> String {
    let cols = name_list(&query.in_args, src);
    let values = placeholders(query.in_args.len());
    if !query.has_row_output() {
        return format!("INSERT OR IGNORE INTO {table} ({cols}) VALUES ({values});");
    }

    // A conflicting INSERT produces no RETURNING row unless something
    // is updated. Reassigning the first input column (never an
    // auto-incrementing id) forces the row out without changing it.
    let reinsert = query
        .in_args
        .first()
        .map(|a| a.name)
        .or(query.return_name)
        .map_or("", |s| s.text(src));
    format!(
        "INSERT INTO {table} ({cols}) VALUES ({values}) \
         ON CONFLICT DO UPDATE SET {reinsert}=excluded.{reinsert} RETURNING {};",
        row_columns(query, src)
    )
}

fn synth_upsert(query: &Query, src: &str, table: &str) -> String {
    let cols = name_list(&query.in_args, src);
    let values = placeholders(query.in_args.len());
    let assignments = query
        .in_args
        .iter()
        .map(|a| {
            let name = a.name.text(src);
            format!("{name}=excluded.{name}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {table} ({cols}) VALUES ({values}) ON CONFLICT DO UPDATE SET {assignments}"
    );
    if query.has_row_output() {
        sql.push_str(&format!(" RETURNING {}", row_columns(query, src)));
    }
    sql.push(';');
    sql
}

fn synth_update(query: &Query, src: &str, table: &str) -> String {
    let set = query
        .in_args
        .iter()
        .filter(|a| a.update)
        .map(|a| format!("{}=?", a.name.text(src)))
        .collect::<Vec<_>>()
        .join(", ");
    let filter = filter_clause(query.in_args.iter().filter(|a| !a.update), src);

    let mut sql = format!("UPDATE {table} SET {set}");
    if !filter.is_empty() {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    sql.push(';');
    sql
}

fn synth_delete(query: &Query, src: &str, table: &str) -> String {
    let filter = filter_clause(query.in_args.iter().filter(|a| !a.update), src);
    let mut sql = format!("DELETE FROM {table}");
    if !filter.is_empty() {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    sql.push(';');
    sql
}

fn synth_exists(query: &Query, src: &str, table: &str) -> String {
    let filter = filter_clause(query.in_args.iter(), src);
    let mut sql = format!("SELECT 1 FROM {table}");
    if !filter.is_empty() {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    sql.push_str(" LIMIT 1;");
    sql
}

fn synth_select(query: &Query, src: &str, table: &str, first_only: bool) -> String {
    let filter = filter_clause(query.in_args.iter(), src);
    let mut sql = format!("SELECT {} FROM {table}", row_columns(query, src));
    if !filter.is_empty() {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    if first_only {
        sql.push_str(" LIMIT 1");
    }
    sql.push(';');
    sql
}
