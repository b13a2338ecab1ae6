//! Source (implementation) stream emission.
//!
//! Emits the full backend implementation: the context struct with one
//! cached prepared statement per query, per-query statement lifecycle
//! (lazy prepare, typed bind with null sentinels, BUSY-retry step
//! loop), verbatim user functions, the migration driver with
//! transactional rollback and forward-compat downgrade snapshots, the
//! backend interface record, the optional debug layer, and the backend
//! dispatcher.

use super::text::{c_escape, c_literal_lines};
use super::types::c_type;
use super::{c_name, param_list};
use crate::ir::{Function, Group, Migration, Query, QueryKind, Root, DEFAULT_LOG_SQL_ERR};
use crate::sql;

/// Generates the implementation stream.
#[must_use]
pub fn generate_source(root: &Root, src: &str) -> String {
    let prefix = root.options.prefix(src);
    let mut out = String::new();

    if let Some(includes) = root.options.source_includes {
        out.push_str(&format!("\n{}\n\n", includes.text(src)));
    }
    out.push_str("#include <ctype.h>\n");
    out.push_str("#include <stdlib.h>\n");
    out.push_str("#include <string.h>\n");
    out.push_str("#include <stdio.h>\n");

    write_context_struct(&mut out, root, src);

    // Default SQL error logger, unless the hook was overridden.
    if root.options.uses_default_sql_logger() {
        out.push_str(&format!(
            "static void\n{DEFAULT_LOG_SQL_ERR}(int error_code, const char* error_code_str, const char* error_msg)\n"
        ));
        out.push_str("{\n");
        out.push_str(
            "    printf(\"SQL Error: %s (%d): %s\\n\", error_code_str, error_code, error_msg);\n",
        );
        out.push_str("}\n\n");
    }

    if let Some(preamble) = root.options.source_preamble {
        out.push_str(&format!("\n{}\n\n", preamble.text(src)));
    }

    for query in &root.queries {
        write_query_impl(&mut out, root, None, query, src);
    }
    for group in &root.groups {
        for query in &group.queries {
            write_query_impl(&mut out, root, Some(group), query, src);
        }
    }

    for function in &root.functions {
        write_user_function(&mut out, root, None, function, src);
    }
    for group in &root.groups {
        for function in &group.functions {
            write_user_function(&mut out, root, Some(group), function, src);
        }
    }

    write_open(&mut out, root, src);
    write_close(&mut out, root, src);

    write_migration_constants(&mut out, root, &root.upgrades, "upgrade", src);
    write_migration_constants(&mut out, root, &root.downgrades, "downgrade", src);
    write_run_sql(&mut out, root, src);
    write_version_fn(&mut out, root, src);
    if !root.flags.no_forwards_compat {
        write_forward_compat(&mut out, root, src);
    }

    out.push_str(&format!(
        "static int {prefix}_migrate_to(struct {prefix}* ctx, int target_version)\n{{\n"
    ));
    write_migration_body(&mut out, root, src, false);
    out.push_str("}\n\n");

    out.push_str(&format!(
        "static int {prefix}_upgrade(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str(&format!(
        "    return {prefix}_migrate_to(ctx, {});\n",
        root.max_version()
    ));
    out.push_str("}\n\n");

    out.push_str(&format!(
        "static int {prefix}_reinit(struct {prefix}* ctx)\n{{\n"
    ));
    write_migration_body(&mut out, root, src, true);
    out.push_str("}\n\n");

    write_interface(&mut out, root, src);

    if root.flags.debug_layer {
        write_debug_layer(&mut out, root, src);
    }

    write_api(&mut out, root, src);

    if let Some(postamble) = root.options.source_postamble {
        out.push_str(&format!("\n{}\n", postamble.text(src)));
    }

    out
}

fn write_context_struct(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    out.push_str(&format!("struct {prefix}\n{{\n"));
    out.push_str("    sqlite3* db;\n");
    for query in &root.queries {
        out.push_str(&format!("    sqlite3_stmt* {};\n", query.name.text(src)));
    }
    for group in &root.groups {
        for query in &group.queries {
            out.push_str(&format!(
                "    sqlite3_stmt* {}_{};\n",
                group.name.text(src),
                query.name.text(src)
            ));
        }
    }
    out.push_str("};\n");
}

// ================================================================
// Per-query implementation
// ================================================================

fn write_query_impl(out: &mut String, root: &Root, group: Option<&Group>, query: &Query, src: &str) {
    let fname = c_name(group, query, src);

    out.push_str(&format!(
        "static int\n{fname}({})\n{{\n",
        param_list(root, query, src)
    ));
    out.push_str("    int ret");
    if let Some(name) = query.return_name {
        out.push_str(&format!(", {} = -1", name.text(src)));
    }
    out.push_str(";\n");

    write_prepare(out, root, &fname, query, src);
    write_binds(out, root, &fname, query, src);
    write_exec(out, root, &fname, query, src);

    out.push_str("}\n\n");
}

fn write_prepare(out: &mut String, root: &Root, fname: &str, query: &Query, src: &str) {
    let log = root.options.log_sql_err(src);
    let statement = sql::statement_sql(query, src);

    out.push_str(&format!("    if (ctx->{fname} == NULL)\n"));
    out.push_str("        if ((ret = sqlite3_prepare_v2(ctx->db,\n");
    out.push_str(&format!("            \"{}\",\n", c_escape(&statement)));
    out.push_str(&format!("            -1, &ctx->{fname}, NULL)) != SQLITE_OK)\n"));
    out.push_str("        {\n");
    out.push_str(&format!(
        "            {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str("            return -1;\n");
    out.push_str("        }\n\n");
}

fn write_binds(out: &mut String, root: &Root, fname: &str, query: &Query, src: &str) {
    let ordered = sql::bind_order(query);
    if ordered.is_empty() {
        return;
    }
    let log = root.options.log_sql_err(src);

    for (i, arg) in ordered.iter().enumerate() {
        let idx = i + 1;
        let ty_name = arg.ty.text(src);
        let ty = c_type(ty_name);
        let name = arg.name.text(src);

        out.push_str(if i == 0 {
            "    if ((ret = "
        } else {
            " ||\n        (ret = "
        });

        if arg.nullable {
            out.push_str(&format!(
                "{name} {} ? sqlite3_bind_null(ctx->{fname}, {idx}) : ",
                ty.null_cmp
            ));
        }
        out.push_str(&format!(
            "sqlite3_bind_{}(ctx->{fname}, {idx}, {}{name}",
            ty.sqlite, ty.bind_cast
        ));
        match ty_name {
            "struct str_view" => out.push_str(&format!(".data, {name}.len, SQLITE_STATIC")),
            "const char*" => out.push_str(", -1, SQLITE_STATIC"),
            _ => {}
        }
        out.push_str(")) != SQLITE_OK");
    }

    out.push_str(")\n    {\n");
    out.push_str(&format!(
        "        {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str("        return -1;\n    }\n\n");
}

/// Invocation of the user callback with one type-dispatched column
/// getter per callback argument. The first column is 1 when a scalar
/// return column occupies column 0.
fn write_callback_call(out: &mut String, fname: &str, query: &Query, src: &str) {
    out.push_str("            ret = on_row(\n");
    let mut col = usize::from(query.return_name.is_some());
    for arg in &query.cb_args {
        let ty = c_type(arg.ty.text(src));
        out.push_str("                ");
        if arg.nullable {
            out.push_str(&format!(
                "sqlite3_column_type(ctx->{fname}, {col}) == SQLITE_NULL ? {} : ",
                ty.null_value
            ));
        }
        out.push_str(&format!(
            "{}sqlite3_column_{}(ctx->{fname}, {col}),\n",
            ty.column_cast, ty.sqlite
        ));
        col += 1;
    }
    out.push_str("                user_data);\n");
}

fn write_exec(out: &mut String, root: &Root, fname: &str, query: &Query, src: &str) {
    let Some(kind) = query.kind else {
        return;
    };
    let log = root.options.log_sql_err(src);
    let return_name = query.return_name.map(|s| s.text(src));
    let has_cb = !query.cb_args.is_empty();

    out.push_str("next_step:\n");
    out.push_str(&format!("    ret = sqlite3_step(ctx->{fname});\n"));
    out.push_str("    switch (ret)\n    {\n");

    match kind {
        QueryKind::Exists => {
            out.push_str("        case SQLITE_BUSY: goto next_step;\n");
            out.push_str("        case SQLITE_ROW:\n");
            out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
            out.push_str("            return 1;\n");
            out.push_str("        case SQLITE_DONE:\n");
            out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
            out.push_str("            return 0;\n");
        }

        QueryKind::SelectAll => {
            out.push_str("        case SQLITE_ROW:\n");
            if let Some(name) = return_name {
                out.push_str(&format!(
                    "            {name} = sqlite3_column_int(ctx->{fname}, 0);\n"
                ));
            }
            if has_cb {
                write_callback_call(out, fname, query, src);
                // A zero return asks for the next row; anything else
                // cuts the iteration short.
                out.push_str("            if (ret == 0) goto next_step;\n");
                out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
                if let Some(name) = return_name {
                    out.push_str("            if (ret < 0)\n                return -1;\n");
                    out.push_str(&format!("            return {name};\n"));
                } else {
                    out.push_str("            return ret;\n");
                }
            }
            out.push_str("        case SQLITE_BUSY: goto next_step;\n");
            out.push_str("        case SQLITE_DONE:\n");
            out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
            match return_name {
                Some(name) => out.push_str(&format!("            return {name};\n")),
                None => out.push_str("            return 0;\n"),
            }
        }

        // The single-row family: insert, update, upsert, delete,
        // select-first.
        _ => {
            out.push_str("        case SQLITE_BUSY: goto next_step;\n");
            if query.has_row_output() {
                out.push_str("        case SQLITE_ROW:\n");
                if let Some(name) = return_name {
                    out.push_str(&format!(
                        "            {name} = sqlite3_column_int(ctx->{fname}, 0);\n"
                    ));
                }
                if has_cb {
                    write_callback_call(out, fname, query, src);
                    if let Some(name) = return_name {
                        out.push_str("            if (ret < 0)\n            {\n");
                        out.push_str(&format!("                sqlite3_reset(ctx->{fname});\n"));
                        out.push_str("                return -1;\n            }\n");
                        out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
                        out.push_str(&format!("            return {name};\n"));
                    } else {
                        out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
                        out.push_str("            return ret;\n");
                    }
                } else if let Some(name) = return_name {
                    out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
                    out.push_str(&format!("            return {name};\n"));
                }
            }
            out.push_str("        case SQLITE_DONE:\n");
            out.push_str(&format!("            sqlite3_reset(ctx->{fname});\n"));
            match return_name {
                Some(name) => out.push_str(&format!("            return {name};\n")),
                None => out.push_str("            return 0;\n"),
            }
        }
    }

    out.push_str("    }\n\n");
    out.push_str(&format!(
        "    {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str(&format!("    sqlite3_reset(ctx->{fname});\n"));
    out.push_str("    return -1;\n");
}

// ================================================================
// User functions, open and close
// ================================================================

fn write_user_function(
    out: &mut String,
    root: &Root,
    group: Option<&Group>,
    function: &Function,
    src: &str,
) {
    let prefix = root.options.prefix(src);
    let name = match group {
        Some(group) => format!("{}_{}", group.name.text(src), function.name.text(src)),
        None => function.name.text(src).to_string(),
    };

    out.push_str(&format!("static int\n{name}(struct {prefix}* ctx"));
    for arg in &function.args {
        out.push_str(&format!(", {} {}", arg.ty.text(src), arg.name.text(src)));
    }
    out.push_str(")\n{\n");
    out.push_str(&format!("\n{}\n", function.body.text(src)));
    out.push_str("\n}\n\n");
}

fn write_open(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let malloc = root.options.malloc_fn(src);
    let free = root.options.free_fn(src);
    let log = root.options.log_sql_err(src);

    out.push_str(&format!(
        "static struct {prefix}*\n{prefix}_open(const char* uri)\n{{\n"
    ));
    out.push_str("    int ret;\n");
    out.push_str(&format!(
        "    struct {prefix}* ctx = {malloc}(sizeof *ctx);\n"
    ));
    out.push_str("    if (ctx == NULL)\n        return NULL;\n");
    out.push_str("    memset(ctx, 0, sizeof *ctx);\n\n");
    out.push_str(
        "    ret = sqlite3_open_v2(uri, &ctx->db, SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE, NULL);\n",
    );
    out.push_str("    if (ret == SQLITE_OK)\n        return ctx;\n\n");
    out.push_str(&format!(
        "    {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str(&format!("    {free}(ctx);\n"));
    out.push_str("    return NULL;\n}\n\n");
}

fn write_close(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let free = root.options.free_fn(src);

    out.push_str(&format!(
        "static void\n{prefix}_close(struct {prefix}* ctx)\n{{\n"
    ));
    for query in &root.queries {
        out.push_str(&format!(
            "    sqlite3_finalize(ctx->{});\n",
            query.name.text(src)
        ));
    }
    for group in &root.groups {
        for query in &group.queries {
            out.push_str(&format!(
                "    sqlite3_finalize(ctx->{}_{});\n",
                group.name.text(src),
                query.name.text(src)
            ));
        }
    }
    out.push_str("    sqlite3_close(ctx->db);\n");
    out.push_str(&format!("    {free}(ctx);\n"));
    out.push_str("}\n\n");
}

// ================================================================
// Migrations
// ================================================================

fn write_migration_constants(
    out: &mut String,
    root: &Root,
    migrations: &[Migration],
    kind: &str,
    src: &str,
) {
    let prefix = root.options.prefix(src);
    for migration in migrations {
        out.push_str(&format!(
            "static const char* {prefix}_{kind}{} =\n",
            migration.version
        ));
        out.push_str(&c_literal_lines(migration.sql.text(src), "    "));
        out.push_str(";\n\n");
    }
}

/// The multi-statement runner shared by the migration driver: prepare,
/// step with BUSY retry, advance to the next statement in the buffer.
fn write_run_sql(out: &mut String, root: &Root, src: &str) {
    let log = root.options.log_sql_err(src);

    out.push_str("static int run_sqlite3_sql(sqlite3* db, const char* sql)\n{\n");
    out.push_str("    int ret;\n");
    out.push_str("    int sql_len;\n");
    out.push_str("    const char* sql_next;\n");
    out.push_str("    sqlite3_stmt* stmt;\n\n");
    out.push_str("    sql_len = (int)strlen(sql);\n\n");
    out.push_str("next_step:\n");
    out.push_str("    ret = sqlite3_prepare_v2(db, sql, sql_len, &stmt, &sql_next);\n");
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!(
        "        {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(db));\n"
    ));
    out.push_str("        goto prepare_failed;\n    }\n\n");
    out.push_str("retry_step:\n");
    out.push_str("    switch (ret = sqlite3_step(stmt))\n    {\n");
    out.push_str("        case SQLITE_BUSY: goto retry_step;\n");
    out.push_str("        case SQLITE_ROW:\n");
    out.push_str("        case SQLITE_DONE:\n");
    out.push_str("            sql_len -= (int)(sql_next - sql);\n");
    out.push_str("            sql = sql_next;\n");
    out.push_str("            for (; sql_len && isspace(*sql); ++sql, --sql_len) {}\n");
    out.push_str("            if (sql_len <= 0)\n                break;\n");
    out.push_str("            sqlite3_finalize(stmt);\n");
    out.push_str("            goto next_step;\n");
    out.push_str("        default:\n");
    out.push_str(&format!(
        "            {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(db));\n"
    ));
    out.push_str("            goto exec_failed;\n    }\n\n");
    out.push_str("    sqlite3_finalize(stmt);\n");
    out.push_str("    return 0;\n\n");
    out.push_str("exec_failed:\n    sqlite3_finalize(stmt);\n");
    out.push_str("prepare_failed:\n    return -1;\n");
    out.push_str("}\n\n");
}

fn write_version_fn(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let log = root.options.log_sql_err(src);

    out.push_str(&format!(
        "static int {prefix}_version(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str("    int ret, version = 0;\n");
    out.push_str("    sqlite3_stmt* stmt;\n\n");
    out.push_str(
        "    ret = sqlite3_prepare_v2(ctx->db, \"PRAGMA user_version;\", -1, &stmt, NULL);\n",
    );
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!(
        "        {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str("        return -1;\n    }\n\n");
    out.push_str("    ret = sqlite3_step(stmt);\n");
    out.push_str("    if (ret != SQLITE_ROW)\n    {\n");
    out.push_str(&format!(
        "        {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));\n"
    ));
    out.push_str("        sqlite3_finalize(stmt);\n");
    out.push_str("        return -1;\n    }\n\n");
    out.push_str("    version = sqlite3_column_int(stmt, 0);\n");
    out.push_str("    sqlite3_finalize(stmt);\n");
    out.push_str("    return version;\n");
    out.push_str("}\n\n");
}

/// Runs downgrade SQL stored by a newer schema so an older binary can
/// still reduce the database to a version it knows.
fn write_forward_compat(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let log = root.options.log_sql_err(src);

    out.push_str(&format!(
        "static int {prefix}_downgrade_forward_compat(sqlite3* db)\n{{\n"
    ));
    out.push_str("    int ret, i;\n");
    out.push_str("    sqlite3_stmt* stmt;\n");
    out.push_str("    const char* str;\n");
    out.push_str("    void* tmp;\n");
    out.push_str("    char** sql = NULL;\n");
    out.push_str("    int sql_num = 0;\n");
    out.push_str("    int success = -1;\n");
    out.push_str(&format!(
        "    ret = sqlite3_prepare_v2(db, \"SELECT sql FROM {prefix}_downgrades WHERE version >= {} ORDER BY version DESC;\", -1, &stmt, NULL);\n",
        root.forward_compat_base()
    ));
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!(
        "        {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(db));\n"
    ));
    out.push_str("        return -1;\n    }\n\n");
    out.push_str("next_step:\n");
    out.push_str("    ret = sqlite3_step(stmt);\n");
    out.push_str("    switch (ret)\n    {\n");
    out.push_str("        case SQLITE_ROW:\n");
    out.push_str("            tmp = realloc(sql, sizeof(char*) * (sql_num + 1));\n");
    out.push_str("            if (tmp == NULL) goto done;\n");
    out.push_str("            sql = tmp;\n\n");
    out.push_str("            str = (const char*)sqlite3_column_text(stmt, 0);\n");
    out.push_str("            sql[sql_num] = malloc(strlen(str) + 1);\n");
    out.push_str("            if (sql[sql_num] == NULL) goto done;\n");
    out.push_str("            strcpy(sql[sql_num++], str);\n\n");
    out.push_str("            goto next_step;\n");
    out.push_str("        case SQLITE_BUSY: goto next_step;\n");
    out.push_str("        case SQLITE_DONE:\n");
    out.push_str("            for (i = 0; i != sql_num; ++i)\n            {\n");
    out.push_str("                if (run_sqlite3_sql(db, sql[i]) != 0)\n");
    out.push_str("                    goto done;\n            }\n");
    out.push_str("            success = 0;\n");
    out.push_str("            goto done;\n");
    out.push_str("    }\n\n");
    out.push_str(&format!(
        "    {log}(ret, sqlite3_errstr(ret), sqlite3_errmsg(db));\n"
    ));
    out.push_str("done:\n");
    out.push_str("    for (i = 0; i != sql_num; ++i)\n");
    out.push_str("        if (sql[i])\n");
    out.push_str("            free(sql[i]);\n");
    out.push_str("    if (sql)\n");
    out.push_str("        free(sql);\n");
    out.push_str("    sqlite3_reset(stmt);\n");
    out.push_str("    return success;\n");
    out.push_str("}\n\n");
}

/// Escapes downgrade SQL for storage: quotes doubled for the SQL
/// string, quotes and backslashes escaped again for the surrounding C
/// literal, newlines kept as `\n` escapes.
fn snapshot_escape(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for c in sql.chars() {
        match c {
            '\'' => out.push_str("''"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\r' => {}
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// The shared body of `migrate_to` and `reinit`: a transaction around
/// a downgrade ladder and an upgrade ladder keyed by the current
/// version. `reinit` omits the target-equality short-circuits and
/// forces a full downgrade-then-upgrade cycle.
fn write_migration_body(out: &mut String, root: &Root, src: &str, reinit: bool) {
    let prefix = root.options.prefix(src);
    let log = root.options.log_sql_err(src);
    let log_err = root.options.log_err(src);
    let forwards_compat = !root.flags.no_forwards_compat;
    let max_version = root.max_version();

    out.push_str("    int ret;\n");
    out.push_str("    int version;\n");
    out.push_str("    char* error;\n");
    if !reinit {
        out.push_str("    char buf[sizeof(\"PRAGMA user_version=+2147483648;\")];\n\n");
        // An unknown target must fail before anything is touched.
        out.push_str(&format!(
            "    if (target_version < 0 || target_version > {max_version})\n    {{\n"
        ));
        out.push_str(&format!(
            "        {log_err}(\"Failed to migrate db: Unknown version %d\\n\", target_version);\n"
        ));
        out.push_str("        return -1;\n    }\n\n");
    }

    out.push_str(&format!("    version = {prefix}_version(ctx);\n"));
    out.push_str("    if (version < 0)\n        return -1;\n\n");

    out.push_str("    ret = sqlite3_exec(ctx->db, \"BEGIN TRANSACTION;\", NULL, NULL, &error);\n");
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!("        {log}(ret, error, sqlite3_errmsg(ctx->db));\n"));
    out.push_str("        sqlite3_free(error);\n");
    out.push_str("        return -1;\n    }\n\n");

    // Downgrade ladder. A version newer than every known migration
    // either fails or is reduced through the stored downgrades first.
    out.push_str("    switch (version)\n    {\n");
    out.push_str("        default:\n");
    if forwards_compat {
        out.push_str(&format!(
            "            if ({prefix}_downgrade_forward_compat(ctx->db) != 0)\n"
        ));
        out.push_str("                goto migration_failed;\n");
        out.push_str(&format!(
            "            version = {};\n",
            root.forward_compat_base()
        ));
    } else {
        out.push_str(&format!(
            "            {log_err}(\"Database was created by a newer version of the software! \
             Can't downgrade, because forwards compatibility was disabled in querygen.\");\n"
        ));
        out.push_str("            goto migration_failed;\n");
    }
    for migration in &root.downgrades {
        out.push_str(&format!("        case {}:\n", migration.version + 1));
        if !reinit {
            out.push_str("            if (version == target_version)\n                break;\n");
        }
        out.push_str(&format!(
            "            if (run_sqlite3_sql(ctx->db, {prefix}_downgrade{}) != 0)\n",
            migration.version
        ));
        out.push_str("                goto migration_failed;\n");
        if forwards_compat && migration.version == 0 {
            out.push_str(&format!(
                "            if (run_sqlite3_sql(ctx->db, \"DROP TABLE IF EXISTS {prefix}_downgrades;\") != 0)\n"
            ));
            out.push_str("                goto migration_failed;\n");
        }
        out.push_str(&format!("            version = {};\n", migration.version));
    }
    out.push_str("        case 0:\n            break;\n    }\n\n");

    // Upgrade ladder.
    out.push_str("    switch (version)\n    {\n");
    for migration in &root.upgrades {
        out.push_str(&format!("        case {}:\n", migration.version - 1));
        if !reinit {
            out.push_str("            if (version == target_version)\n                break;\n");
        }
        if forwards_compat && migration.version == 1 {
            write_snapshot_seed(out, root, src);
        }
        out.push_str(&format!(
            "            if (run_sqlite3_sql(ctx->db, {prefix}_upgrade{}) != 0)\n",
            migration.version
        ));
        out.push_str("                goto migration_failed;\n");
        out.push_str(&format!("            version = {};\n", migration.version));
    }
    out.push_str(&format!("        case {max_version}: break;\n"));
    out.push_str("        default:\n");
    out.push_str(&format!(
        "            {log_err}(\"Failed to upgrade db: Unknown version %d\\n\", version);\n"
    ));
    out.push_str("            goto migration_failed;\n    }\n\n");

    if reinit {
        out.push_str(&format!(
            "    ret = sqlite3_exec(ctx->db, \"PRAGMA user_version={max_version};\", NULL, NULL, &error);\n"
        ));
    } else {
        out.push_str("    sprintf(buf, \"PRAGMA user_version=%d;\", target_version);\n");
        out.push_str("    ret = sqlite3_exec(ctx->db, buf, NULL, NULL, &error);\n");
    }
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!("        {log}(ret, error, sqlite3_errmsg(ctx->db));\n"));
    out.push_str("        sqlite3_free(error);\n");
    out.push_str("        goto migration_failed;\n    }\n\n");

    out.push_str("    ret = sqlite3_exec(ctx->db, \"COMMIT TRANSACTION;\", NULL, NULL, &error);\n");
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!("        {log}(ret, error, sqlite3_errmsg(ctx->db));\n"));
    out.push_str("        sqlite3_free(error);\n");
    out.push_str("        goto migration_failed;\n    }\n\n");

    out.push_str("    return 0;\n\n");
    out.push_str("migration_failed:\n");
    out.push_str("    ret = sqlite3_exec(ctx->db, \"ROLLBACK TRANSACTION;\", NULL, NULL, &error);\n");
    out.push_str("    if (ret != SQLITE_OK)\n    {\n");
    out.push_str(&format!("        {log}(ret, error, sqlite3_errmsg(ctx->db));\n"));
    out.push_str("        sqlite3_free(error);\n    }\n");
    out.push_str("    return -1;\n");
}

/// Emitted into the first upgrade: creates the downgrades table and
/// stores every known downgrade so newer schemas stay reducible by
/// older binaries.
fn write_snapshot_seed(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);

    out.push_str("            if (run_sqlite3_sql(ctx->db,\n");
    out.push_str(&format!(
        "                \"CREATE TABLE IF NOT EXISTS {prefix}_downgrades (\\n\"\n"
    ));
    out.push_str("                \"    version INTEGER PRIMARY KEY NOT NULL,\\n\"\n");
    out.push_str("                \"    sql TEXT NOT NULL);\\n\"\n");
    for migration in &root.downgrades {
        out.push_str(&format!(
            "                \"INSERT OR IGNORE INTO {prefix}_downgrades (version, sql) VALUES ({}, '{}');\\n\"\n",
            migration.version,
            snapshot_escape(migration.sql.text(src))
        ));
    }
    out.push_str("                ) != 0)\n");
    out.push_str("                goto migration_failed;\n");
}

// ================================================================
// Interface records, debug layer, API
// ================================================================

fn write_interface(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);

    out.push_str(&format!(
        "static struct {prefix}_interface db_sqlite3 = {{\n"
    ));
    out.push_str(&format!("    {prefix}_open,\n"));
    out.push_str(&format!("    {prefix}_close,\n"));
    out.push_str(&format!("    {prefix}_version,\n"));
    out.push_str(&format!("    {prefix}_upgrade,\n"));
    out.push_str(&format!("    {prefix}_reinit,\n"));
    out.push_str(&format!("    {prefix}_migrate_to,\n"));
    for query in &root.queries {
        out.push_str(&format!("    {},\n", query.name.text(src)));
    }
    for function in &root.functions {
        out.push_str(&format!("    {},\n", function.name.text(src)));
    }
    for group in &root.groups {
        out.push_str("    {\n");
        for query in &group.queries {
            out.push_str(&format!(
                "        {}_{},\n",
                group.name.text(src),
                query.name.text(src)
            ));
        }
        for function in &group.functions {
            out.push_str(&format!(
                "        {}_{},\n",
                group.name.text(src),
                function.name.text(src)
            ));
        }
        out.push_str("    },\n");
    }
    out.push_str("};\n\n");
}

fn write_debug_layer(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let log_dbg = root.options.log_dbg(src);

    for query in &root.queries {
        write_debug_wrapper(out, root, None, query, src);
    }
    for group in &root.groups {
        for query in &group.queries {
            write_debug_wrapper(out, root, Some(group), query, src);
        }
    }

    out.push_str(&format!(
        "static struct {prefix}* dbg_{prefix}_open(const char* uri)\n{{\n"
    ));
    out.push_str(&format!("    struct {prefix}* ctx;\n"));
    out.push_str(&format!(
        "    {log_dbg}(\"Opening database \\\"%s\\\"\\n\", uri);\n"
    ));
    out.push_str("    ctx = db_sqlite3.open(uri);\n");
    out.push_str(&format!("    {log_dbg}(\"retval=%p\\n\", ctx);\n"));
    out.push_str("    return ctx;\n}\n\n");

    out.push_str(&format!(
        "static void dbg_{prefix}_close(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str(&format!("    {log_dbg}(\"Closing database\\n\");\n"));
    out.push_str("    db_sqlite3.close(ctx);\n}\n\n");

    out.push_str(&format!(
        "static int dbg_{prefix}_version(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str("    int version;\n");
    out.push_str(&format!("    {log_dbg}(\"Getting version...\\n\");\n"));
    out.push_str("    version = db_sqlite3.version(ctx);\n");
    out.push_str(&format!("    {log_dbg}(\"retval=%d\\n\", version);\n"));
    out.push_str("    return version;\n}\n\n");

    out.push_str(&format!(
        "static int dbg_{prefix}_upgrade(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str("    int ret;\n");
    out.push_str(&format!("    {log_dbg}(\"Upgrading db...\\n\");\n"));
    out.push_str("    ret = db_sqlite3.upgrade(ctx);\n");
    out.push_str(&format!("    {log_dbg}(\"retval=%d\\n\", ret);\n"));
    out.push_str("    return ret;\n}\n\n");

    out.push_str(&format!(
        "static int dbg_{prefix}_reinit(struct {prefix}* ctx)\n{{\n"
    ));
    out.push_str("    int ret;\n");
    out.push_str(&format!("    {log_dbg}(\"Re-initializing db...\\n\");\n"));
    out.push_str("    ret = db_sqlite3.reinit(ctx);\n");
    out.push_str(&format!("    {log_dbg}(\"retval=%d\\n\", ret);\n"));
    out.push_str("    return ret;\n}\n\n");

    out.push_str(&format!(
        "static int dbg_{prefix}_migrate_to(struct {prefix}* ctx, int target_version)\n{{\n"
    ));
    out.push_str("    int ret;\n");
    out.push_str(&format!(
        "    {log_dbg}(\"Migrating db to version: %d...\\n\", target_version);\n"
    ));
    out.push_str("    ret = db_sqlite3.migrate_to(ctx, target_version);\n");
    out.push_str(&format!("    {log_dbg}(\"retval=%d\\n\", ret);\n"));
    out.push_str("    return ret;\n}\n\n");

    // The debug record mirrors the primary record's member order.
    out.push_str(&format!(
        "static struct {prefix}_interface dbg_db_sqlite3 = {{\n"
    ));
    out.push_str(&format!("    dbg_{prefix}_open,\n"));
    out.push_str(&format!("    dbg_{prefix}_close,\n"));
    out.push_str(&format!("    dbg_{prefix}_version,\n"));
    out.push_str(&format!("    dbg_{prefix}_upgrade,\n"));
    out.push_str(&format!("    dbg_{prefix}_reinit,\n"));
    out.push_str(&format!("    dbg_{prefix}_migrate_to,\n"));
    for query in &root.queries {
        out.push_str(&format!("    dbg_{},\n", query.name.text(src)));
    }
    for function in &root.functions {
        out.push_str(&format!("    {},\n", function.name.text(src)));
    }
    for group in &root.groups {
        out.push_str("    {\n");
        for query in &group.queries {
            out.push_str(&format!(
                "        dbg_{}_{},\n",
                group.name.text(src),
                query.name.text(src)
            ));
        }
        for function in &group.functions {
            out.push_str(&format!(
                "        {}_{},\n",
                group.name.text(src),
                function.name.text(src)
            ));
        }
        out.push_str("    },\n");
    }
    out.push_str("};\n\n");
}

fn write_debug_wrapper(out: &mut String, root: &Root, group: Option<&Group>, query: &Query, src: &str) {
    let fname = c_name(group, query, src);
    let log_dbg = root.options.log_dbg(src);
    let has_cb = !query.cb_args.is_empty();
    let qualified = match group {
        Some(group) => format!("{}.{}", group.name.text(src), query.name.text(src)),
        None => query.name.text(src).to_string(),
    };

    if has_cb {
        // Shim that logs each row before forwarding to the real
        // callback carried through user_data.
        out.push_str(&format!("static int\ndbg_{fname}_on_row("));
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{} {}", arg.ty.text(src), arg.name.text(src)));
        }
        out.push_str(", void* user_data)\n{\n");
        out.push_str("    void** dbg = user_data;\n");

        out.push_str(&format!("    {log_dbg}(\"  "));
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(if arg.ty.text(src) == "const char*" {
                "\\\"%s\\\""
            } else {
                "%d"
            });
        }
        out.push_str("\\n\", ");
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if arg.ty.text(src) != "const char*" {
                out.push_str("(int)");
            }
            out.push_str(arg.name.text(src));
        }
        out.push_str(");\n");

        out.push_str("    return (*(int(*)(");
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(arg.ty.text(src));
        }
        out.push_str(",void*))dbg[0])(");
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(arg.name.text(src));
        }
        out.push_str(", dbg[1]);\n}\n");
    }

    out.push_str(&format!(
        "static int\ndbg_{fname}({})\n{{\n",
        param_list(root, query, src)
    ));
    out.push_str("    int result;\n");
    out.push_str("    char* sql;\n");
    if has_cb {
        out.push_str("    void* dbg[2] = { (void*)on_row, user_data };\n");
    }

    out.push_str(&format!("    {log_dbg}(\"db_sqlite3.{qualified}("));
    for (i, arg) in query.in_args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(match arg.ty.text(src) {
            "const char*" => "\\\"%s\\\"",
            "struct str_view" => "\\\"%.*s\\\"",
            "int64_t" => "%\" PRIi64\"",
            "uint64_t" => "%\" PRIu64\"",
            _ => "%d",
        });
    }
    out.push_str(")\\n\"");
    if !query.in_args.is_empty() {
        out.push_str(", ");
    }
    for (i, arg) in query.in_args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let name = arg.name.text(src);
        match arg.ty.text(src) {
            "const char*" | "int64_t" | "uint64_t" => out.push_str(name),
            "struct str_view" => out.push_str(&format!("{name}.len, {name}.data")),
            _ => out.push_str(&format!("(int){name}")),
        }
    }
    out.push_str(");\n");

    if has_cb {
        out.push_str(&format!("    {log_dbg}(\"  "));
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(arg.name.text(src));
        }
        out.push_str("\\n\");\n");
    }

    out.push_str(&format!("    result = db_sqlite3.{qualified}(ctx"));
    for arg in &query.in_args {
        out.push_str(&format!(", {}", arg.name.text(src)));
    }
    if has_cb {
        out.push_str(&format!(", dbg_{fname}_on_row, dbg"));
    }
    out.push_str(");\n");

    out.push_str(&format!("    sql = sqlite3_expanded_sql(ctx->{fname});\n"));
    out.push_str(&format!(
        "    {log_dbg}(\"retval=%d\\n%s\\n\\n\", result, sql);\n"
    ));
    out.push_str("    sqlite3_free(sql);\n");
    out.push_str("    return result;\n}\n\n");
}

fn write_api(out: &mut String, root: &Root, src: &str) {
    let prefix = root.options.prefix(src);
    let log_err = root.options.log_err(src);

    if !root.flags.custom_init {
        out.push_str(&format!("int\n{prefix}_init(void)\n{{\n"));
        out.push_str("    if (sqlite3_initialize() != SQLITE_OK)\n        return -1;\n");
        out.push_str("    return 0;\n}\n\n");
    }

    if !root.flags.custom_deinit {
        out.push_str(&format!("void\n{prefix}_deinit(void)\n{{\n"));
        out.push_str("    sqlite3_shutdown();\n}\n\n");
    }

    if !root.flags.custom_api {
        out.push_str(&format!(
            "struct {prefix}_interface* {prefix}(const char* backend)\n{{\n"
        ));
        out.push_str("    if (strcmp(\"sqlite3\", backend) == 0)\n");
        out.push_str(&format!(
            "        return &{}db_sqlite3;\n",
            if root.flags.debug_layer { "dbg_" } else { "" }
        ));
        out.push_str(&format!(
            "    {log_err}(\"{prefix}(): Unknown backend \\\"%s\\\"\", backend);\n"
        ));
        out.push_str("    return NULL;\n}\n");
    }
}
