//! Source emission tests: statement lifecycle, bind dispatch, step
//! loops, user functions, interface records and the debug layer.

mod common;
use common::*;

const EXISTS_GROUPED: &str = "%query valid,exists(const char* name) {
    type exists
    table people
}";

#[test]
fn fixed_includes_and_context_struct() {
    let text = source(EXISTS_GROUPED);
    assert!(text.contains("#include <ctype.h>\n#include <stdlib.h>\n#include <string.h>\n#include <stdio.h>\n"));
    assert!(text.contains("struct querygen\n{\n    sqlite3* db;\n    sqlite3_stmt* valid_exists;\n};"));
}

#[test]
fn source_includes_come_first() {
    let text = source("%source-includes { #include \"db.h\" }");
    assert!(text.starts_with("\n#include \"db.h\"\n"));
}

#[test]
fn default_sql_logger_is_emitted_unless_overridden() {
    let text = source("");
    assert!(text.contains("static void\nquerygen_error(int error_code, const char* error_code_str, const char* error_msg)"));
    assert!(text.contains("printf(\"SQL Error: %s (%d): %s\\n\""));

    let text = source("%option log-sql-error = \"my_logger\"");
    assert!(!text.contains("querygen_error"));
    assert!(text.contains("my_logger(ret, sqlite3_errstr(ret), sqlite3_errmsg(ctx->db));"));
}

#[test]
fn lazy_prepare_with_rendered_sql() {
    let text = source(EXISTS_GROUPED);
    assert!(text.contains("    if (ctx->valid_exists == NULL)\n"));
    assert!(text.contains("        if ((ret = sqlite3_prepare_v2(ctx->db,\n"));
    assert!(text.contains("            \"SELECT 1 FROM people WHERE name=? LIMIT 1;\",\n"));
    assert!(text.contains("            -1, &ctx->valid_exists, NULL)) != SQLITE_OK)"));
}

#[test]
fn bind_dispatch_per_recognized_type() {
    let text = source(
        "%query put(const char* name, struct str_view tag, uint32_t age, int64_t ts) {
            type insert
            table people
        }",
    );
    assert!(text.contains("(ret = sqlite3_bind_text(ctx->put, 1, name, -1, SQLITE_STATIC)) != SQLITE_OK"));
    assert!(text.contains("(ret = sqlite3_bind_text(ctx->put, 2, tag.data, tag.len, SQLITE_STATIC)) != SQLITE_OK"));
    assert!(text.contains("(ret = sqlite3_bind_int(ctx->put, 3, (int)age)) != SQLITE_OK"));
    assert!(text.contains("(ret = sqlite3_bind_int64(ctx->put, 4, ts)) != SQLITE_OK"));
}

#[test]
fn nullable_arguments_bind_null_on_sentinel() {
    let text = source(
        "%query put(const char* name null, int age null, uint32_t flags null) {
            type insert
            table people
        }",
    );
    assert!(text.contains("name == NULL ? sqlite3_bind_null(ctx->put, 1) : sqlite3_bind_text"));
    assert!(text.contains("age < 0 ? sqlite3_bind_null(ctx->put, 2) : sqlite3_bind_int"));
    assert!(text.contains("flags == (uint32_t)-1 ? sqlite3_bind_null(ctx->put, 3) : sqlite3_bind_int"));
}

#[test]
fn update_binds_set_columns_before_filters() {
    let text = source(
        "%query update_age(const char* name, int age) {
            type update age
            table people
        }",
    );
    // age feeds the SET placeholder (index 1), name the WHERE (index 2).
    assert!(text.contains("sqlite3_bind_int(ctx->update_age, 1, age)"));
    assert!(text.contains("sqlite3_bind_text(ctx->update_age, 2, name, -1, SQLITE_STATIC)"));
}

#[test]
fn exists_step_loop() {
    let text = source(EXISTS_GROUPED);
    assert!(text.contains("next_step:\n    ret = sqlite3_step(ctx->valid_exists);"));
    assert!(text.contains("        case SQLITE_BUSY: goto next_step;\n"));
    assert!(text.contains("        case SQLITE_ROW:\n            sqlite3_reset(ctx->valid_exists);\n            return 1;\n"));
    assert!(text.contains("        case SQLITE_DONE:\n            sqlite3_reset(ctx->valid_exists);\n            return 0;\n"));
}

#[test]
fn plain_insert_returns_zero_on_done() {
    let text = source("%query add(const char* name) { type insert table people }");
    assert!(text.contains("        case SQLITE_DONE:\n            sqlite3_reset(ctx->add);\n            return 0;\n"));
    assert!(!text.contains("case SQLITE_ROW:\n            ret = on_row"));
}

#[test]
fn scalar_return_captures_column_zero() {
    let text = source(
        "%query add(const char* name, int age) {
            type insert
            table people
            return id
        }",
    );
    assert!(text.contains("    int ret, id = -1;\n"));
    assert!(text.contains("            id = sqlite3_column_int(ctx->add, 0);\n"));
    // No matching row leaves the initial -1 in place.
    assert!(text.contains("        case SQLITE_DONE:\n            sqlite3_reset(ctx->add);\n            return id;\n"));
}

#[test]
fn callback_columns_offset_past_scalar_return() {
    let text = source(
        "%query add(const char* name, int age) {
            type insert
            table people
            return id
            callback const char* name, int age null
        }",
    );
    assert!(text.contains("            ret = on_row(\n"));
    assert!(text.contains("                (const char*)sqlite3_column_text(ctx->add, 1),\n"));
    assert!(text.contains(
        "                sqlite3_column_type(ctx->add, 2) == SQLITE_NULL ? -1 : sqlite3_column_int(ctx->add, 2),\n"
    ));
    assert!(text.contains("                user_data);\n"));
    // A negative callback return wins over the captured scalar.
    assert!(text.contains("            if (ret < 0)\n            {\n                sqlite3_reset(ctx->add);\n                return -1;\n            }\n"));
    assert!(text.contains("            return id;\n"));
}

#[test]
fn callback_without_return_propagates_callback_value() {
    let text = source(
        "%query get(const char* name) {
            type select-first
            table people
            callback int id
        }",
    );
    assert!(text.contains("            sqlite3_reset(ctx->get);\n            return ret;\n"));
    // Without a matching row the function reports 0, not an error.
    assert!(text.contains("        case SQLITE_DONE:\n            sqlite3_reset(ctx->get);\n            return 0;\n"));
}

#[test]
fn select_all_continues_while_callback_returns_zero() {
    let text = source(
        "%query all() {
            type select-all
            table pets
            callback const char* name, const char* food
        }",
    );
    assert!(text.contains("            if (ret == 0) goto next_step;\n"));
    assert!(text.contains("            sqlite3_reset(ctx->all);\n            return ret;\n"));
    assert!(text.contains("        case SQLITE_DONE:\n            sqlite3_reset(ctx->all);\n            return 0;\n"));
}

#[test]
fn user_function_bodies_are_verbatim() {
    let text = source(
        "%function valid,wipe(int hard) {
    if (hard)
        return -1;
    return 0;
}",
    );
    assert!(text.contains("static int\nvalid_wipe(struct querygen* ctx, int hard)\n{\n"));
    assert!(text.contains("if (hard)\n        return -1;\n    return 0;"));
}

#[test]
fn open_uses_allocator_hooks() {
    let text = source("%option malloc = \"my_alloc\"\n%option free = \"my_free\"");
    assert!(text.contains("struct querygen* ctx = my_alloc(sizeof *ctx);"));
    assert!(text.contains("my_free(ctx);"));
    assert!(text.contains("sqlite3_open_v2(uri, &ctx->db, SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE, NULL);"));
}

#[test]
fn close_finalizes_every_statement() {
    let text = source(
        "%query top(int id) { type exists table t }
         %query grp,inner_one(int id) { type exists table t }",
    );
    assert!(text.contains("    sqlite3_finalize(ctx->top);\n"));
    assert!(text.contains("    sqlite3_finalize(ctx->grp_inner_one);\n"));
    assert!(text.contains("    sqlite3_close(ctx->db);\n"));
}

#[test]
fn interface_record_lists_declared_order() {
    let text = source(
        "%query top(int id) { type exists table t }
         %function helper(int x) { return 0; }
         %query grp,inner_one(int id) { type exists table t }
         %function grp,inner_fn(int x) { return 0; }",
    );
    let record = text
        .split("static struct querygen_interface db_sqlite3 = {")
        .nth(1)
        .and_then(|rest| rest.split("};").next())
        .expect("interface record");
    assert!(record.contains("    querygen_open,\n    querygen_close,\n    querygen_version,\n    querygen_upgrade,\n    querygen_reinit,\n    querygen_migrate_to,\n"));
    assert!(record.contains("    top,\n"));
    assert!(record.contains("    helper,\n"));
    assert!(record.contains("        grp_inner_one,\n        grp_inner_fn,\n"));
}

#[test]
fn dispatcher_selects_backend_by_name() {
    let text = source("");
    assert!(text.contains("struct querygen_interface* querygen(const char* backend)"));
    assert!(text.contains("    if (strcmp(\"sqlite3\", backend) == 0)\n        return &db_sqlite3;\n"));
    assert!(text.contains("querygen(): Unknown backend"));
}

#[test]
fn custom_flags_suppress_api_definitions() {
    let text = source("%option custom-init\n%option custom-deinit\n%option custom-api");
    assert!(!text.contains("querygen_init"));
    assert!(!text.contains("querygen_deinit"));
    assert!(!text.contains("querygen(const char* backend)"));
}

#[test]
fn debug_layer_wraps_queries_and_dispatch() {
    let text = source(
        "%option debug-layer
         %query valid,get(const char* name) {
            type select-first
            table people
            callback int id, const char* name
         }",
    );
    // Row shim logging each column before forwarding.
    assert!(text.contains("static int\ndbg_valid_get_on_row(int id, const char* name, void* user_data)"));
    assert!(text.contains("    void** dbg = user_data;\n"));
    assert!(text.contains("return (*(int(*)(int, const char*,void*))dbg[0])(id, name, dbg[1]);"));
    // Wrapper logging the call and the expanded statement.
    assert!(text.contains("static int\ndbg_valid_get(struct querygen* ctx, const char* name,"));
    assert!(text.contains("    void* dbg[2] = { (void*)on_row, user_data };\n"));
    assert!(text.contains("printf(\"db_sqlite3.valid.get(\\\"%s\\\")\\n\", name);"));
    assert!(text.contains("    result = db_sqlite3.valid.get(ctx, name, dbg_valid_get_on_row, dbg);\n"));
    assert!(text.contains("    sql = sqlite3_expanded_sql(ctx->valid_get);\n"));
    // Lifecycle wrappers and the parallel record.
    assert!(text.contains("static struct querygen* dbg_querygen_open(const char* uri)"));
    assert!(text.contains("static struct querygen_interface dbg_db_sqlite3 = {"));
    assert!(text.contains("        dbg_valid_get,\n"));
    // The dispatcher hands out the instrumented record.
    assert!(text.contains("        return &dbg_db_sqlite3;\n"));
}

#[test]
fn source_postamble_closes_the_stream() {
    let text = source("%source-postamble { /* done */ }");
    assert!(text.trim_end().ends_with("/* done */"));
}
