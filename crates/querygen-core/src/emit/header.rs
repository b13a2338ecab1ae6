//! Header (declaration) stream emission.
//!
//! The header declares the opaque context struct and the interface
//! record of function pointers: the fixed lifecycle and migration
//! entries, top-level queries and functions, then one nested record
//! per query group.

use super::text::reindent;
use super::param_list;
use crate::ir::{Function, Root};

const OPEN_DOC: &str = "/*!
 * \\brief Open a database connection. Must be closed again after use.
 * \\param[in] uri A file path to a database file.
 * \\return If successful, the database connection is returned, which can be used
 * for all future queries.
 */";

const CLOSE_DOC: &str = "/*!
 * \\brief Closes the database connection.
 * \\param[in] ctx Connection returned from the call to open().
 */";

const VERSION_DOC: &str = "/*!
 * \\brief Gets the current version of the database.
 * A new, empty database will always have a version of 0. Calling upgrade()
 * may change the version if a migration occurs.
 */";

const UPGRADE_DOC: &str = "/*!
 * \\brief Migrates the database to the newest version.
 * \\return 0 on success, negative on error. If an error occurs, the database
 * is rolled back to the state prior to calling this function.
 */";

const REINIT_DOC: &str = "/*!
 * \\brief Fully downgrades the database, and then upgrades it again.
 * This function is often useful during development.
 * \\warning This will wipe all data in the database!
 */";

const MIGRATE_TO_DOC: &str = "/*!
 * \\brief Migrates the database to a specific version.
 * The version can older or newer than the current state of the database.
 */";

/// Generates the declaration stream.
#[must_use]
pub fn generate_header(root: &Root, src: &str) -> String {
    let prefix = root.options.prefix(src);
    let mut out = String::new();

    if let Some(preamble) = root.options.header_preamble {
        out.push_str(&format!("\n{}\n", preamble.text(src)));
    }

    out.push_str(&format!("struct {prefix};\n"));
    out.push_str(&format!("struct {prefix}_interface\n{{\n"));

    out.push_str(&reindent(OPEN_DOC, 4));
    out.push_str(&format!("    struct {prefix}* (*open)(const char* uri);\n"));
    out.push_str(&reindent(CLOSE_DOC, 4));
    out.push_str(&format!("    void (*close)(struct {prefix}* ctx);\n"));
    out.push_str(&reindent(VERSION_DOC, 4));
    out.push_str(&format!("    int (*version)(struct {prefix}* ctx);\n"));
    out.push_str(&reindent(UPGRADE_DOC, 4));
    out.push_str(&format!("    int (*upgrade)(struct {prefix}* ctx);\n"));
    out.push_str(&reindent(REINIT_DOC, 4));
    out.push_str(&format!("    int (*reinit)(struct {prefix}* ctx);\n"));
    out.push_str(&reindent(MIGRATE_TO_DOC, 4));
    out.push_str(&format!(
        "    int (*migrate_to)(struct {prefix}* ctx, int target_version);\n"
    ));

    for query in &root.queries {
        out.push_str(&format!(
            "    int (*{})({});\n",
            query.name.text(src),
            param_list(root, query, src)
        ));
    }
    out.push('\n');

    for function in &root.functions {
        write_function_ptr(&mut out, root, function, 4, src);
    }

    for group in &root.groups {
        out.push_str("    struct {\n");
        for query in &group.queries {
            if let Some(doc) = query.doxygen {
                out.push_str(&reindent(doc.text(src), 8));
            }
            out.push_str(&format!(
                "        int (*{})({});\n",
                query.name.text(src),
                param_list(root, query, src)
            ));
        }
        for function in &group.functions {
            write_function_ptr(&mut out, root, function, 8, src);
        }
        out.push_str(&format!("    }} {};\n\n", group.name.text(src)));
    }

    out.push_str("};\n\n");

    if !root.flags.custom_init_decl {
        out.push_str(&format!("int {prefix}_init(void);\n"));
    }
    if !root.flags.custom_deinit_decl {
        out.push_str(&format!("void {prefix}_deinit(void);\n"));
    }
    if !root.flags.custom_api_decl {
        out.push_str(&format!(
            "struct {prefix}_interface* {prefix}(const char* backend);\n"
        ));
    }

    if let Some(postamble) = root.options.header_postamble {
        out.push_str(&format!("\n{}\n", postamble.text(src)));
    }

    out
}

fn write_function_ptr(out: &mut String, root: &Root, function: &Function, indent: usize, src: &str) {
    let prefix = root.options.prefix(src);
    out.push_str(&" ".repeat(indent));
    out.push_str(&format!(
        "int (*{})(struct {prefix}* ctx",
        function.name.text(src)
    ));
    for arg in &function.args {
        out.push_str(&format!(", {} {}", arg.ty.text(src), arg.name.text(src)));
    }
    out.push_str(");\n");
}
