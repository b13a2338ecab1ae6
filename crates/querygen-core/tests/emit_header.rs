//! Header emission tests.

mod common;
use common::*;

#[test]
fn interface_fixed_entries_in_order() {
    let text = header("");
    assert!(text.contains("struct querygen;"));
    assert!(text.contains("struct querygen_interface\n{"));

    let open = text.find("(*open)").unwrap();
    let close = text.find("(*close)").unwrap();
    let version = text.find("(*version)").unwrap();
    let upgrade = text.find("(*upgrade)").unwrap();
    let reinit = text.find("(*reinit)").unwrap();
    let migrate_to = text.find("(*migrate_to)").unwrap();
    assert!(open < close && close < version && version < upgrade);
    assert!(upgrade < reinit && reinit < migrate_to);

    assert!(text.contains("struct querygen* (*open)(const char* uri);"));
    assert!(text.contains("int (*migrate_to)(struct querygen* ctx, int target_version);"));
}

#[test]
fn fixed_entries_carry_documentation() {
    let text = header("");
    assert!(text.contains("\\brief Open a database connection."));
    assert!(text.contains("\\warning This will wipe all data in the database!"));
}

#[test]
fn prefix_option_renames_everything() {
    let text = header("%option prefix = \"mydb\"");
    assert!(text.contains("struct mydb;"));
    assert!(text.contains("struct mydb_interface"));
    assert!(text.contains("int mydb_init(void);"));
    assert!(text.contains("struct mydb_interface* mydb(const char* backend);"));
}

#[test]
fn query_pointer_signature() {
    let text = header(
        "%query get_pets(const char* owner) {
            type select-all
            table pets
            callback const char* name, const char* food
        }",
    );
    assert!(text.contains(
        "    int (*get_pets)(struct querygen* ctx, const char* owner, \
         int (*on_row)(const char* name, const char* food, void* user_data), void* user_data);"
    ));
}

#[test]
fn grouped_queries_become_nested_records() {
    let text = header(
        "%query valid,exists(const char* name) { type exists table people }
         %function valid,wipe(int hard) { return 0; }",
    );
    assert!(text.contains("    struct {\n"));
    assert!(text.contains("        int (*exists)(struct querygen* ctx, const char* name);"));
    assert!(text.contains("        int (*wipe)(struct querygen* ctx, int hard);"));
    assert!(text.contains("    } valid;\n"));
}

#[test]
fn grouped_query_doc_block_is_reemitted() {
    let text = header(
        "%query valid,exists(const char* name) {
            /*!
             * \\brief True when a row with this name exists.
             */
            type exists
            table people
        }",
    );
    assert!(text.contains("        /*!\n"));
    assert!(text.contains("         * \\brief True when a row with this name exists.\n"));
}

#[test]
fn custom_decl_flags_suppress_api_declarations() {
    let text = header(
        "%option custom-init-decl
         %option custom-deinit-decl
         %option custom-api-decl",
    );
    assert!(!text.contains("querygen_init"));
    assert!(!text.contains("querygen_deinit"));
    assert!(!text.contains("querygen(const char* backend)"));
}

#[test]
fn preamble_and_postamble_are_verbatim() {
    let text = header(
        "%header-preamble {
            #pragma once
            #include <stdint.h>
        }
        %header-postamble {
            /* end of header */
        }",
    );
    assert!(text.starts_with("\n#pragma once"));
    assert!(text.contains("#include <stdint.h>"));
    assert!(text.trim_end().ends_with("/* end of header */"));
}
