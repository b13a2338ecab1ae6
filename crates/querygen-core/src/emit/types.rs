//! Recognized argument types.
//!
//! The fixed table that drives bind and column code generation. There
//! is no type inference beyond this table; anything unrecognized binds
//! through the plain int family.

/// Backend dispatch for one argument type.
pub(crate) struct CType {
    /// `sqlite3_bind_*` / `sqlite3_column_*` suffix.
    pub sqlite: &'static str,
    /// Cast applied to the value when binding.
    pub bind_cast: &'static str,
    /// Cast applied to the value read from a column.
    pub column_cast: &'static str,
    /// Completes `<name> ...` when a nullable argument should bind
    /// NULL instead.
    pub null_cmp: &'static str,
    /// Value handed to the callback when a nullable column is NULL.
    pub null_value: &'static str,
}

pub(crate) fn c_type(ty: &str) -> CType {
    match ty {
        "int64_t" => CType {
            sqlite: "int64",
            bind_cast: "",
            column_cast: "",
            null_cmp: "< 0",
            null_value: "-1",
        },
        "uint64_t" => CType {
            sqlite: "int64",
            bind_cast: "(int64_t)",
            column_cast: "(uint64_t)",
            null_cmp: "== (uint64_t)-1",
            null_value: "(uint64_t)-1",
        },
        "uint32_t" => CType {
            sqlite: "int",
            bind_cast: "(int)",
            column_cast: "(uint32_t)",
            null_cmp: "== (uint32_t)-1",
            null_value: "(uint32_t)-1",
        },
        "uint16_t" => CType {
            sqlite: "int",
            bind_cast: "(int)",
            column_cast: "(uint16_t)",
            null_cmp: "== (uint16_t)-1",
            null_value: "(uint16_t)-1",
        },
        "const char*" | "struct str_view" => CType {
            sqlite: "text",
            bind_cast: "",
            column_cast: "(const char*)",
            null_cmp: "== NULL",
            null_value: "NULL",
        },
        _ => CType {
            sqlite: "int",
            bind_cast: "",
            column_cast: "",
            null_cmp: "< 0",
            null_value: "-1",
        },
    }
}
