//! Code emission.
//!
//! Produces the two generated artifacts: the public header (the
//! interface of function pointers grouped by namespace) and the
//! implementation source (statement lifecycle, migrations, optional
//! instrumentation, backend dispatcher).

mod header;
mod source;
mod text;
mod types;

pub use header::generate_header;
pub use source::generate_source;

use crate::ir::{Group, Query, Root};

/// The C symbol for a query implementation: `queryname` at top level,
/// `groupname_queryname` inside a group. Also names the cached
/// statement handle on the context struct.
pub(crate) fn c_name(group: Option<&Group>, query: &Query, src: &str) -> String {
    match group {
        Some(group) => format!("{}_{}", group.name.text(src), query.name.text(src)),
        None => query.name.text(src).to_string(),
    }
}

/// The parameter list shared by a query's implementation, its function
/// pointer and its debug wrapper: the context, every input argument,
/// and the row callback pair when the query has callback columns.
pub(crate) fn param_list(root: &Root, query: &Query, src: &str) -> String {
    let prefix = root.options.prefix(src);
    let mut out = format!("struct {prefix}* ctx");
    for arg in &query.in_args {
        out.push_str(&format!(", {} {}", arg.ty.text(src), arg.name.text(src)));
    }
    if !query.cb_args.is_empty() {
        out.push_str(", int (*on_row)(");
        for (i, arg) in query.cb_args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{} {}", arg.ty.text(src), arg.name.text(src)));
        }
        out.push_str(", void* user_data), void* user_data");
    }
    out
}
