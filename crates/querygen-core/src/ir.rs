//! Intermediate representation of a parsed definition file.
//!
//! All string-like fields are spans into the immutable definition
//! text. The [`Root`] owns every entity; it is built once by the
//! parser, extended once by [`normalize`], and consumed by the
//! emitter. Lookups are linear on purpose; inputs are small.

use crate::lexer::Span;

/// Default naming prefix for all generated symbols.
pub const DEFAULT_PREFIX: &str = "querygen";
/// Default allocator used by the generated `open`.
pub const DEFAULT_MALLOC: &str = "malloc";
/// Default deallocator used by the generated `open`/`close`.
pub const DEFAULT_FREE: &str = "free";
/// Default debug logging hook.
pub const DEFAULT_LOG_DBG: &str = "printf";
/// Default error logging hook.
pub const DEFAULT_LOG_ERR: &str = "printf";
/// Default SQL error hook; a definition of this function is emitted
/// into the source unless the hook is overridden.
pub const DEFAULT_LOG_SQL_ERR: &str = "querygen_error";

/// Root-level valued options and verbatim text blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub prefix: Option<Span>,
    pub malloc_fn: Option<Span>,
    pub free_fn: Option<Span>,
    pub log_dbg: Option<Span>,
    pub log_err: Option<Span>,
    pub log_sql_err: Option<Span>,
    pub header_preamble: Option<Span>,
    pub header_postamble: Option<Span>,
    pub source_includes: Option<Span>,
    pub source_preamble: Option<Span>,
    pub source_postamble: Option<Span>,
}

impl Options {
    fn resolve<'a>(span: Option<Span>, source: &'a str, default: &'a str) -> &'a str {
        match span {
            Some(span) if !span.is_empty() => span.text(source),
            _ => default,
        }
    }

    /// The naming prefix for generated symbols.
    #[must_use]
    pub fn prefix<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.prefix, source, DEFAULT_PREFIX)
    }

    /// Allocator called by the generated `open`.
    #[must_use]
    pub fn malloc_fn<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.malloc_fn, source, DEFAULT_MALLOC)
    }

    /// Deallocator called by the generated `open`/`close`.
    #[must_use]
    pub fn free_fn<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.free_fn, source, DEFAULT_FREE)
    }

    /// Debug logging hook used by the instrumentation layer.
    #[must_use]
    pub fn log_dbg<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.log_dbg, source, DEFAULT_LOG_DBG)
    }

    /// Error logging hook.
    #[must_use]
    pub fn log_err<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.log_err, source, DEFAULT_LOG_ERR)
    }

    /// SQL error logging hook.
    #[must_use]
    pub fn log_sql_err<'a>(&self, source: &'a str) -> &'a str {
        Self::resolve(self.log_sql_err, source, DEFAULT_LOG_SQL_ERR)
    }

    /// True when the default SQL error logger definition must be
    /// emitted into the source stream.
    #[must_use]
    pub fn uses_default_sql_logger(&self) -> bool {
        self.log_sql_err.map_or(true, |s| s.is_empty())
    }
}

/// Code-generation flags, settable from `%option` and the command
/// line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub debug_layer: bool,
    pub custom_init: bool,
    pub custom_init_decl: bool,
    pub custom_deinit: bool,
    pub custom_deinit_decl: bool,
    pub custom_api: bool,
    pub custom_api_decl: bool,
    pub no_forwards_compat: bool,
}

/// A typed argument. An argument is either an update target or a
/// filter key within the same UPDATE, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    pub ty: Span,
    pub name: Span,
    pub nullable: bool,
    pub update: bool,
}

/// A versioned migration SQL fragment.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub sql: Span,
}

/// Query kinds, each with its own statement template and result
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Insert,
    Update,
    Upsert,
    Delete,
    Exists,
    SelectFirst,
    SelectAll,
}

impl QueryKind {
    /// Resolves the `type` directive argument.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "upsert" => Some(Self::Upsert),
            "delete" => Some(Self::Delete),
            "exists" => Some(Self::Exists),
            "select-first" => Some(Self::SelectFirst),
            "select-all" => Some(Self::SelectAll),
            _ => None,
        }
    }

    /// The directive spelling of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::Exists => "exists",
            Self::SelectFirst => "select-first",
            Self::SelectAll => "select-all",
        }
    }
}

/// A declared query.
#[derive(Debug, Default)]
pub struct Query {
    pub name: Span,
    /// Documentation block re-emitted next to the declaration.
    pub doxygen: Option<Span>,
    pub kind: Option<QueryKind>,
    /// Required when no explicit statement is given.
    pub table: Option<Span>,
    /// Explicit SQL overriding statement synthesis.
    pub stmt: Option<Span>,
    /// Scalar column returned by the query, distinct from callback
    /// columns.
    pub return_name: Option<Span>,
    pub in_args: Vec<Arg>,
    /// Empty until [`normalize`] defaults it to `in_args`.
    pub bind_args: Vec<Arg>,
    pub cb_args: Vec<Arg>,
}

impl Query {
    /// True when the statement produces a row the caller observes,
    /// forcing RETURNING reinjection on inserts.
    #[must_use]
    pub fn has_row_output(&self) -> bool {
        self.return_name.is_some() || !self.cb_args.is_empty()
    }
}

/// A free-form user function; the body is inlined verbatim.
#[derive(Debug, Default)]
pub struct Function {
    pub name: Span,
    pub args: Vec<Arg>,
    pub body: Span,
}

/// A named namespace of queries and helper functions.
#[derive(Debug)]
pub struct Group {
    pub name: Span,
    pub queries: Vec<Query>,
    pub functions: Vec<Function>,
}

/// The parse result: option set, top-level declarations, groups in
/// first-use order, and the two migration lists.
#[derive(Debug, Default)]
pub struct Root {
    pub options: Options,
    pub flags: Flags,
    pub queries: Vec<Query>,
    pub functions: Vec<Function>,
    pub groups: Vec<Group>,
    /// Sorted ascending by version.
    pub upgrades: Vec<Migration>,
    /// Sorted descending by version.
    pub downgrades: Vec<Migration>,
}

impl Root {
    /// Inserts an upgrade, keeping the list sorted ascending.
    pub fn add_upgrade(&mut self, migration: Migration) {
        let idx = self
            .upgrades
            .iter()
            .position(|m| m.version >= migration.version)
            .unwrap_or(self.upgrades.len());
        self.upgrades.insert(idx, migration);
    }

    /// Inserts a downgrade, keeping the list sorted descending.
    pub fn add_downgrade(&mut self, migration: Migration) {
        let idx = self
            .downgrades
            .iter()
            .position(|m| m.version <= migration.version)
            .unwrap_or(self.downgrades.len());
        self.downgrades.insert(idx, migration);
    }

    /// Highest known upgrade version; 0 with no migrations.
    #[must_use]
    pub fn max_version(&self) -> i32 {
        self.upgrades.last().map_or(0, |m| m.version)
    }

    /// One past the highest known downgrade; the version the
    /// forward-compat path resumes from after running stored
    /// downgrades.
    #[must_use]
    pub fn forward_compat_base(&self) -> i32 {
        self.downgrades.first().map_or(0, |m| m.version + 1)
    }
}

/// Post-parse pass: a query without an explicit bind list binds its
/// input parameters in declaration order. This is the only mutation
/// after parsing.
pub fn normalize(root: &mut Root) {
    let queries = root
        .queries
        .iter_mut()
        .chain(root.groups.iter_mut().flat_map(|g| g.queries.iter_mut()));
    for query in queries {
        if query.bind_args.is_empty() {
            query.bind_args = query.in_args.clone();
        }
    }
}
