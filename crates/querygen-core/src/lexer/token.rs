//! Token types for the definition-file lexer.

use super::Span;

/// The kind of token.
///
/// Directive keywords (`%option`, `%upgrade`, ...) and the bareword
/// keywords used inside query bodies (`type`, `table`, ...) are a
/// closed set matched by literal byte prefix, before general label
/// scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// End of input.
    End,

    // Top-level directives
    /// `%option`
    Option,
    /// `%header-preamble`
    HeaderPreamble,
    /// `%header-postamble`
    HeaderPostamble,
    /// `%source-includes`
    SourceIncludes,
    /// `%source-preamble`
    SourcePreamble,
    /// `%source-postamble`
    SourcePostamble,
    /// `%upgrade`
    Upgrade,
    /// `%downgrade`
    Downgrade,
    /// `%query`
    Query,
    /// `%private-query`
    PrivateQuery,
    /// `%function`
    Function,

    // Query body keywords
    /// `type`
    Type,
    /// `table`
    Table,
    /// `stmt`
    Stmt,
    /// `bind`
    Bind,
    /// `callback`
    Callback,
    /// `return`
    Return,

    // Values
    /// `[A-Za-z_][A-Za-z0-9_\-\*]*`; hyphens, underscores and asterisks
    /// are label characters so option names (`log-dbg`) and type
    /// fragments (`char*`) scan as one token.
    Label,
    /// `"..."`; the token span excludes the quotes.
    Str,
    /// `[0-9]+`
    Integer(i32),
    /// `/*! ... */` documentation block; the span starts at the first
    /// column of the containing indentation so it can be re-emitted
    /// with its original layout.
    Doxygen,

    /// Any other byte, passed through as itself.
    Punct(u8),
}

/// A token with its span in the definition text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The value span: for [`TokenKind::Str`] the contents without the
    /// quotes, otherwise the full token text.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is the given punctuation byte.
    #[must_use]
    pub const fn is_punct(&self, byte: u8) -> bool {
        matches!(self.kind, TokenKind::Punct(b) if b == byte)
    }
}

/// Directive and bareword keywords, tried in order against the input.
///
/// Matching is by byte prefix with no word-boundary check, so the
/// keywords must be listed before label scanning runs.
pub(super) const KEYWORDS: &[(&str, TokenKind)] = &[
    ("%option", TokenKind::Option),
    ("%header-preamble", TokenKind::HeaderPreamble),
    ("%header-postamble", TokenKind::HeaderPostamble),
    ("%source-includes", TokenKind::SourceIncludes),
    ("%source-preamble", TokenKind::SourcePreamble),
    ("%source-postamble", TokenKind::SourcePostamble),
    ("%upgrade", TokenKind::Upgrade),
    ("%downgrade", TokenKind::Downgrade),
    ("%query", TokenKind::Query),
    ("%private-query", TokenKind::PrivateQuery),
    ("%function", TokenKind::Function),
    ("type", TokenKind::Type),
    ("table", TokenKind::Table),
    ("stmt", TokenKind::Stmt),
    ("bind", TokenKind::Bind),
    ("callback", TokenKind::Callback),
    ("return", TokenKind::Return),
];
