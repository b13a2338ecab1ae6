//! Parser implementation.

use super::ParseError;
use crate::ir::{Arg, Function, Group, Migration, Query, QueryKind, Root};
use crate::lexer::{Lexer, Span, Token, TokenKind};

/// Definition-file parser.
pub struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self {
            src: source,
            lexer: Lexer::new(source),
        }
    }

    /// Parses the whole input into a [`Root`].
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] on the first lexical or syntactic
    /// mismatch.
    pub fn parse(mut self) -> Result<Root, ParseError> {
        let mut root = Root::default();
        loop {
            let tok = self.lexer.next_token()?;
            match tok.kind {
                TokenKind::End => return Ok(root),
                // Doc blocks outside query bodies have no target.
                TokenKind::Doxygen => {}
                TokenKind::Option => self.parse_option(&mut root)?,
                TokenKind::HeaderPreamble => {
                    root.options.header_preamble = Some(self.lexer.block(true)?);
                }
                TokenKind::HeaderPostamble => {
                    root.options.header_postamble = Some(self.lexer.block(true)?);
                }
                TokenKind::SourceIncludes => {
                    root.options.source_includes = Some(self.lexer.block(true)?);
                }
                TokenKind::SourcePreamble => {
                    root.options.source_preamble = Some(self.lexer.block(true)?);
                }
                TokenKind::SourcePostamble => {
                    root.options.source_postamble = Some(self.lexer.block(true)?);
                }
                TokenKind::Upgrade => self.parse_migration(&mut root, true)?,
                TokenKind::Downgrade => self.parse_migration(&mut root, false)?,
                TokenKind::Query | TokenKind::PrivateQuery => self.parse_query(&mut root)?,
                TokenKind::Function => self.parse_function(&mut root)?,
                _ => {
                    return Err(ParseError::new("unexpected token at top level", tok.span));
                }
            }
        }
    }

    fn text(&self, span: Span) -> &'a str {
        span.text(self.src)
    }

    fn expect_label(&mut self, message: &str) -> Result<Span, ParseError> {
        let tok = self.lexer.next_token()?;
        if tok.kind == TokenKind::Label {
            Ok(tok.span)
        } else {
            Err(ParseError::new(message, tok.span))
        }
    }

    fn expect_punct(&mut self, byte: u8, message: &str) -> Result<(), ParseError> {
        let tok = self.lexer.next_token()?;
        if tok.is_punct(byte) {
            Ok(())
        } else {
            Err(ParseError::new(message, tok.span))
        }
    }

    /// `%option NAME` for flags, `%option NAME = "VALUE"` for valued
    /// options. Unknown names are errors.
    fn parse_option(&mut self, root: &mut Root) -> Result<(), ParseError> {
        let name = self.expect_label("expected option name after %option")?;

        let flags = &mut root.flags;
        match self.text(name) {
            "debug-layer" => {
                flags.debug_layer = true;
                return Ok(());
            }
            "custom-init" => {
                flags.custom_init = true;
                flags.custom_init_decl = true;
                return Ok(());
            }
            "custom-init-decl" => {
                flags.custom_init_decl = true;
                return Ok(());
            }
            "custom-deinit" => {
                flags.custom_deinit = true;
                flags.custom_deinit_decl = true;
                return Ok(());
            }
            "custom-deinit-decl" => {
                flags.custom_deinit_decl = true;
                return Ok(());
            }
            "custom-api" => {
                flags.custom_api = true;
                flags.custom_api_decl = true;
                return Ok(());
            }
            "custom-api-decl" => {
                flags.custom_api_decl = true;
                return Ok(());
            }
            "no-forwards-compat" => {
                flags.no_forwards_compat = true;
                return Ok(());
            }
            _ => {}
        }

        self.expect_punct(b'=', "expected \"=\" after option name")?;
        let tok = self.lexer.next_token()?;
        if tok.kind != TokenKind::Str {
            return Err(ParseError::new("expected string value for %option", tok.span));
        }
        let value = tok.span;

        let options = &mut root.options;
        match self.text(name) {
            "prefix" => options.prefix = Some(value),
            "malloc" => options.malloc_fn = Some(value),
            "free" => options.free_fn = Some(value),
            "log-dbg" => options.log_dbg = Some(value),
            "log-error" => options.log_err = Some(value),
            "log-sql-error" => options.log_sql_err = Some(value),
            other => {
                return Err(ParseError::new(format!("unknown option \"{other}\""), name));
            }
        }
        Ok(())
    }

    /// `%upgrade N { SQL }` / `%downgrade N { SQL }`. Upgrades are kept
    /// sorted ascending, downgrades descending.
    fn parse_migration(&mut self, root: &mut Root, upgrade: bool) -> Result<(), ParseError> {
        let tok = self.lexer.next_token()?;
        let TokenKind::Integer(version) = tok.kind else {
            let directive = if upgrade { "%upgrade" } else { "%downgrade" };
            return Err(ParseError::new(
                format!("expected migration version number after \"{directive}\""),
                tok.span,
            ));
        };
        let sql = self.lexer.block(true)?;
        let migration = Migration { version, sql };
        if upgrade {
            root.add_upgrade(migration);
        } else {
            root.add_downgrade(migration);
        }
        Ok(())
    }

    /// Parses `NAME(` or `GROUP,NAME(` and returns the optional group
    /// together with the declared name. The opening parenthesis is
    /// consumed.
    fn parse_decl_name(&mut self, directive: &str) -> Result<(Option<Span>, Span), ParseError> {
        let first = self.expect_label(&format!("expected label or group for {directive}"))?;
        let tok = self.lexer.next_token()?;
        if tok.is_punct(b'(') {
            return Ok((None, first));
        }
        if tok.is_punct(b',') {
            let name = self.expect_label(&format!("expected label for {directive}"))?;
            let tok = self.lexer.next_token()?;
            if tok.is_punct(b'(') {
                return Ok((Some(first), name));
            }
            return Err(ParseError::new("expected \"(\"", tok.span));
        }
        Err(ParseError::new("expected \"(\"", tok.span))
    }

    /// Extends `struct NAME` and `const NAME` type names over both
    /// tokens.
    fn parse_arg_type(&mut self, first: Span) -> Result<Span, ParseError> {
        match self.text(first) {
            "struct" => {
                let name = self.expect_label("missing struct name after \"struct\"")?;
                Ok(first.merge(name))
            }
            "const" => {
                let name = self.expect_label("const qualifier without type")?;
                Ok(first.merge(name))
            }
            _ => Ok(first),
        }
    }

    /// Parses one `TYPE NAME [null]` argument starting from its first
    /// type token and returns the lookahead token that terminated it.
    fn parse_arg(
        &mut self,
        args: &mut Vec<Arg>,
        first: Span,
        allow_null: bool,
    ) -> Result<Token, ParseError> {
        let ty = self.parse_arg_type(first)?;
        let name = self.expect_label("missing parameter name")?;
        let mut arg = Arg {
            ty,
            name,
            nullable: false,
            update: false,
        };

        let tok = self.lexer.next_token()?;
        if allow_null && tok.kind == TokenKind::Label {
            if self.text(tok.span) != "null" {
                return Err(ParseError::new(
                    format!("unknown parameter qualifier \"{}\"", self.text(tok.span)),
                    tok.span,
                ));
            }
            arg.nullable = true;
            args.push(arg);
            return self.lexer.next_token();
        }
        args.push(arg);
        Ok(tok)
    }

    /// `( TYPE NAME [null] (, TYPE NAME [null])* )`; the opening
    /// parenthesis has already been consumed.
    fn parse_paren_args(&mut self, args: &mut Vec<Arg>, allow_null: bool) -> Result<(), ParseError> {
        let mut tok = self.lexer.next_token()?;
        loop {
            match tok.kind {
                TokenKind::Punct(b')') => return Ok(()),
                TokenKind::Punct(b',') => {
                    if args.is_empty() {
                        return Err(ParseError::new("expected parameter after \"(\"", tok.span));
                    }
                    let ty = self.expect_label("expected parameter after \",\"")?;
                    tok = self.parse_arg(args, ty, allow_null)?;
                }
                TokenKind::Label => {
                    let ty = tok.span;
                    tok = self.parse_arg(args, ty, allow_null)?;
                }
                _ => return Err(ParseError::new("expected parameter list", tok.span)),
            }
        }
    }

    fn parse_query(&mut self, root: &mut Root) -> Result<(), ParseError> {
        let (group, name) = self.parse_decl_name("%query")?;
        let mut query = Query {
            name,
            ..Query::default()
        };
        self.parse_paren_args(&mut query.in_args, true)?;
        self.expect_punct(b'{', "expected \"{\"")?;
        self.parse_query_body(&mut query)?;

        match group {
            Some(group) => Self::group_entry(root, self.src, group).queries.push(query),
            None => root.queries.push(query),
        }
        Ok(())
    }

    /// Query body directives, in any order, terminated by `}`.
    fn parse_query_body(&mut self, query: &mut Query) -> Result<(), ParseError> {
        let mut tok = self.lexer.next_token()?;
        loop {
            match tok.kind {
                TokenKind::Doxygen => {
                    query.doxygen = Some(tok.span);
                    tok = self.lexer.next_token()?;
                }
                TokenKind::Type => tok = self.parse_query_type(query)?,
                TokenKind::Table => {
                    query.table = Some(self.expect_label("expected table name after \"table\"")?);
                    tok = self.lexer.next_token()?;
                }
                TokenKind::Stmt => {
                    let next = self.lexer.next_token()?;
                    query.stmt = Some(match next.kind {
                        TokenKind::Label => next.span,
                        TokenKind::Punct(b'{') => self.lexer.block(false)?,
                        _ => {
                            return Err(ParseError::new(
                                "expected query statement after \"stmt\"",
                                next.span,
                            ));
                        }
                    });
                    tok = self.lexer.next_token()?;
                }
                TokenKind::Bind => tok = self.parse_bind_list(query)?,
                TokenKind::Callback => tok = self.parse_callback_args(query)?,
                TokenKind::Return => {
                    query.return_name =
                        Some(self.expect_label("expected return value after \"return\"")?);
                    tok = self.lexer.next_token()?;
                }
                TokenKind::Punct(b'}') => return Ok(()),
                _ => {
                    return Err(ParseError::new(
                        "expecting \"type\", \"table\", \"stmt\" or \"return\"",
                        tok.span,
                    ));
                }
            }
        }
    }

    /// `type KIND [col, col, ...]`; for `update` and `upsert` the
    /// column list flags the named input arguments as update targets.
    fn parse_query_type(&mut self, query: &mut Query) -> Result<Token, ParseError> {
        let name = self.expect_label("expected query type after \"type\"")?;
        let Some(kind) = QueryKind::from_name(self.text(name)) else {
            return Err(ParseError::new(
                format!("unknown query type \"{}\"", self.text(name)),
                name,
            ));
        };
        query.kind = Some(kind);

        if !matches!(kind, QueryKind::Update | QueryKind::Upsert) {
            return self.lexer.next_token();
        }

        let mut tok = self.lexer.next_token()?;
        loop {
            if tok.kind != TokenKind::Label {
                return Ok(tok);
            }
            self.mark_update_column(query, tok.span)?;
            tok = self.lexer.next_token()?;
            if !tok.is_punct(b',') {
                return Ok(tok);
            }
            tok = self.lexer.next_token()?;
            if tok.kind != TokenKind::Label {
                return Err(ParseError::new(
                    format!("expected column name after \"{}\"", kind.name()),
                    tok.span,
                ));
            }
        }
    }

    fn mark_update_column(&self, query: &mut Query, column: Span) -> Result<(), ParseError> {
        let text = column.text(self.src);
        match query
            .in_args
            .iter_mut()
            .find(|a| a.name.text(self.src) == text)
        {
            Some(arg) => {
                arg.update = true;
                Ok(())
            }
            None => Err(ParseError::new(
                format!(
                    "\"update {text}\" specified, but no argument with this name \
                     exists in the function's parameter list"
                ),
                column,
            )),
        }
    }

    /// `bind arg, arg, ...`; each name resolves against the input
    /// parameter list and inherits its type and nullability.
    fn parse_bind_list(&mut self, query: &mut Query) -> Result<Token, ParseError> {
        loop {
            let tok = self.lexer.next_token()?;
            match tok.kind {
                TokenKind::Punct(b',') => {
                    if query.bind_args.is_empty() {
                        return Err(ParseError::new("expected parameter after \"bind\"", tok.span));
                    }
                    let name = self.expect_label("expected parameter after \",\"")?;
                    self.resolve_bind(query, name)?;
                }
                TokenKind::Label => self.resolve_bind(query, tok.span)?,
                _ => return Ok(tok),
            }
        }
    }

    fn resolve_bind(&self, query: &mut Query, name: Span) -> Result<(), ParseError> {
        let text = name.text(self.src);
        match query
            .in_args
            .iter()
            .find(|a| a.name.text(self.src) == text)
        {
            Some(arg) => {
                // The resolved copy never carries the update flag; only
                // a defaulted bind list sees update partitioning.
                query.bind_args.push(Arg {
                    ty: arg.ty,
                    name: arg.name,
                    nullable: arg.nullable,
                    update: false,
                });
                Ok(())
            }
            None => Err(ParseError::new(
                format!("bind argument \"{text}\" does not exist in the function's parameter list"),
                name,
            )),
        }
    }

    /// `callback TYPE NAME [null], ...`; same argument grammar as a
    /// parameter list, terminated by the next body directive.
    fn parse_callback_args(&mut self, query: &mut Query) -> Result<Token, ParseError> {
        let mut tok = self.lexer.next_token()?;
        loop {
            match tok.kind {
                TokenKind::Punct(b',') => {
                    if query.cb_args.is_empty() {
                        return Err(ParseError::new(
                            "expected parameter after \"callback\"",
                            tok.span,
                        ));
                    }
                    let ty = self.expect_label("expected parameter after \",\"")?;
                    tok = self.parse_arg(&mut query.cb_args, ty, true)?;
                }
                TokenKind::Label => {
                    let ty = tok.span;
                    tok = self.parse_arg(&mut query.cb_args, ty, true)?;
                }
                _ => return Ok(tok),
            }
        }
    }

    fn parse_function(&mut self, root: &mut Root) -> Result<(), ParseError> {
        let (group, name) = self.parse_decl_name("%function")?;
        let mut args = Vec::new();
        self.parse_paren_args(&mut args, false)?;
        let body = self.lexer.block(true)?;
        let function = Function { name, args, body };

        match group {
            Some(group) => Self::group_entry(root, self.src, group)
                .functions
                .push(function),
            None => root.functions.push(function),
        }
        Ok(())
    }

    /// Looks up a group by name, creating it on first reference so
    /// first-use order is preserved.
    fn group_entry<'r>(root: &'r mut Root, src: &str, name: Span) -> &'r mut Group {
        let idx = root
            .groups
            .iter()
            .position(|g| g.name.text(src) == name.text(src));
        let idx = match idx {
            Some(idx) => idx,
            None => {
                root.groups.push(Group {
                    name,
                    queries: Vec::new(),
                    functions: Vec::new(),
                });
                root.groups.len() - 1
            }
        };
        &mut root.groups[idx]
    }
}
