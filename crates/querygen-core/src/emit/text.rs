//! Text utilities for emission.

/// Escapes text for inclusion in a C string literal.
pub(crate) fn c_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

/// Renders a possibly multi-line SQL fragment as adjacent C string
/// literals, one per source line, with interior newlines encoded as
/// `\n` escapes and `\r` dropped.
pub(crate) fn c_literal_lines(text: &str, indent: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| c_escape(line.trim_end_matches('\r')))
        .collect();
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(indent);
        out.push('"');
        out.push_str(line);
        if i + 1 < lines.len() {
            out.push_str("\\n\"\n");
        } else {
            out.push('"');
        }
    }
    out
}

/// Re-indents a documentation block: strips the common minimum
/// indentation of its lines and prefixes each with `indent` spaces.
pub(crate) fn reindent(text: &str, indent: usize) -> String {
    let min = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let pad = " ".repeat(indent);
    let mut out = String::new();
    for line in text.lines() {
        let line = line.trim_end();
        let stripped = if line.len() >= min { &line[min..] } else { "" };
        if stripped.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&pad);
            out.push_str(stripped);
            out.push('\n');
        }
    }
    out
}
