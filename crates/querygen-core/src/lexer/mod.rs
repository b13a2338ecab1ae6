//! Tokenizer for the definition language.
//!
//! The lexer exposes one operation: advance and return the next typed
//! token, or report a lexical error with byte offsets. A secondary
//! operation scans a brace-delimited block with depth tracking,
//! returning the trimmed body as a span.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Token, TokenKind};
pub use tokenizer::Lexer;
