//! The pipeline: definition text in, artifacts out.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::emit;
use crate::ir;
use crate::output;
use crate::parser::{ParseError, Parser};

/// Pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The definition text did not parse.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// Reading the definition or writing an artifact failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The two generated artifacts.
#[derive(Debug)]
pub struct Generated {
    /// Declaration text.
    pub header: String,
    /// Implementation text.
    pub source: String,
}

/// What [`generate_files`] did on disk.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    /// Whether the header file's bytes changed.
    pub header_written: bool,
    /// Whether the source file's bytes changed.
    pub source_written: bool,
}

/// Compiles definition text into the header and source artifacts.
///
/// `debug_layer` forces instrumentation emission on top of whatever
/// the definition's own options request.
///
/// # Errors
///
/// Returns a [`ParseError`] on the first lexical or syntactic
/// mismatch; no partial output is produced.
pub fn generate(text: &str, debug_layer: bool) -> Result<Generated, ParseError> {
    let mut root = Parser::new(text).parse()?;
    root.flags.debug_layer |= debug_layer;
    ir::normalize(&mut root);

    debug!(
        queries = root.queries.len(),
        groups = root.groups.len(),
        upgrades = root.upgrades.len(),
        downgrades = root.downgrades.len(),
        "parsed definition"
    );

    let header = emit::generate_header(&root, text);
    let source = emit::generate_source(&root, text);
    debug!(
        header_bytes = header.len(),
        source_bytes = source.len(),
        "rendered artifacts"
    );
    Ok(Generated { header, source })
}

/// Reads a definition file and writes both artifacts through the
/// idempotent sink. Both artifacts are rendered fully in memory before
/// either file is touched.
///
/// # Errors
///
/// Returns [`Error::Parse`] on a malformed definition and
/// [`Error::Io`] when the input cannot be read or an output cannot be
/// written.
pub fn generate_files(
    input: &Path,
    header_path: &Path,
    source_path: &Path,
    debug_layer: bool,
) -> Result<Outcome, Error> {
    let text = fs::read_to_string(input)?;
    let generated = generate(&text, debug_layer)?;
    let header_written = output::write_if_changed(header_path, generated.header.as_bytes())?;
    let source_written = output::write_if_changed(source_path, generated.source.as_bytes())?;
    Ok(Outcome {
        header_written,
        source_written,
    })
}
