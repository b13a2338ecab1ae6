//! querygen CLI
//!
//! Command-line driver: parses flags, runs the pipeline, and reports a
//! single diagnostic on failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use querygen_core::Error;

/// Compiles a database API definition into a C header and source pair.
#[derive(Parser)]
#[command(name = "querygen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input definition file.
    #[arg(short = 'i', value_name = "PATH")]
    input: PathBuf,

    /// Output header file.
    #[arg(long, value_name = "PATH")]
    header: PathBuf,

    /// Output source file.
    #[arg(long, value_name = "PATH")]
    source: PathBuf,

    /// Comma-separated list of backends. Supported: sqlite3.
    #[arg(short = 'b', value_name = "LIST", value_delimiter = ',', required = true)]
    backends: Vec<String>,

    /// Emit the instrumented interface that logs every call.
    #[arg(long)]
    debug_layer: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    for backend in &cli.backends {
        if backend != "sqlite3" {
            anyhow::bail!("unknown backend \"{backend}\" (supported backends: sqlite3)");
        }
    }

    let outcome = querygen_core::generate_files(
        &cli.input,
        &cli.header,
        &cli.source,
        cli.debug_layer,
    )
    .map_err(|err| match err {
        Error::Parse(parse) => {
            // Show the offending input text alongside the diagnostic.
            let text = std::fs::read_to_string(&cli.input).unwrap_or_default();
            let snippet = parse.snippet(&text);
            if snippet.is_empty() {
                anyhow::anyhow!("{parse}")
            } else {
                anyhow::anyhow!("{parse}\n{snippet}")
            }
        }
        Error::Io(io) => anyhow::Error::new(io).context(format!(
            "failed to generate {} / {}",
            cli.header.display(),
            cli.source.display()
        )),
    })
    .with_context(|| format!("in {}", cli.input.display()))?;

    debug!(
        header_written = outcome.header_written,
        source_written = outcome.source_written,
        "generation finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    // Failures exit with -1 (status byte 255), not 1.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Error: failed to install logging subscriber");
        return ExitCode::from(255);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(255)
        }
    }
}
