//! Headless driver for the document engine.
//!
//! Reads stdin line by line. Plain lines are typed into the document, each
//! followed by a newline. A few ex-style commands control saving:
//!
//! - `:w` writes the swap side-file now
//! - `:wq` writes the document itself and exits
//! - `:q` exits
//!
//! Logs go to stderr. Set `RUST_LOG` to override the default filter.

use std::io::BufRead;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "phantom_notes=info,persistence=info,editor_state=info";

#[derive(Parser, Debug)]
#[command(name = "phantom-notes", about = "Plain-text editing with crash-safe autosave")]
struct Cli {
    /// Document to edit. Without it the document is untitled and its
    /// side-file lives in the working directory.
    #[arg(long)]
    file: Option<std::path::PathBuf>,

    /// Autosave tick in milliseconds. Overrides PHANTOM_AUTOSAVE_INTERVAL_MS.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Type(&'a str),
    SaveSideFile,
    SaveAndQuit,
    Quit,
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim_end_matches(['\r', '\n']) {
        ":w" => Command::SaveSideFile,
        ":wq" => Command::SaveAndQuit,
        ":q" => Command::Quit,
        text => Command::Type(text),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("phantom-notes: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = persistence::AutosaveConfig::from_env();
    if let Some(millis) = cli.interval_ms {
        config = config.with_interval(std::time::Duration::from_millis(millis));
    }

    let mut session = match &cli.file {
        Some(path) => {
            let span = tracing::info_span!("document", path = %path.display());
            editor_state::DocumentSession::open(path, config, span)
                .with_context(|| format!("opening {}", path.display()))?
        }
        None => {
            let span = tracing::info_span!("document", path = "untitled");
            editor_state::DocumentSession::untitled_in(".", config, span)
        }
    };

    match session.load_from_side_file_if_newer() {
        editor_state::Recovery::Recovered { cursor_position, bytes } => {
            eprintln!("recovered {bytes} bytes from {} (cursor at {cursor_position})", session.side_file().path().display());
        }
        editor_state::Recovery::Rejected(e) => {
            eprintln!("ignoring side-file {}: {e}", session.side_file().path().display());
        }
        editor_state::Recovery::NoSideFile | editor_state::Recovery::Stale => {}
    }

    session.start_autosave().context("starting autosave")?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;

        match parse_command(&line) {
            Command::Type(text) => {
                session.insert_text(text)?;
                session.insert_newline()?;
            }
            Command::SaveSideFile => match session.save_now() {
                Ok(bytes) => eprintln!("side-file written ({bytes} bytes)"),
                Err(e) => eprintln!("side-file write failed: {e}"),
            },
            Command::SaveAndQuit => match session.save_document() {
                Ok(()) => break,
                Err(e) => eprintln!("save failed: {e}"),
            },
            Command::Quit => break,
        }
    }

    session.close().context("closing document")?;

    Ok(())
}
