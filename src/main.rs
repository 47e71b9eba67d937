//! Purpose: `tabchannel` CLI entry point.
//! Role: Binary crate root; parses args, installs tracing, runs commands, emits JSON on stdout.
//! Invariants: Errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Masked open failures surface as JSON notices on stderr, never on stdout.
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Value, json};
use tabchannel::api::{
    Diagnostic, DiagnosticSink, Error, ErrorKind, Mode, Record, RecordChannel, diagnostic_json,
    to_exit_code,
};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `tabchannel --help` for usage."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser)]
#[command(
    name = "tabchannel",
    version,
    about = "Read and write tab-delimited two-column record files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every record of a file, tab-joined or as JSON lines.
    Cat {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        /// Emit one `{"column1":..,"column2":..}` object per record.
        #[arg(long)]
        json: bool,
    },
    /// Write records from stdin (one JSON array of strings per line) to a file.
    Write {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    /// Copy records between files; a missing source yields a notice and zero records.
    Copy {
        #[arg(value_hint = ValueHint::FilePath)]
        src: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        dst: PathBuf,
    },
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Prints each diagnostic as a JSON notice line on stderr.
struct NoticeSink;

impl DiagnosticSink for NoticeSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::debug!(kind = diagnostic.kind.as_str(), "emitting notice");
        let _ = writeln!(io::stderr(), "{}", diagnostic_json(&diagnostic));
    }
}

fn notice_channel() -> RecordChannel {
    RecordChannel::with_sink(Arc::new(NoticeSink))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: Value) -> Result<(), Error> {
    let mut out = io::stdout().lock();
    writeln!(out, "{value}").map_err(stdout_error)
}

fn emit_error(err: &Error) {
    let mut inner = serde_json::Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.to_string()));
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.to_string_lossy()));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let value = json!({ "error": Value::Object(inner) });
    let _ = writeln!(io::stderr(), "{value}");
}

fn stdout_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write stdout")
        .with_source(err)
}

fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}
