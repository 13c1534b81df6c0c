//! Command-line entry point.
//!
//! # Responsibility
//! - Open configured libraries and answer one query per invocation.
//! - Print the JSON envelope (or field descriptors) to stdout.

use bookshelf_core::{init_logging, LibraryConfig, LibraryRegistry, LogSettings};
use clap::{Parser, Subcommand};
use log::error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Query book catalogs through URL-shaped requests
#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Library to open, as NAME=PATH (repeatable)
    #[arg(long = "library", value_name = "NAME=PATH")]
    libraries: Vec<LibraryConfig>,

    /// JSON file holding an array of {"name", "path"} library entries
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, default_value_t = bookshelf_core::default_log_level().to_string())]
    log_level: String,

    /// Absolute directory for rolling log files; logs go to stderr when unset
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the JSON envelope for a query
    Get {
        /// Library name
        library: String,
        /// Query such as `/api/tags/11?sort=added&order=desc`
        url: String,
    },

    /// Print the fields a query would return
    Fields {
        /// Library name
        library: String,
        /// Query such as `/books?fields=title,authors`
        url: String,
    },

    /// List configured library names
    Libraries,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    init_logging(&LogSettings {
        level: cli.log_level,
        log_dir: cli.log_dir,
    })?;

    let mut configs = match &cli.config {
        Some(path) => load_config(path)?,
        None => Vec::new(),
    };
    configs.extend(cli.libraries);
    let libraries = LibraryRegistry::open(&configs).map_err(|err| err.to_string())?;

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Get { library, url } => {
            let envelope = libraries.response(&library, &url);
            stdout
                .write_all(&envelope.to_bytes())
                .and_then(|()| writeln!(stdout))
                .map_err(|err| format!("failed to write response: {err}"))?;
            Ok(if envelope.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Fields { library, url } => {
            let descriptors = libraries
                .fields(&library, &url)
                .map_err(|err| err.to_string())?;
            let json = serde_json::to_string_pretty(&descriptors)
                .map_err(|err| format!("failed to encode fields: {err}"))?;
            writeln!(stdout, "{json}").map_err(|err| format!("failed to write fields: {err}"))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Libraries => {
            for name in libraries.names() {
                let Some(library) = libraries.library(name) else {
                    continue;
                };
                writeln!(stdout, "{name}\t{}", library.path().display())
                    .map_err(|err| format!("failed to write: {err}"))?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: &Path) -> Result<Vec<LibraryConfig>, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|err| format!("invalid config `{}`: {err}", path.display()))
}
