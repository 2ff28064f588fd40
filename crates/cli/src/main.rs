//! RepCRec CLI: replay an instruction script against the replicated engine.
//!
//! `repcrec <script>` parses the script, runs it to completion and prints one
//! transcript line per engine event on stdout. Diagnostics go to stderr,
//! filtered by `RUST_LOG` (default `warn`).

mod commands;
mod format;

use std::path::Path;
use std::process;

use clap::error::ErrorKind;
use repcrec_core::{parse_script, EngineEvent};
use repcrec_engine::{Coordinator, EngineConfig, EventSink, CONFIG_FILE_NAME};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_event, OutputMode};

/// Prints events as soon as the coordinator emits them.
struct PrintSink {
    mode: OutputMode,
}

impl EventSink for PrintSink {
    fn emit(&mut self, event: EngineEvent) {
        for line in format_event(&event, self.mode) {
            println!("{}", line);
        }
    }
}

fn main() {
    init_logging();

    let matches = match build_cli().try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            if let Err(io) = e.print() {
                warn!(error = %io, "Failed to print usage");
            }
            process::exit(code);
        }
    };

    let mut config = match load_config(matches.get_one::<String>("config").map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };
    if matches.get_flag("debug") {
        config.debug_dump = true;
    }

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let Some(path) = matches.get_one::<String>("script") else {
        eprintln!("Usage: repcrec <script>");
        process::exit(1);
    };
    let operations = match std::fs::read_to_string(path)
        .map_err(repcrec_core::Error::from)
        .and_then(|text| parse_script(&text))
    {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("(error) {}: {}", path, e);
            process::exit(1);
        }
    };

    info!(target: "repcrec::txn", script = %path, instructions = operations.len(), "Replaying script");
    let mut coordinator = Coordinator::new(config);
    coordinator.enqueue(operations);
    coordinator.run_with(&mut PrintSink { mode });
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit `--config` file, else `./repcrec.toml` if present, else defaults.
fn load_config(explicit: Option<&str>) -> repcrec_core::Result<EngineConfig> {
    match explicit {
        Some(path) => EngineConfig::from_file(Path::new(path)),
        None => {
            let default_path = Path::new(CONFIG_FILE_NAME);
            if default_path.exists() {
                EngineConfig::from_file(default_path)
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}
