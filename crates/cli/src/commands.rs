//! Clap command definition.

use clap::{Arg, ArgAction, Command};

/// Build the `repcrec` command.
pub fn build_cli() -> Command {
    Command::new("repcrec")
        .about("Replicated concurrency control and recovery simulator")
        .arg(
            Arg::new("script")
                .help("Instruction script to replay")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Engine config (default: ./repcrec.toml if present)"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Print parked instructions and the wait-for graph with each dump")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("One JSON object per event")
                .action(ArgAction::SetTrue),
        )
}
