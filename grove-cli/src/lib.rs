// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! The `grove` command line: argument parsing, configuration and the
//! `archive` and `verify` commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

use std::io::Write;

use grove_archive::walk::VERBOSE_TARGET;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};
use crate::config::Config;
use crate::error::Result;

/// Log to stderr, filtered by `RUST_LOG` (default `warn`). Verbose mode
/// additionally shows the per-entry report.
pub fn init_logging(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        match format!("{VERBOSE_TARGET}=info").parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("grove: invalid log directive: {e}"),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

pub fn run(args: Args, stdout: &mut dyn Write) -> Result<()> {
    match args.command {
        Command::Archive(command) => {
            let config = Config::load()?;
            commands::archive(&command, &config, stdout)
        }
        Command::Verify(command) => commands::verify(&command, stdout),
    }
}
