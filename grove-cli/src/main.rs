// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

use std::process::ExitCode;

use clap::Parser;
use grove_cli::cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    grove_cli::init_logging(args.command.verbose());

    let stdout = std::io::stdout();
    match grove_cli::run(args, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("grove: {e}");
            ExitCode::FAILURE
        }
    }
}
