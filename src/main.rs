// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for passforge.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use passforge::assembler::cli::{log_level, Cli};

fn init_logging() {
    // Parse once just for -v; the full parse happens in run().
    let verbose = Cli::try_parse().map(|cli| cli.verbose).unwrap_or(0);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose > 0 => EnvFilter::new(log_level(verbose)),
        Err(_) => return,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    match passforge::assembler::run() {
        Ok(report) => {
            for diag in report.diagnostics() {
                eprintln!("{diag}");
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{diag}");
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
