// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::core::assembler::error::{AsmError, AsmRunError, PassCounts};

use super::AssemblerOptions;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Retargetable multi-pass assembler.

Assembles one source file into an XML object module (<source>.obj) and a
paginated listing (<source>.lst) written next to the source. Object output
is suppressed when any error is reported.";

#[derive(Parser, Debug)]
#[command(
    name = "passforge",
    version = VERSION,
    about = "Retargetable multi-pass assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "SOURCE", help = "Assembly source file")]
    pub source: PathBuf,
    #[arg(
        short = 'I',
        long = "include",
        value_name = "DIR",
        action = ArgAction::Append,
        long_help = "Add a directory to the .INCLUDE search path (repeatable). Searched after the directory of the including file."
    )]
    pub include_paths: Vec<PathBuf>,
    #[arg(
        long = "big-endian",
        action = ArgAction::SetTrue,
        long_help = "Write multi-byte values most significant byte first."
    )]
    pub big_endian: bool,
    #[arg(long = "no-list", action = ArgAction::SetTrue, help = "Do not write a listing file")]
    pub no_list: bool,
    #[arg(long = "no-object", action = ArgAction::SetTrue, help = "Do not write an object module")]
    pub no_object: bool,
    #[arg(
        long = "lines-per-page",
        value_name = "N",
        default_value_t = 60,
        help = "Listing page length"
    )]
    pub lines_per_page: usize,
    #[arg(
        long = "tab-size",
        value_name = "N",
        default_value_t = 8,
        help = "Tab stop width used when listing source lines"
    )]
    pub tab_size: usize,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Log pass progress (repeat for more detail)"
    )]
    pub verbose: u8,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub source: PathBuf,
    pub big_endian: bool,
    pub options: AssemblerOptions,
}

fn cli_error(message: &str) -> AsmRunError {
    AsmRunError::new(
        AsmError::Cli(message.to_string()),
        Vec::new(),
        PassCounts::new(),
    )
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    if cli.source.as_os_str().is_empty() {
        return Err(cli_error("No source file specified"));
    }
    if cli.source.is_dir() {
        return Err(cli_error("Source must be a file, not a directory"));
    }
    if cli.lines_per_page < 10 {
        return Err(cli_error("--lines-per-page must be at least 10"));
    }
    if cli.tab_size == 0 {
        return Err(cli_error("--tab-size must be at least 1"));
    }
    if let Some(dir) = cli.include_paths.iter().find(|dir| !dir.is_dir()) {
        return Err(cli_error(&format!(
            "Include path is not a directory: {}",
            dir.display()
        )));
    }

    Ok(CliConfig {
        source: cli.source.clone(),
        big_endian: cli.big_endian,
        options: AssemblerOptions {
            include_paths: cli.include_paths.clone(),
            lines_per_page: cli.lines_per_page,
            tab_size: cli.tab_size,
            write_listing: !cli.no_list,
            write_object: !cli.no_object,
        },
    })
}

/// Tracing filter directive for a `-v` count.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
