//! `sitcp`: SiTCP board control and data acquisition.
//!
//! ```bash
//! # Read the EEPROM IP register
//! sitcp --target 192.168.10.16 read --addr 0xFFFFFC18 --len 4
//!
//! # Change the board address (takes effect after a power cycle)
//! sitcp set-ip --new-ip 192.168.10.20
//!
//! # Record 1000 good frames, then look at the timing
//! sitcp acquire --events 1000 --out run.dat
//! sitcp analyze run.dat
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout)]

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        },
    }
}
