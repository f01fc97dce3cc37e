//! Drove ledger CLI
//!
//! Command-line interface over a crash-safe directory of account records.
//!
//! # Usage
//!
//! ```bash
//! drove-ledger --dir ./dbfiles create John Doe --balance 100.00
//! drove-ledger deposit 1 25.00
//! drove-ledger transfer 1 2 50.00
//! drove-ledger list > accounts.csv
//! RUST_LOG=debug drove-ledger recover
//! ```
//!
//! Every command opens the ledger first, which runs the recovery scan.
//! Results go to stdout, logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing data directory, validation failure, lock timeout, etc.)

use drove_ledger::cli;
use env_logger::{Builder, Env};
use std::process;

fn init_logger() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=debug
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    // Parse command-line arguments using clap
    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
