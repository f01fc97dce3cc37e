//! Benchmark suite for the startup recovery scan
//!
//! Measures a full scan over data directories of increasing size using the
//! divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! # Benchmark Directories
//!
//! Each directory is generated in a temp dir before timing:
//! - `clean` - Only committed records, nothing to repair
//! - `dirty` - The same records plus one interrupted update, one interrupted
//!   transfer and one abandoned creation per hundred records
//!
//! Leftovers are rewritten before every iteration so each scan has the same
//! amount of work.

use drove_ledger::RecoveryScanner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn main() {
    divan::main();
}

const SIZES: &[u64] = &[100, 1_000, 10_000];

fn populate(dir: &Path, records: u64) {
    for id in 1..=records {
        fs::write(dir.join(format!("{}.txt", id)), "John,Doe,100.00\n").expect("write record");
    }
    fs::write(dir.join("index.idx"), format!("{}\n", records)).expect("write index");
}

fn add_leftovers(dir: &Path, records: u64) {
    for block in 0..records / 100 {
        let base = block * 100 + 1;
        let txn = format!("B{:07}", block);

        fs::write(dir.join(format!("{}.lock", base)), "").expect("write lock");
        fs::write(dir.join(format!("{}_{}.txt.tmp", base, txn)), "John,Doe,1\n").expect("write tmp");

        for id in [base + 1, base + 2] {
            fs::write(dir.join(format!("{}.lock", id)), "").expect("write lock");
            fs::write(dir.join(format!("{}_{}.txt.xtmp", id, txn)), "John,Doe,1\n")
                .expect("write xtmp");
        }

        fs::write(dir.join(format!("{}.txt.atmp", records + block + 1)), "A,B,0\n")
            .expect("write atmp");
    }
}

#[divan::bench(args = SIZES)]
fn scan_clean(bencher: divan::Bencher, records: u64) {
    let dir = TempDir::new().expect("temp dir");
    populate(dir.path(), records);
    let scanner = RecoveryScanner::new(dir.path());

    bencher.bench_local(|| scanner.run().expect("scan failed"));
}

#[divan::bench(args = SIZES)]
fn scan_dirty(bencher: divan::Bencher, records: u64) {
    let dir = TempDir::new().expect("temp dir");
    populate(dir.path(), records);
    let scanner = RecoveryScanner::new(dir.path());

    bencher
        .with_inputs(|| add_leftovers(dir.path(), records))
        .bench_local_values(|()| scanner.run().expect("scan failed"));
}
