// CLI module
// Command-line interface, argument parsing and command dispatch

mod args;

pub use args::{CliArgs, Command};

use crate::core::{Ledger, RecoveryReport};
use crate::io::write_accounts_csv;
use crate::types::{Account, LedgerError};
use clap::Parser;
use std::io::Write;

/// Parse command-line arguments using clap
///
/// If parsing fails (e.g., invalid arguments, missing subcommand, or --help
/// flag), clap displays an error message or help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Open the ledger and run one command, writing its result to `output`
///
/// Only `recover` runs the recovery scan. Every other command attaches to
/// the directory, since other processes may hold record locks in it.
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let config = args.to_store_config();
    let ledger = match args.command {
        Command::Recover => Ledger::open(config)?,
        _ => Ledger::attach(config)?,
    };

    match &args.command {
        Command::Recover => {
            if let Some(report) = ledger.last_recovery() {
                write_report(report, output)?;
            }
        }
        Command::Create {
            first_name,
            last_name,
            balance,
        } => {
            let account = ledger.create_account(first_name, last_name, *balance)?;
            writeln!(output, "created account {}", account.id)?;
        }
        Command::Deposit { id, amount } => {
            let balance = ledger.deposit(*id, *amount)?;
            writeln!(output, "account {} balance {:.2}", id, balance)?;
        }
        Command::Withdraw { id, amount } => {
            let balance = ledger.withdraw(*id, *amount)?;
            writeln!(output, "account {} balance {:.2}", id, balance)?;
        }
        Command::Transfer { from, to, amount } => {
            let receipt = ledger.transfer(*from, *to, *amount)?;
            writeln!(output, "account {} balance {:.2}", from, receipt.from.balance)?;
            writeln!(output, "account {} balance {:.2}", to, receipt.to.balance)?;
        }
        Command::Show { id } => {
            let account = ledger.account(*id)?;
            write_csv(&[account], output)?;
        }
        Command::List => {
            let accounts = ledger.accounts()?;
            write_csv(&accounts, output)?;
        }
    }

    Ok(())
}

fn write_report(report: &RecoveryReport, output: &mut dyn Write) -> Result<(), LedgerError> {
    if report.is_clean() {
        writeln!(output, "nothing to recover")?;
    } else {
        writeln!(
            output,
            "recovered {} transfer(s), {} update(s), {} lock(s), {} creation file(s)",
            report.transfers.len(),
            report.updates.len(),
            report.locks_removed,
            report.creations_removed.len()
        )?;
    }
    for record in report.unresolved() {
        writeln!(output, "unresolved: {} txn {}", record.key, record.txn)?;
    }
    for name in &report.unrecognized {
        writeln!(output, "left alone: {}", name)?;
    }
    Ok(())
}

fn write_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    write_accounts_csv(accounts, output).map_err(|message| LedgerError::Io {
        context: Some("write output".to_string()),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_cli(dir: &TempDir, args: &[&str]) -> Result<String, LedgerError> {
        let dir_arg = dir.path().to_str().unwrap();
        let mut argv = vec!["drove-ledger", "--dir", dir_arg];
        argv.extend_from_slice(args);
        let parsed = CliArgs::try_parse_from(argv).unwrap();

        let mut output = Vec::new();
        run(&parsed, &mut output)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_commands_print_results() {
        let dir = TempDir::new().unwrap();

        assert_eq!(
            run_cli(&dir, &["create", "John", "Doe", "--balance", "100"]).unwrap(),
            "created account 1\n"
        );
        assert_eq!(
            run_cli(&dir, &["create", "Bob", "Smith"]).unwrap(),
            "created account 2\n"
        );
        assert_eq!(
            run_cli(&dir, &["deposit", "2", "5.5"]).unwrap(),
            "account 2 balance 5.50\n"
        );
        assert_eq!(
            run_cli(&dir, &["transfer", "1", "2", "50"]).unwrap(),
            "account 1 balance 50.00\naccount 2 balance 55.50\n"
        );
        assert_eq!(
            run_cli(&dir, &["list"]).unwrap(),
            "id,first_name,last_name,balance\n1,John,Doe,50.00\n2,Bob,Smith,55.50\n"
        );
        assert_eq!(
            run_cli(&dir, &["show", "2"]).unwrap(),
            "id,first_name,last_name,balance\n2,Bob,Smith,55.50\n"
        );
    }

    #[test]
    fn test_recover_reports_open_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.txt"), "A,B,1\n").unwrap();
        fs::write(dir.path().join("1.lock"), "").unwrap();

        assert_eq!(
            run_cli(&dir, &["recover"]).unwrap(),
            "recovered 0 transfer(s), 1 update(s), 1 lock(s), 0 creation file(s)\n"
        );
        assert_eq!(run_cli(&dir, &["recover"]).unwrap(), "nothing to recover\n");
    }

    #[test]
    fn test_commands_other_than_recover_leave_locks() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("1.txt"), "A,B,1\n").unwrap();
        fs::write(dir.path().join("2.txt"), "C,D,2\n").unwrap();
        fs::write(dir.path().join("1.lock"), "").unwrap();
        fs::write(dir.path().join("1_T0000001.txt.tmp"), "A,B,9\n").unwrap();

        assert_eq!(
            run_cli(&dir, &["list"]).unwrap(),
            "id,first_name,last_name,balance\n1,A,B,1.00\n2,C,D,2.00\n"
        );
        assert_eq!(
            run_cli(&dir, &["deposit", "2", "1"]).unwrap(),
            "account 2 balance 3.00\n"
        );
        assert!(dir.path().join("1.lock").exists());
        assert!(dir.path().join("1_T0000001.txt.tmp").exists());
    }

    #[test]
    fn test_errors_propagate() {
        let dir = TempDir::new().unwrap();
        run_cli(&dir, &["create", "John", "Doe"]).unwrap();

        assert!(matches!(
            run_cli(&dir, &["withdraw", "1", "1"]),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(
            run_cli(&dir, &["deposit", "1", "-1"]).unwrap_err().to_string(),
            "amount cannot be negative: -1"
        );
    }
}
