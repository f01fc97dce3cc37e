use crate::config::{LockConfig, StoreConfig};
use crate::types::AccountId;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Crash-safe file-per-account ledger
#[derive(Parser, Debug)]
#[command(name = "drove-ledger")]
#[command(about = "Crash-safe file-per-account ledger", long_about = None)]
pub struct CliArgs {
    /// Data directory holding the record files
    #[arg(
        long = "dir",
        value_name = "DIR",
        env = "DROVE_LEDGER_DIR",
        default_value = "./dbfiles",
        global = true
    )]
    pub dir: PathBuf,

    /// Give up waiting for a record lock after this many milliseconds
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MS",
        global = true,
        conflicts_with = "wait_forever",
        help = "Lock wait limit in milliseconds (default: 30000)"
    )]
    pub lock_timeout_ms: Option<u64>,

    /// Interval between lock attempts
    #[arg(
        long = "lock-poll-ms",
        value_name = "MS",
        global = true,
        help = "Interval between lock attempts in milliseconds (default: 100)"
    )]
    pub lock_poll_ms: Option<u64>,

    /// Wait for record locks without a time limit
    #[arg(long = "wait-forever", global = true)]
    pub wait_forever: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Ledger operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the recovery scan and report what it repaired
    Recover,
    /// Open a new account
    Create {
        first_name: String,
        last_name: String,
        /// Starting balance
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        balance: Decimal,
    },
    /// Add funds to an account
    Deposit {
        id: AccountId,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
    },
    /// Take funds out of an account
    Withdraw {
        id: AccountId,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
    },
    /// Move funds between two accounts
    Transfer {
        from: AccountId,
        to: AccountId,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
    },
    /// Print one account as CSV
    Show { id: AccountId },
    /// Print every account as CSV
    List,
}

impl CliArgs {
    /// Create a StoreConfig from CLI arguments
    ///
    /// Options that were not given fall back to the LockConfig defaults.
    pub fn to_store_config(&self) -> StoreConfig {
        let default = LockConfig::default();
        let timeout = if self.wait_forever {
            None
        } else {
            self.lock_timeout_ms
                .map(Duration::from_millis)
                .or(default.timeout)
        };
        let poll_interval = self
            .lock_poll_ms
            .map(Duration::from_millis)
            .unwrap_or(default.poll_interval);

        StoreConfig::new(&self.dir).with_lock(LockConfig::new(poll_interval, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LOCK_POLL_INTERVAL, DEFAULT_LOCK_TIMEOUT};
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case::recover(&["prog", "recover"], Command::Recover)]
    #[case::list(&["prog", "list"], Command::List)]
    #[case::show(&["prog", "show", "70"], Command::Show { id: 70 })]
    #[case::create_default_balance(
        &["prog", "create", "John", "Doe"],
        Command::Create { first_name: "John".into(), last_name: "Doe".into(), balance: Decimal::ZERO }
    )]
    #[case::create_with_balance(
        &["prog", "create", "John", "Doe", "--balance", "100.00"],
        Command::Create { first_name: "John".into(), last_name: "Doe".into(), balance: Decimal::new(10000, 2) }
    )]
    #[case::deposit(&["prog", "deposit", "7", "12.5"], Command::Deposit { id: 7, amount: Decimal::new(125, 1) })]
    #[case::negative_amount_reaches_validation(
        &["prog", "withdraw", "7", "-3"],
        Command::Withdraw { id: 7, amount: Decimal::new(-3, 0) }
    )]
    #[case::transfer(
        &["prog", "transfer", "70", "71", "50.00"],
        Command::Transfer { from: 70, to: 71, amount: Decimal::new(5000, 2) }
    )]
    fn test_command_parsing(#[case] args: &[&str], #[case] expected: Command) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.command, expected);
    }

    #[rstest]
    #[case::defaults(&["prog", "list"], DEFAULT_LOCK_POLL_INTERVAL, Some(DEFAULT_LOCK_TIMEOUT))]
    #[case::custom(
        &["prog", "--lock-timeout-ms", "250", "--lock-poll-ms", "5", "list"],
        Duration::from_millis(5),
        Some(Duration::from_millis(250))
    )]
    #[case::global_after_subcommand(
        &["prog", "list", "--lock-poll-ms", "7"],
        Duration::from_millis(7),
        Some(DEFAULT_LOCK_TIMEOUT)
    )]
    #[case::wait_forever(&["prog", "--wait-forever", "list"], DEFAULT_LOCK_POLL_INTERVAL, None)]
    #[case::zero_timeout_falls_back(
        &["prog", "--lock-timeout-ms", "0", "list"],
        DEFAULT_LOCK_POLL_INTERVAL,
        Some(DEFAULT_LOCK_TIMEOUT)
    )]
    fn test_store_config_conversion(
        #[case] args: &[&str],
        #[case] expected_poll: Duration,
        #[case] expected_timeout: Option<Duration>,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_store_config();
        assert_eq!(config.lock.poll_interval, expected_poll);
        assert_eq!(config.lock.timeout, expected_timeout);
    }

    #[test]
    fn test_dir_option() {
        let parsed = CliArgs::try_parse_from(["prog", "--dir", "/srv/bank", "list"]).unwrap();
        assert_eq!(parsed.to_store_config().data_dir(), Path::new("/srv/bank"));
    }

    #[rstest]
    #[case::missing_command(&["prog"])]
    #[case::bad_amount(&["prog", "deposit", "1", "lots"])]
    #[case::bad_id(&["prog", "show", "-1"])]
    #[case::missing_last_name(&["prog", "create", "John"])]
    #[case::conflicting_wait(&["prog", "--wait-forever", "--lock-timeout-ms", "5", "list"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
