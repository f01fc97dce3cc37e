//! CSV format handling for account records and listings
//!
//! This module centralizes all CSV format concerns, providing:
//! - AccountRow structure for (de)serialization of a record file
//! - Conversion between record bytes and the Account domain type
//! - Account listing output
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{Account, AccountId, LedgerError};
use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// One record file: `first,last,balance`
///
/// The account id is not stored; it comes from the file name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountRow {
    pub first_name: String,
    pub last_name: String,
    pub balance: String,
}

/// Encode an account as the content of its record file
///
/// Produces a single newline-terminated CSV line with no header.
pub fn encode_account(account: &Account) -> Result<Vec<u8>, LedgerError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.serialize(AccountRow {
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        balance: account.balance.to_string(),
    })?;

    writer
        .into_inner()
        .map_err(|e| LedgerError::malformed_record(Path::new(""), e.to_string()))
}

/// Decode the content of `path`, the record file of account `id`
///
/// Only the first line is read.
pub fn decode_account(id: AccountId, content: &[u8], path: &Path) -> Result<Account, LedgerError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(content);

    let row: AccountRow = match reader.deserialize().next() {
        Some(Ok(row)) => row,
        Some(Err(e)) => return Err(LedgerError::malformed_record(path, e.to_string())),
        None => return Err(LedgerError::malformed_record(path, "empty record")),
    };

    let balance = Decimal::from_str(&row.balance).map_err(|_| {
        LedgerError::malformed_record(path, format!("invalid balance '{}'", row.balance))
    })?;

    Ok(Account::new(id, row.first_name, row.last_name, balance))
}

/// Write account states to CSV format
///
/// Writes accounts in CSV format with columns: id, first_name, last_name, balance
/// Accounts are sorted by id for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of account states to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    // Write header
    writer
        .write_record(["id", "first_name", "last_name", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    // Sort accounts by id for deterministic output
    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                account.first_name.clone(),
                account.last_name.clone(),
                format!("{:.2}", account.balance),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_encode_account_writes_single_line() {
        let account = Account::new(70, "John", "Doe", Decimal::new(10000, 2));
        let bytes = encode_account(&account).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "John,Doe,100.00\n");
    }

    #[test]
    fn test_encode_account_quotes_commas_in_names() {
        let account = Account::new(3, "Jo, Jr", "Doe", Decimal::ONE);
        let bytes = encode_account(&account).unwrap();
        assert_eq!(String::from_utf8(bytes.clone()).unwrap(), "\"Jo, Jr\",Doe,1\n");

        let decoded = decode_account(3, &bytes, Path::new("3.txt")).unwrap();
        assert_eq!(decoded, account);
    }

    #[rstest]
    #[case::plain("Bob,Smith,150.00\n", "Bob", "Smith", Decimal::new(15000, 2))]
    #[case::spaces(" Bob , Smith , 0.5 \n", "Bob", "Smith", Decimal::new(5, 1))]
    #[case::no_newline("Bob,Smith,7", "Bob", "Smith", Decimal::new(7, 0))]
    #[case::extra_lines("Bob,Smith,7\ngarbage\n", "Bob", "Smith", Decimal::new(7, 0))]
    fn test_decode_account_valid(
        #[case] content: &str,
        #[case] first: &str,
        #[case] last: &str,
        #[case] balance: Decimal,
    ) {
        let account = decode_account(71, content.as_bytes(), Path::new("71.txt")).unwrap();
        assert_eq!(account.id, 71);
        assert_eq!(account.first_name, first);
        assert_eq!(account.last_name, last);
        assert_eq!(account.balance, balance);
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_few_fields("Bob,Smith\n")]
    #[case::bad_balance("Bob,Smith,lots\n")]
    fn test_decode_account_invalid(#[case] content: &str) {
        let result = decode_account(71, content.as_bytes(), Path::new("71.txt"));
        assert!(matches!(result, Err(LedgerError::MalformedRecord { .. })));
    }

    #[test]
    fn test_write_accounts_csv_sorted() {
        let accounts = vec![
            Account::new(71, "Bob", "Smith", Decimal::new(15000, 2)),
            Account::new(70, "John", "Doe", Decimal::new(50, 0)),
        ];
        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,first_name,last_name,balance\n70,John,Doe,50.00\n71,Bob,Smith,150.00\n"
        );
    }
}
