//! I/O module
//!
//! Handles the CSV encoding of record files and account listings.
//!
//! # Components
//!
//! - `csv_format` - Record (de)serialization and listing output

pub mod csv_format;

pub use csv_format::{decode_account, encode_account, write_accounts_csv, AccountRow};
