//! End-to-end recovery tests
//!
//! These tests validate startup recovery against predefined data directory
//! fixtures. Each test:
//! 1. Copies `before/` from a fixture directory into a fresh temp directory
//! 2. Opens a ledger there, which runs the recovery scan
//! 3. Compares every remaining file (name and content) with `expected/`
//! 4. Opens the ledger again and checks that the second scan was a no-op
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Single-record updates interrupted at each recoverable state
//! - An interrupted account number allocation
//! - Transfers interrupted between and during the two commits
//! - A transfer side whose counterpart was already cleaned up
//! - Abandoned account creations
//! - Files whose names the store does not recognise

#[cfg(test)]
mod tests {
    use drove_ledger::{Ledger, StoreConfig};
    use rstest::rstest;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Every file in `dir` mapped to its content
    fn snapshot(dir: &Path) -> BTreeMap<String, String> {
        fs::read_dir(dir)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.display(), e))
            .map(|entry| {
                let entry = entry.unwrap();
                let name = entry.file_name().into_string().unwrap();
                let content = fs::read_to_string(entry.path()).unwrap();
                (name, content)
            })
            .collect()
    }

    /// Run a fixture through recovery and compare with expected/
    ///
    /// # Panics
    ///
    /// Panics if the fixture cannot be read, the ledger fails to open, or the
    /// recovered directory differs from the expected one.
    fn run_test_fixture(fixture_name: &str) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let before = Path::new(&fixture_dir).join("before");
        let expected = Path::new(&fixture_dir).join("expected");
        assert!(before.is_dir(), "Fixture not found: {}", before.display());

        let workdir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in snapshot(&before) {
            fs::write(workdir.path().join(name), content).unwrap();
        }

        Ledger::open(StoreConfig::new(workdir.path()))
            .unwrap_or_else(|e| panic!("Failed to open ledger: {}", e));

        let actual = snapshot(workdir.path());
        let expected = snapshot(&expected);
        assert_eq!(
            actual, expected,
            "\n\nDirectory mismatch for fixture: {}\n",
            fixture_name
        );

        let reopened = Ledger::open(StoreConfig::new(workdir.path())).unwrap();
        let report = reopened.last_recovery().unwrap();
        assert!(
            report.is_clean(),
            "second scan was not a no-op for fixture {}: {:?}",
            fixture_name,
            report
        );
        assert_eq!(snapshot(workdir.path()), expected);
    }

    #[rstest]
    #[case("clean")]
    #[case("update_crash_after_stage")]
    #[case("update_crash_mid_commit")]
    #[case("update_crash_before_old_removed")]
    #[case("index_crash_mid_commit")]
    #[case("transfer_crash_between_commits")]
    #[case("transfer_crash_mid_commit")]
    #[case("transfer_lone_side")]
    #[case("abandoned_creation")]
    #[case("unrecognized_files")]
    fn test_fixtures(#[case] fixture: &str) {
        run_test_fixture(fixture);
    }
}
