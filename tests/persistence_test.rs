#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: open a wallet, deposit and request a withdrawal
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "type, user, target, amount, reference").unwrap();
    writeln!(csv1, "open, 1").unwrap();
    writeln!(csv1, "deposit, 1, , 100.0, pay_1").unwrap();
    writeln!(csv1, "withdraw, 1, , 40").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("coinledger"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,60\n"));

    // 2. Second run: the replayed gateway reference is still known, and the
    //    withdrawal from the first run can be rejected
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "type, user, target, amount, reference").unwrap();
    writeln!(csv2, "deposit, 1, , 100.0, pay_1").unwrap();
    writeln!(csv2, "deposit, 1, , 50.0, pay_2").unwrap();
    writeln!(csv2, "reject, , , , 1").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("coinledger"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // 60 recovered + 50 new + 40 refunded = 150
    assert!(stdout2.contains("1,150\n"), "unexpected output: {stdout2}");
}
