use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_malformed_csv_handling() {
    let file = common::commands_file(&[
        // Valid earning
        "earning, s1, o1, i1, 1.0, 0,,",
        // Invalid op
        "invalid, s1,,,,,,",
        // Earning without an order id
        "earning, s1,,, 3.0, 0,,",
        // Valid earning again
        "earning, s1, o2, i1, 2.0, 0,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("mktledger"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("command rejected"))
        .stdout(predicate::str::contains("s1,s1,TZS,0,3,0,0,0,0"));
}

#[test]
fn test_invalid_data_types() {
    let file = common::commands_file(&[
        // Text in amount field
        "earning, s1, o1, i1, not_a_number, 0,,",
        // Text in rate field
        "earning, s1, o2, i1, 1.0, abc,,",
        // Valid earning
        "earning, s1, o3, i1, 5.0, 0,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("mktledger"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("command rejected"))
        .stdout(predicate::str::contains("s1,s1,TZS,0,5,0,0,0,0"));
}

#[test]
fn test_business_rejections_do_not_stop_the_run() {
    let file = common::commands_file(&[
        "earning, s1, o1, i1, 100, 0,,",
        // Replayed order
        "earning, s1, o1, i1, 100, 0,,",
        "payout, s1,,,,,,",
        // Nothing left to aggregate
        "payout, s1,,,,,,",
        "settle, s1,,,,,,",
        // Overdraw
        "withdraw, s1,,, 150,, 0700,",
        // Rejection without remarks
        "withdraw, s1,,, 40,, 0700,",
        "reject, s1,,,,,,",
        "reject, s1,,,,,, wrong number",
        // Commission rate of 100%
        "earning, s2, o9, i1, 10, 1,,",
    ])
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("mktledger"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("already recorded"))
        .stderr(predicate::str::contains("no unsettled earnings"))
        .stderr(predicate::str::contains("insufficient balance"))
        .stderr(predicate::str::contains("remarks are required"))
        .stdout(predicate::str::contains("s1,s1,TZS,100,0,0,100,0,0"))
        .stdout(predicate::str::contains("s2,").not());
}

#[test]
fn test_oversized_credit_is_rejected() {
    let file = common::commands_file(&[
        "earning, s1, o1, i1, 10, 0,,",
        "credit, s1,,, 50000000000000000000000000000,, adj-1,",
        "credit, s1,,, 50000000000000000000000000000,, adj-2,",
        "credit, s1,,, 2.5,, adj-3,",
    ])
    .unwrap();

    Command::new(cargo_bin!("mktledger"))
        .arg(file.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("exceeds the maximum"))
        .stdout(predicate::str::contains("s1,s1,TZS,2.5,10,0,0,0,0"));
}

#[test]
fn test_many_sellers_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sellers.csv");
    common::generate_csv(&path, 50, 20).unwrap();

    Command::new(cargo_bin!("mktledger"))
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("s50,s50,TZS,200,0,0,200,0,0"));
}
