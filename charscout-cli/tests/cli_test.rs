use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

fn write_input(dir: &TempDir, content: &str) -> Result<std::path::PathBuf> {
    let path = dir.path().join("input.txt");
    fs::write(&path, content)?;
    Ok(path)
}

fn charscout() -> Result<Command> {
    let mut cmd = Command::cargo_bin("charscout-cli")?;
    cmd.env_remove("P").env("RUST_LOG", "off");
    Ok(cmd)
}

#[test]
fn test_counts_and_writes_result_line() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "aabcaabcaa")?;
    let output = dir.path().join("out.txt");

    charscout()?
        .arg(&input)
        .arg(&output)
        .arg("a")
        .assert()
        .success()
        .stdout(predicate::str::contains("File read successfully"))
        .stdout(predicate::str::contains("total 6 occurrences"))
        .stdout(predicate::str::contains("Result written successfully"));

    assert_eq!(
        fs::read_to_string(&output)?,
        format!("The character 'a' appears 6 times in file {}.\n", input.display())
    );
    Ok(())
}

#[test]
fn test_worker_count_from_environment() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "hello world")?;
    let output = dir.path().join("out.txt");

    charscout()?
        .env("P", "7")
        .arg(&input)
        .arg(&output)
        .arg("o")
        .assert()
        .success()
        .stdout(predicate::str::contains("Using"))
        .stdout(predicate::str::contains("7"));

    assert!(fs::read_to_string(&output)?.contains("appears 2 times"));
    Ok(())
}

#[test]
fn test_non_positive_worker_count_fails() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "abc")?;
    let output = dir.path().join("out.txt");

    for bad in ["0", "-1"] {
        charscout()?
            .env("P", bad)
            .arg(&input)
            .arg(&output)
            .arg("a")
            .assert()
            .failure()
            .stderr(predicate::str::contains("worker count must be positive"));
    }
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_multi_byte_target_fails() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "abc")?;
    let output = dir.path().join("out.txt");

    charscout()?
        .arg(&input)
        .arg(&output)
        .arg("ab")
        .assert()
        .failure()
        .stderr(predicate::str::contains("single byte"));
    Ok(())
}

#[test]
fn test_empty_input_fails() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "")?;
    let output = dir.path().join("out.txt");

    charscout()?
        .arg(&input)
        .arg(&output)
        .arg("a")
        .assert()
        .failure()
        .stderr(predicate::str::contains("File is empty"));
    Ok(())
}

#[test]
fn test_missing_input_fails() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("out.txt");

    charscout()?
        .arg(dir.path().join("nope.txt"))
        .arg(&output)
        .arg("a")
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
    Ok(())
}

#[test]
fn test_non_numeric_worker_count_fails() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "abc")?;
    let output = dir.path().join("out.txt");

    for bad in ["yes", "on"] {
        charscout()?
            .env("P", bad)
            .arg(&input)
            .arg(&output)
            .arg("a")
            .assert()
            .failure()
            .stderr(predicate::str::contains("must be an integer"));
    }
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_newline_target_is_written_raw() -> Result<()> {
    let dir = tempdir()?;
    let input = write_input(&dir, "one\ntwo\n")?;
    let output = dir.path().join("out.txt");

    charscout()?
        .arg(&input)
        .arg(&output)
        .arg("\n")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output)?,
        format!("The character '\n' appears 2 times in file {}.\n", input.display())
    );
    Ok(())
}
