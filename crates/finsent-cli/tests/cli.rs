//! Runs the built `finsent` binary.

use std::process::Command;

fn finsent() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_finsent"));
    cmd.env("FINSENT_ENV", "staging");
    cmd
}

#[test]
fn help_does_not_need_valid_config() {
    let output = finsent().arg("--help").output().expect("binary runs");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "stdout: {stdout}");
    assert!(stdout.contains("analyze"));
}

#[test]
fn commands_still_reject_invalid_config() {
    let output = finsent().arg("status").output().expect("binary runs");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FINSENT_ENV"), "stderr: {stderr}");
}
