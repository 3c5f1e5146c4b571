//! CLI integration tests for the fdsplice binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::process::Stdio;

fn cmd() -> Command {
    Command::cargo_bin("fdsplice").unwrap()
}

#[test]
fn help_lists_options() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--pipe-capacity"))
        .stdout(predicate::str::contains("--progress"));
}

#[test]
fn copies_file_to_file() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
    src.write_all(&data).unwrap();
    src.flush().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dst = dir.path().join("copy.bin");

    cmd()
        .arg(src.path())
        .arg(&dst)
        .args(["--pipe-capacity", "65536"])
        .assert()
        .success();

    assert_eq!(std::fs::read(&dst).unwrap(), data);
}

#[test]
fn copies_stdin_to_stdout() {
    cmd()
        .args(["-", "-"])
        .write_stdin("ABCDEFGHIJ")
        .assert()
        .success()
        .stdout("ABCDEFGHIJ");
}

#[test]
fn progress_is_reported_on_stderr() {
    cmd()
        .args(["-", "-", "--progress"])
        .write_stdin("ABCDEFGHIJ")
        .assert()
        .success()
        .stderr(predicate::str::contains("10 bytes"));
}

#[test]
fn missing_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg(dir.path().join("does-not-exist"))
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn unpollable_stdout_keeps_its_blocking_mode() {
    let mut src = tempfile::NamedTempFile::new().unwrap();
    src.write_all(b"ABCDEFGHIJ").unwrap();
    src.flush().unwrap();

    let devnull = OpenOptions::new().write(true).open("/dev/null").unwrap();
    let flags = || unsafe { libc::fcntl(devnull.as_raw_fd(), libc::F_GETFL) };
    assert_eq!(flags() & libc::O_NONBLOCK, 0);

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_fdsplice"))
        .arg(src.path())
        .arg("-")
        .stdout(Stdio::from(devnull.try_clone().unwrap()))
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(flags() & libc::O_NONBLOCK, 0);
}
