//! Integration tests for the `mud` binary serving requests on stdio.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::{contains, is_empty};
use tempfile::TempDir;

fn stdio_command(runtime: &TempDir) -> assert_cmd::Command {
    let mut command = cargo_bin_cmd!("mud");
    command
        .env("MUD_MODE", "stdio")
        .env("MUD_LOG_FILTER", "mud=warn")
        .env("XDG_RUNTIME_DIR", runtime.path())
        .env(
            "MUD_BUS_SOCKET",
            format!("unix://{}/bus.sock", runtime.path().display()),
        );
    command
}

#[test]
fn ping_then_quit_answers_and_exits() {
    let runtime = TempDir::new().expect("runtime dir");
    stdio_command(&runtime)
        .write_stdin("(ping)\n(quit)\n(ping)\n")
        .assert()
        .success()
        .stdout(contains("(:pong \"mu\" :props (:version"));
}

#[test]
fn unknown_commands_are_reported_in_band() {
    let runtime = TempDir::new().expect("runtime dir");
    stdio_command(&runtime)
        .write_stdin("(frobnicate)\n")
        .assert()
        .success()
        .stdout(contains("(:error 101 :message \"unknown command 'frobnicate'\")"));
}

#[test]
fn invalid_configuration_exits_with_failure() {
    let runtime = TempDir::new().expect("runtime dir");
    stdio_command(&runtime)
        .env("MUD_BUS_SOCKET", "invalid://socket")
        .write_stdin("(ping)\n")
        .assert()
        .failure()
        .stdout(is_empty());
}
