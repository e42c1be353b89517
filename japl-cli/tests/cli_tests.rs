//! End-to-end CLI behavior: help/version output, compiling a file to a
//! `.japlc` artifact, `-o`/`-nd` flag handling, and the inert flags
//! reporting themselves as unsupported instead of being rejected.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn jpl() -> Command {
  Command::new(env!("CARGO_BIN_EXE_jpl"))
}

#[test]
fn help_mentions_usage() {
  jpl().arg("--help").assert().success().stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_succeeds() {
  jpl().arg("--version").assert().success().stdout(predicate::str::contains("jpl"));
}

#[test]
fn compiles_file_to_default_artifact_path() {
  let dir = TempDir::new().expect("tempdir");
  let src_path = dir.path().join("hello.jpl");
  std::fs::write(&src_path, "var x = 1 + 2;\n").unwrap();

  jpl().arg(&src_path).assert().success();

  assert!(dir.path().join("hello.japlc").exists());
}

#[test]
fn writes_artifact_to_custom_output_path() {
  let dir = TempDir::new().expect("tempdir");
  let src_path = dir.path().join("hello.jpl");
  let out_path = dir.path().join("custom.japlc");
  std::fs::write(&src_path, "var x = 1;\n").unwrap();

  jpl().arg(&src_path).arg("-o").arg(&out_path).assert().success();

  assert!(out_path.exists());
}

#[test]
fn nodump_skips_writing_an_artifact() {
  let dir = TempDir::new().expect("tempdir");
  let src_path = dir.path().join("hello.jpl");
  std::fs::write(&src_path, "var x = 1;\n").unwrap();

  jpl().arg(&src_path).arg("-n").assert().success();

  assert!(!dir.path().join("hello.japlc").exists());
}

#[test]
fn inline_string_source_compiles() {
  let dir = TempDir::new().expect("tempdir");
  let out_path = dir.path().join("inline.japlc");

  jpl().arg("-s").arg("1 + 2;").arg("-o").arg(&out_path).assert().success();

  assert!(out_path.exists());
}

#[test]
fn compile_error_exits_nonzero_and_reports_diagnostic() {
  let dir = TempDir::new().expect("tempdir");
  let src_path = dir.path().join("bad.jpl");
  std::fs::write(&src_path, "var = ;\n").unwrap();

  jpl().arg(&src_path).assert().failure().stderr(predicate::str::contains("fatal error"));
}

#[test]
fn interactive_flag_is_accepted_but_reported_unsupported() {
  let dir = TempDir::new().expect("tempdir");
  let src_path = dir.path().join("hello.jpl");
  std::fs::write(&src_path, "var x = 1;\n").unwrap();

  jpl().arg(&src_path).arg("-i").assert().success().stderr(predicate::str::contains("not supported outside the VM/REPL driver"));
}
