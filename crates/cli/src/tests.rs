use super::*;

use std::fs;
use std::path::{Path, PathBuf};

use richacl::{InitNamespace, RichAcl};

fn run_cli(args: &[&str]) -> (i32, String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(args.iter().copied(), &mut stdout, &mut stderr);
    (
        code,
        String::from_utf8(stdout).expect("utf-8 stdout"),
        String::from_utf8(stderr).expect("utf-8 stderr"),
    )
}

fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write input");
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn version_goes_to_stdout() {
    let (code, stdout, stderr) = run_cli(&["richacl", "--version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stderr.is_empty());
}

#[test]
fn missing_command_is_a_usage_error() {
    let (code, stdout, stderr) = run_cli(&["richacl"]);
    assert_eq!(code, EXIT_FAILURE);
    assert!(stdout.is_empty());
    assert!(!stderr.is_empty());
}

#[test]
fn decode_prints_text_form() {
    let dir = tempfile::tempdir().expect("tempdir");
    let acl: RichAcl = "everyone@:r::allow\n".parse().expect("acl");
    let bytes = richacl::encode(&acl, &InitNamespace).expect("encode");
    let input = write_file(dir.path(), "acl.bin", bytes);

    let (code, stdout, _) = run_cli(&["richacl", "decode", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "everyone@:r::allow\n");
}

#[test]
fn decode_json_is_an_object() {
    let dir = tempfile::tempdir().expect("tempdir");
    let acl: RichAcl = "owner@:rw::allow\n".parse().expect("acl");
    let bytes = richacl::encode(&acl, &InitNamespace).expect("encode");
    let input = write_file(dir.path(), "acl.bin", bytes);

    let (code, stdout, _) = run_cli(&["richacl", "decode", "--json", arg(&input)]);
    assert_eq!(code, 0);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert!(value.get("entries").is_some_and(serde_json::Value::is_array));
}

#[test]
fn decode_rejects_corrupt_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.bin", [7u8; 16]);

    let (code, stdout, stderr) = run_cli(&["richacl", "decode", arg(&input)]);
    assert_eq!(code, EXIT_FAILURE);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("richacl: "));
}

#[test]
fn encode_to_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = "flags:a\nowner@:rwp:fd:allow\ngroup:7:x::deny\n";
    let input = write_file(dir.path(), "acl.txt", text);
    let output = dir.path().join("acl.bin");

    let (code, stdout, _) = run_cli(&["richacl", "encode", arg(&input), "-o", arg(&output)]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());

    let bytes = fs::read(&output).expect("output written");
    let decoded = richacl::decode(&bytes, &InitNamespace).expect("decode");
    assert_eq!(decoded, text.parse::<RichAcl>().expect("acl"));
}

#[test]
fn masks_are_printed_before_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "owner@:rw::allow\neveryone@:r::allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "masks", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(
        stdout,
        "owner:rw::mask\ngroup:r::mask\nother:r::mask\nowner@:rw::allow\neveryone@:r::allow\n"
    );
}

#[test]
fn check_reports_each_intent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "owner@:w::deny\nowner@:rw::allow\n");

    let (code, stdout, _) = run_cli(&[
        "richacl", "check", arg(&input), "read", "write", "--uid", "1000", "--owner", "1000",
    ]);
    assert_eq!(code, EXIT_NEGATIVE);
    assert_eq!(
        stdout,
        "read: granted (owner class)\nwrite: denied w (owner class)\n"
    );
}

#[test]
fn check_all_granted_exits_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "group:50:rx::allow\n");

    let (code, stdout, _) = run_cli(&[
        "richacl", "--uid", "7", "--groups", "50", "check", arg(&input), "read+exec", "--json",
    ]);
    assert_eq!(code, 0);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(value[0]["intent"], "read+exec");
    assert_eq!(value[0]["granted"], true);
}

#[test]
fn chmod_masks_the_acl() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "everyone@:rwx::allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "chmod", arg(&input), "--mode", "0750"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("flags:wm\n"));
    assert!(stdout.contains("other:::mask\n"));
}

#[test]
fn equiv_mode_prints_octal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(
        dir.path(),
        "acl.txt",
        "owner@:rwp::allow\ngroup@:r::allow\neveryone@:r::allow\n",
    );

    let (code, stdout, _) = run_cli(&["richacl", "equiv-mode", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "0644\n");
}

#[test]
fn named_entries_have_no_equivalent_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "user:5:r::allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "equiv-mode", arg(&input)]);
    assert_eq!(code, EXIT_NEGATIVE);
    assert_eq!(stdout, "not equivalent to a mode\n");
}

#[test]
fn inherit_keeps_file_entries_inherit_only_on_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "everyone@:r:f:allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "inherit", "--dir", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "everyone@:r:fi:allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "inherit", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "everyone@:r::allow\n");
}

#[test]
fn inherit_without_inheritable_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "everyone@:r::allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "inherit", arg(&input)]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "nothing inherited\n");
}

#[test]
fn create_folds_equivalent_acl_into_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "everyone@:r:f:allow\n");

    let (code, stdout, _) = run_cli(&["richacl", "create", arg(&input), "--mode", "0644"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "mode: 0444\n");
}

#[test]
fn create_keeps_acl_with_named_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(
        dir.path(),
        "acl.txt",
        "user:42:rwp:f:allow\neveryone@:r:f:allow\n",
    );

    let (code, stdout, _) = run_cli(&["richacl", "create", arg(&input), "--mode", "0640"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("mode: 0640\nflags:m\n"));
    assert!(stdout.contains("group:r::mask\n"));
    assert!(stdout.contains("user:42:rwp::allow\n"));
}

#[test]
fn missing_input_names_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.txt");

    let (code, _, stderr) = run_cli(&["richacl", "masks", arg(&missing)]);
    assert_eq!(code, EXIT_FAILURE);
    assert!(stderr.starts_with("richacl: "));
    assert!(stderr.contains("absent.txt"));
}

#[test]
fn malformed_text_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_file(dir.path(), "acl.txt", "owner@:rw::allow\nnonsense\n");

    let (code, _, stderr) = run_cli(&["richacl", "masks", arg(&input)]);
    assert_eq!(code, EXIT_FAILURE);
    assert!(stderr.starts_with("richacl: "));
}

#[test]
fn exit_codes_are_clamped() {
    assert_eq!(exit_code_from(-3), std::process::ExitCode::from(0));
    assert_eq!(exit_code_from(300), std::process::ExitCode::from(255));
}
