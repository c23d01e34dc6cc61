use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::process::{Command, Output};

fn docdiff(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docdiff"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run docdiff")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Temp dir with a config pointing the file store at `uploads/`
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir.child("uploads/plan_v1.txt")
        .write_str("SCOPE\nA\nB\nC\n")
        .unwrap();
    dir.child("uploads/plan_v2.txt")
        .write_str("SCOPE\nA\nX\nC\nD\n")
        .unwrap();
    dir.child("docdiff.toml")
        .write_str("[storage]\nuploads_dir = \"uploads\"\n")
        .unwrap();
    dir
}

#[test]
fn test_diff_prints_text_changelog() {
    let dir = workspace();
    let output = docdiff(&dir, &["diff", "plan_v1.txt", "plan_v2.txt", "--name", "Plan"]);
    assert!(output.status.success());

    let report = stdout(&output);
    assert!(predicate::str::starts_with("# Changelog: Plan (v1 → v2)\n\nGenerated: ").eval(&report));
    assert!(predicate::str::contains(
        "## Document Information\n- Original: Plan (v1)\n- New: Plan (v2)\n\n## Changes\n* Modified: B → X\n+ Added: D\n"
    )
    .eval(&report));
    assert!(predicate::str::contains("## Resolved Comments").not().eval(&report));
}

#[test]
fn test_diff_with_comments_and_explicit_versions() {
    let dir = workspace();
    dir.child("comments.json")
        .write_str(
            r#"[{"id": "c1", "text": "Rename B", "resolution": "Now X",
                "resolved_by": "alex", "resolved_at": "2024-05-06T07:08:09+00:00"}]"#,
        )
        .unwrap();

    let output = docdiff(
        &dir,
        &[
            "diff",
            "plan_v1.txt",
            "plan_v2.txt",
            "--from-version",
            "3",
            "--to-version",
            "5",
            "--comments",
            "comments.json",
        ],
    );
    assert!(output.status.success());

    let report = stdout(&output);
    assert!(predicate::str::contains("# Changelog: plan_v1.txt (v3 → v5)").eval(&report));
    assert!(predicate::str::contains(
        "\n## Resolved Comments\n- Comment: Rename B\n  Resolution: Now X\n  Resolved by: alex\n\n"
    )
    .eval(&report));
}

#[test]
fn test_json_output_to_file() {
    let dir = workspace();
    let output = docdiff(
        &dir,
        &["diff", "plan_v1.txt", "plan_v2.txt", "--format", "json", "--output", "out.json"],
    );
    assert!(output.status.success());
    dir.child("out.json").assert(predicate::path::exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
    assert_eq!(json["changes"]["kind"], "text");
    assert_eq!(json["changes"]["entries"][0]["type"], "modification");
    assert_eq!(json["new"]["parent_id"], "plan_v1.txt");
    assert_eq!(json["original_fingerprint"].as_str().map(str::len), Some(64));
}

#[test]
fn test_missing_files_still_produce_a_report() {
    let dir = workspace();
    let output = docdiff(&dir, &["diff", "nope_v1.docx", "nope_v2.docx"]);
    assert!(output.status.success());
    assert!(predicate::str::contains("## Changes\n").eval(&stdout(&output)));
}

#[test]
fn test_inspect_sections() {
    let dir = workspace();
    let output = docdiff(&dir, &["inspect", "plan_v2.txt", "--sections"]);
    assert!(output.status.success());

    let report = stdout(&output);
    assert!(predicate::str::contains("Format: text\n").eval(&report));
    assert!(predicate::str::contains("  line_count: 5\n").eval(&report));
    assert!(predicate::str::contains("\n## SCOPE\nA\nX\nC\nD\n").eval(&report));
}

#[test]
fn test_init_writes_config_once() {
    let dir = TempDir::new().unwrap();
    let target = dir.child("project");

    let first = docdiff(&dir, &["init", "--path", "project"]);
    assert!(first.status.success());
    target
        .child("docdiff.toml")
        .assert(predicate::str::contains("uploads_dir = \"uploads\""));

    let second = docdiff(&dir, &["init", "--path", "project"]);
    assert!(!second.status.success());

    let forced = docdiff(&dir, &["init", "--path", "project", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn test_version_zero_is_rejected() {
    let dir = workspace();
    let output = docdiff(&dir, &["diff", "plan_v1.txt", "plan_v2.txt", "--from-version", "0"]);
    assert!(!output.status.success());

    let output = docdiff(&dir, &["diff", "plan_v1.txt", "plan_v2.txt", "--to-version", "0"]);
    assert!(!output.status.success());
}

#[test]
fn test_last_from_version_needs_explicit_to_version() {
    let dir = workspace();
    let max = u32::MAX.to_string();

    let output = docdiff(&dir, &["diff", "plan_v1.txt", "plan_v2.txt", "--from-version", &max]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("--to-version").eval(&String::from_utf8_lossy(&output.stderr)));

    let output = docdiff(
        &dir,
        &["diff", "plan_v1.txt", "plan_v2.txt", "--from-version", &max, "--to-version", "1"],
    );
    assert!(output.status.success());
    assert!(predicate::str::contains(format!("(v{} → v1)", max)).eval(&stdout(&output)));
}
