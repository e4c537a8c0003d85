use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn bibbuilder() -> Command {
    Command::cargo_bin("bibbuilder").unwrap()
}

#[test]
fn test_cli_merge_writes_output() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();
    fs::write(dir.path().join("b.bib"), "@article{K2, title = {Two}}\n").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "b.bib", "-o", "out.bib", "-x", "error"])
        .assert()
        .success();

    let merged = fs::read_to_string(dir.path().join("out.bib")).unwrap();
    assert!(merged.contains("@article{K1"));
    assert!(merged.contains("@article{K2"));
}

#[test]
fn test_cli_merge_no_clobber_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();
    fs::write(dir.path().join("merged.bib"), "keep me").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "--no-clobber"])
        .assert()
        .code(1)
        .stderr(contains("exists"));

    assert_eq!(fs::read_to_string(dir.path().join("merged.bib")).unwrap(), "keep me");
}

#[test]
fn test_cli_merge_error_policy_exit_code() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();
    fs::write(dir.path().join("b.bib"), "@article{K1, title = {Two}}\n").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "b.bib", "-x", "error", "-c"])
        .assert()
        .code(1)
        .stderr(contains("Duplicate key (K1)"));
    assert!(!dir.path().join("merged.bib").exists());
}

#[test]
fn test_cli_merge_user_abort_exit_code() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();
    fs::write(dir.path().join("b.bib"), "@article{K1, title = {Two}}\n").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "b.bib"])
        .write_stdin("4\n")
        .assert()
        .code(2)
        .stdout(contains("Conflicting key \"K1\""));
}

#[test]
fn test_cli_merge_ask_keep_incoming() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();
    fs::write(dir.path().join("b.bib"), "@article{K1, title = {Two}}\n").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "b.bib", "-x", "ask"])
        .write_stdin("2\n")
        .assert()
        .success();

    let merged = fs::read_to_string(dir.path().join("merged.bib")).unwrap();
    assert!(merged.contains("title = {Two}"));
    assert!(!merged.contains("title = {One}"));
}

#[test]
fn test_cli_build_requires_bib_file() {
    bibbuilder()
        .env_remove("BIBBUILDER_BIB_FILE")
        .arg("build")
        .assert()
        .code(1)
        .stderr(contains("BIBBUILDER_BIB_FILE"));
}

#[test]
fn test_cli_build_empty_folder() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("papers")).unwrap();

    bibbuilder()
        .env_remove("BIBBUILDER_PDF_DIR")
        .env_remove("BIBBUILDER_NO_DUP")
        .args(["build", "refs.bib", "--pdf-top-dir", "papers", "--no-duplicates"])
        .arg("--working-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("refs.bib: 0 added, 0 skipped, 0 failed, 0 pruned"));

    let saved = fs::read_to_string(dir.path().join("refs.bib")).unwrap();
    assert!(saved.contains("%BIBBUILDER_NO_DUP=True"));
    assert!(saved.contains("%BIBBUILDER_PDF_DIR=papers"));

    let log = fs::read_to_string(dir.path().join("refs.log")).unwrap();
    assert!(log.contains("# BibBuilder: operating on refs.bib at "));
}

#[test]
fn test_cli_merge_quiet_prints_nothing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bib"), "@article{K1, title = {One}}\n").unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["merge", "a.bib", "-q"])
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
    assert!(dir.path().join("merged.bib").exists());
}

#[test]
fn test_cli_web() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("pubs.bib"),
        "@article{A, author = {Smith, John}, title = {First}, year = {2019}}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("pubs.html"),
        "<body>\n<!--START BIB-->\n<!--END BIB-->\n</body>\n",
    )
    .unwrap();

    bibbuilder()
        .current_dir(dir.path())
        .args(["web", "pubs.bib", "pubs.html", "-a", "Smith"])
        .assert()
        .success();

    let html = fs::read_to_string(dir.path().join("pubs.html")).unwrap();
    assert!(html.contains("<p><strong>Smith, John</strong>, First, 2019.</p>"));
    assert!(dir.path().join("pubs.html.bak").exists());
}
