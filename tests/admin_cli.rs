use predicates::prelude::*;

#[test]
fn resources_lists_the_managed_tables() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "resources"])
        .assert()
        .success()
        .stdout(predicate::str::contains("books"))
        .stdout(predicate::str::contains("favorites"));
}

#[test]
fn category_add_then_list() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = dir.path().join("catalog.db");
    let db = db.to_str().expect("utf-8 temp path");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "category", "add", "--db", db, "Science fiction"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created category Science fiction"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "list", "--db", db, "categories"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id\tname"))
        .stdout(predicate::str::contains("Science fiction"));
}

#[test]
fn list_emits_json_when_asked() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = dir.path().join("catalog.db");
    let db = db.to_str().expect("utf-8 temp path");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "category", "add", "--db", db, "Fantasy"])
        .assert()
        .success();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "list", "--db", db, "categories", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "Fantasy""#));
}

#[test]
fn unknown_resource_is_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = dir.path().join("catalog.db");
    let db = db.to_str().expect("utf-8 temp path");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.args(["admin", "list", "--db", db, "wizards"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("book-tracker");
    cmd.env("RUST_LOG", "debug")
        .args(["admin", "resources"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
