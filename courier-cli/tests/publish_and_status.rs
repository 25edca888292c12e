use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn courier_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("courier"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

/// Registers `acme/api` with a root target and records `foo` v1.
fn seed(home: &TempDir) {
    courier_cmd(home.path())
        .args(["repo", "add", "acme/api", "--org", "acme"])
        .assert()
        .success()
        .stdout(contains("acme-api"));
    courier_cmd(home.path())
        .args(["target", "add", "acme-api", "--name", "root"])
        .assert()
        .success()
        .stdout(contains("acme-api-root"));
    add_version(home, "foo", "Always wrap errors with context.\n");
}

fn add_version(home: &TempDir, slug: &str, body: &str) {
    let file = home.path().join(format!("{slug}.md"));
    fs::write(&file, body).expect("write artifact body");
    courier_cmd(home.path())
        .args(["artifact", "add", slug, "--org", "acme", "--kind", "standard", "--file"])
        .arg(&file)
        .assert()
        .success();
}

fn agents_md(home: &TempDir) -> String {
    fs::read_to_string(home.path().join(".courier/checkouts/acme/api/AGENTS.md"))
        .expect("AGENTS.md in checkout")
}

#[test]
fn publish_writes_checkout_and_status_reports_up_to_date() {
    let home = TempDir::new().expect("home");
    seed(&home);

    courier_cmd(home.path())
        .args(["publish", "--target", "acme-api-root", "--artifact", "foo-v1"])
        .assert()
        .success()
        .stdout(contains("acme-api-root"));

    let agents = agents_md(&home);
    assert!(agents.contains("<!-- start: foo -->"));
    assert!(agents.contains("Always wrap errors with context."));
    assert!(home.path().join(".courier/checkouts/acme/api/.courier/HEAD").exists());

    let assert = courier_cmd(home.path())
        .args(["status", "--org", "acme", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("parse status json");

    let top_keys: BTreeSet<String> = payload
        .as_object()
        .expect("status root object")
        .keys()
        .cloned()
        .collect();
    let expected: BTreeSet<String> = ["repositories", "targets", "artifacts"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(top_keys, expected);

    let target = &payload["targets"][0];
    assert_eq!(target["target"]["id"], "acme-api-root");
    assert_eq!(target["has_outdated"], false);
    assert_eq!(target["artifacts"][0]["slug"], "foo");
    assert_eq!(target["artifacts"][0]["deployed_version"], 1);
}

#[test]
fn new_version_marks_target_outdated_until_republished() {
    let home = TempDir::new().expect("home");
    seed(&home);
    courier_cmd(home.path())
        .args(["publish", "--target", "acme-api-root", "--artifact", "foo-v1"])
        .assert()
        .success();

    add_version(&home, "foo", "Wrap errors and log them once.\n");
    courier_cmd(home.path())
        .args(["status", "--org", "acme"])
        .assert()
        .success()
        .stdout(contains("OUTDATED"));

    courier_cmd(home.path())
        .args(["diff", "--target", "acme-api-root", "--artifact", "foo-v2"])
        .assert()
        .success()
        .stdout(contains("+Wrap errors and log them once."))
        .stdout(contains("-Always wrap errors with context."));

    courier_cmd(home.path())
        .args(["publish", "--target", "acme-api-root", "--artifact", "foo-v2"])
        .assert()
        .success();
    assert!(agents_md(&home).contains("Wrap errors and log them once."));
    assert_eq!(agents_md(&home).matches("<!-- start: foo -->").count(), 1);

    courier_cmd(home.path())
        .args(["status", "--org", "acme"])
        .assert()
        .success()
        .stdout(contains("UP TO DATE"));
}

#[test]
fn render_modes_drive_published_files() {
    let home = TempDir::new().expect("home");
    seed(&home);

    courier_cmd(home.path())
        .args(["render-modes", "show", "--org", "acme"])
        .assert()
        .success()
        .stdout(contains("AGENTS_MD"));
    courier_cmd(home.path())
        .args(["render-modes", "set", "--org", "acme", "claude", "cursor"])
        .assert()
        .success()
        .stdout(contains("CLAUDE, CURSOR"));

    courier_cmd(home.path())
        .args(["publish", "--target", "acme-api-root", "--artifact", "foo-v1"])
        .assert()
        .success();

    let checkout = home.path().join(".courier/checkouts/acme/api");
    assert!(checkout.join("CLAUDE.md").exists());
    assert!(checkout.join(".cursor/rules/packmind/standard-foo.mdc").exists());
    assert!(!checkout.join("AGENTS.md").exists());
}

#[test]
fn unknown_target_is_rejected_without_writing() {
    let home = TempDir::new().expect("home");
    seed(&home);

    courier_cmd(home.path())
        .args(["publish", "--target", "nope", "--artifact", "foo-v1"])
        .assert()
        .failure()
        .stderr(contains("target 'nope' not found"));
    assert!(!home.path().join(".courier/checkouts").exists());
}

#[test]
fn repo_add_requires_owner_and_name() {
    let home = TempDir::new().expect("home");
    courier_cmd(home.path())
        .args(["repo", "add", "just-a-name", "--org", "acme"])
        .assert()
        .failure()
        .stderr(contains("expected '<owner>/<repo>'"));
}
