use predicates::prelude::*;

mod common;

use common::{fixture, Workspace};

#[test]
fn inspect_prints_hierarchy() {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("refswitch"));
    cmd.env("NO_COLOR", "1")
        .arg("inspect")
        .arg("--solution")
        .arg(fixture("legacy-solution/Legacy.sln"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "configurations: Debug|Any CPU, Release|Any CPU",
        ))
        .stdout(predicate::str::contains(r"App [C#] src\App\App.csproj"))
        .stdout(predicate::str::contains("Solution Items [Solution Folder]"));
}

#[test]
fn inspect_by_type_groups_projects() {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("refswitch"));
    cmd.env("NO_COLOR", "1")
        .arg("inspect")
        .arg("--solution")
        .arg(fixture("legacy-solution/Legacy.sln"))
        .arg("--by-type")
        .assert()
        .success()
        .stdout(predicate::str::contains("C#\n  App (src\\App\\App.csproj)"))
        .stdout(predicate::str::contains("    Debug|Any CPU, Release|Any CPU"));
}

#[test]
fn inspect_missing_solution_fails() {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("refswitch"));
    cmd.arg("inspect")
        .arg("--solution")
        .arg(fixture("legacy-solution/Missing.sln"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("inspect failed for"));
}

#[test]
fn plan_reports_both_directions_without_writing() {
    let ws = Workspace::new();
    let original = ws.snapshot();
    let output = ws
        .convert("plan")
        .arg("--format")
        .arg("json")
        .output()
        .expect("command output");
    assert!(output.status.success());
    assert_eq!(ws.snapshot(), original);

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(value["operation"], "plan");
    assert_eq!(value["candidates"][0]["output_name"], "Foo");
    assert_eq!(value["candidates"][0]["registered"], false);
    assert_eq!(value["to_project"][0]["project"], "App");
    assert_eq!(value["to_project"][0]["version"], "1.2.3");
    assert!(value["to_project"][0]["blocked"].is_null());
    assert_eq!(value["to_package"].as_array().map(Vec::len), Some(0));
}

#[test]
fn plan_after_to_project_offers_the_way_back() {
    let ws = Workspace::new();
    ws.convert("to-project").assert().success();
    ws.convert("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("[registered]"))
        .stdout(predicate::str::contains("to-package\n- App: Foo 1.2.3"));
}
