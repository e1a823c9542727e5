use std::fs;

use predicates::prelude::*;

mod common;

use common::Workspace;

const GHOST: &str = "    <ProjectReference Include=\"..\\Ghost\\Ghost.csproj\">\n      <Project>{C0C1C2C3-9999-4C4C-9D9D-000000000009}</Project>\n      <Name>Ghost</Name>\n    </ProjectReference>\n";

fn add_ghost_reference(ws: &Workspace) {
    let app = ws.app_dir().join("App.csproj");
    let text = fs::read_to_string(&app).expect("read app");
    let anchor = "    <Reference Include=\"System\" />\n";
    assert!(text.contains(anchor));
    fs::write(&app, text.replace(anchor, &format!("{anchor}{GHOST}"))).expect("write app");
}

#[test]
fn scan_references_on_healthy_solution_succeeds() {
    let ws = Workspace::new();
    ws.command("scan-references")
        .assert()
        .success()
        .stdout(predicate::str::contains("dangling\n- none"))
        .stdout(predicate::str::contains("(unreferenced)"))
        .stdout(predicate::str::contains("missing on disk").not());
}

#[test]
fn dangling_reference_fails_scan_until_cleaned_up() {
    let ws = Workspace::new();
    add_ghost_reference(&ws);

    ws.command("scan-references")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            r"! App: Ghost -> ..\Ghost\Ghost.csproj (unknown project)",
        ))
        .stderr(predicate::str::contains("scan-references finished with failures"));

    ws.command("cleanup-references")
        .assert()
        .success()
        .stdout(predicate::str::contains(r"- App: Ghost -> ..\Ghost\Ghost.csproj"));

    let app = fs::read_to_string(ws.app_dir().join("App.csproj")).expect("read app");
    assert!(!app.contains("Ghost"));
    assert!(app.contains("Newtonsoft.Json"));

    ws.command("scan-references").assert().success();
}

#[test]
fn cleanup_on_healthy_solution_changes_nothing() {
    let ws = Workspace::new();
    let original = ws.snapshot();
    ws.command("cleanup-references")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed\n- none"));
    assert_eq!(ws.snapshot(), original);
}

#[test]
fn scan_files_lists_only_undeclared_sources() {
    let ws = Workspace::new();
    let app = ws.app_dir();
    fs::write(app.join("Extra.cs"), "class Extra {}\n").expect("write extra");
    fs::write(app.join("App.csproj.user"), "<Project />\n").expect("write user file");
    fs::create_dir_all(app.join("bin").join("Debug")).expect("create bin");
    fs::write(app.join("bin").join("Debug").join("App.exe"), b"MZ").expect("write output");
    let before = ws.snapshot();

    ws.command("scan-files")
        .assert()
        .success()
        .stdout(predicate::str::contains("? App: Extra.cs"))
        .stdout(predicate::str::contains("App.csproj.user").not())
        .stdout(predicate::str::contains("App.exe").not())
        .stdout(predicate::str::contains("Program.cs").not());
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn clean_files_deletes_what_the_scan_found() {
    let ws = Workspace::new();
    let app = ws.app_dir();
    fs::write(app.join("Extra.cs"), "class Extra {}\n").expect("write extra");
    fs::create_dir_all(app.join("bin")).expect("create bin");
    fs::write(app.join("bin").join("App.exe"), b"MZ").expect("write output");

    ws.command("clean-files")
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"))
        .stdout(predicate::str::contains("Extra.cs"));

    assert!(!app.join("Extra.cs").exists());
    assert!(app.join("bin").join("App.exe").is_file());
    assert!(app.join("Program.cs").is_file());
    assert!(app.join("packages.config").is_file());
}
