#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("fixtures")
        .join(path)
}

pub fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("path should be valid utf-8")
}

fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read fixture dir") {
        let entry = entry.expect("fixture entry");
        let dest = to.join(entry.file_name());
        if entry.file_type().expect("file type").is_dir() {
            copy_tree(&entry.path(), &dest);
        } else {
            fs::copy(entry.path(), &dest).expect("copy fixture file");
        }
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let entry = entry.expect("dir entry");
        let path = entry.path();
        if entry.file_type().expect("file type").is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).expect("strip prefix").to_path_buf();
            out.push((rel, fs::read(&path).expect("read file")));
        }
    }
}

/// The legacy solution and the mixin folder, copied side by side.
pub struct Workspace {
    pub dir: TempDir,
    pub solution: PathBuf,
    pub mixin: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        copy_tree(&fixture("legacy-solution"), &dir.path().join("legacy-solution"));
        copy_tree(&fixture("mixin"), &dir.path().join("mixin"));
        let root = dir.path().canonicalize().expect("canonicalize tempdir");
        Self {
            solution: root.join("legacy-solution").join("Legacy.sln"),
            mixin: root.join("mixin"),
            dir,
        }
    }

    pub fn app_dir(&self) -> PathBuf {
        self.solution
            .parent()
            .expect("solution folder")
            .join("src")
            .join("App")
    }

    pub fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut out = Vec::new();
        collect(self.dir.path(), self.dir.path(), &mut out);
        out.sort();
        out
    }

    /// A `refswitch` invocation of `operation` against this solution.
    pub fn command(&self, operation: &str) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("refswitch"));
        cmd.env("NO_COLOR", "1")
            .env_remove("REFSWITCH_LOG")
            .arg(operation)
            .arg("--solution")
            .arg(&self.solution);
        cmd
    }

    /// Like [`Workspace::command`], with `--folder` pointing at the mixin.
    pub fn convert(&self, operation: &str) -> Command {
        let mut cmd = self.command(operation);
        cmd.arg("--folder").arg(&self.mixin);
        cmd
    }
}
