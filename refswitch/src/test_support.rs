//! Fixture helpers shared by unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("fixtures")
}

pub fn copy_tree(from: &Path, to: &Path) {
    for entry in WalkDir::new(from) {
        let entry = entry.expect("walk fixture");
        let rel = entry.path().strip_prefix(from).expect("strip prefix");
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).expect("create dir");
        } else {
            fs::copy(entry.path(), &dest).expect("copy file");
        }
    }
}

/// Copies of the legacy solution and the mixin folder in a fresh temp dir.
pub struct Sandbox {
    pub dir: TempDir,
    pub solution: PathBuf,
    pub mixin: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        copy_tree(&fixtures_dir().join("legacy-solution"), &dir.path().join("legacy-solution"));
        copy_tree(&fixtures_dir().join("mixin"), &dir.path().join("mixin"));
        let root = dir.path().canonicalize().expect("canonicalize");
        Self {
            solution: root.join("legacy-solution").join("Legacy.sln"),
            mixin: root.join("mixin"),
            dir,
        }
    }

    pub fn app_project(&self) -> PathBuf {
        self.solution
            .parent()
            .expect("solution folder")
            .join("src")
            .join("App")
            .join("App.csproj")
    }

    pub fn app_packages(&self) -> PathBuf {
        self.app_project().with_file_name("packages.config")
    }

    /// Copy App to `src/<name>` with its own project id and register it in
    /// the solution after App. Returns the new project file.
    pub fn add_app_copy(&self, name: &str, id: &str) -> PathBuf {
        const APP_ID: &str = "{A0B1C2D3-1111-4A4A-9B9B-000000000001}";
        let app = self.app_project();
        let app_dir = app.parent().expect("app folder");
        let dir = app_dir.with_file_name(name);
        copy_tree(app_dir, &dir);

        let project = dir.join(format!("{name}.csproj"));
        let text = fs::read_to_string(dir.join("App.csproj")).expect("read copy");
        fs::remove_file(dir.join("App.csproj")).expect("remove copied App.csproj");
        let text = text
            .replace(APP_ID, id)
            .replace("<AssemblyName>App<", &format!("<AssemblyName>{name}<"))
            .replace("<RootNamespace>App<", &format!("<RootNamespace>{name}<"));
        fs::write(&project, text).expect("write copy");

        let sln = fs::read_to_string(&self.solution).expect("read sln");
        let block = format!(
            "Project(\"{{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}}\") = \"{name}\", \"src\\{name}\\{name}.csproj\", \"{id}\"\nEndProject\n"
        );
        let mut out = String::new();
        let mut configs: Vec<String> = Vec::new();
        for line in sln.lines() {
            if line.starts_with("Project(\"{2150E333") {
                out.push_str(&block);
            }
            if line.starts_with("\tEndGlobalSection") && !configs.is_empty() {
                for config in configs.drain(..) {
                    out.push_str(&config);
                }
            }
            if line.contains(&format!("{APP_ID}.")) {
                configs.push(format!("{}\n", line.replace(APP_ID, id)));
            }
            out.push_str(line);
            out.push('\n');
        }
        fs::write(&self.solution, out).expect("write sln");
        project
    }

    /// Bytes of every file under the sandbox, keyed by relative path.
    pub fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let root = self.dir.path();
        let mut out = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).expect("strip").to_path_buf();
                (rel, fs::read(e.path()).expect("read"))
            })
            .collect::<Vec<_>>();
        out.sort();
        out
    }
}
