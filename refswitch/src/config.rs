//! Run configuration.
//!
//! Defaults cover the usual MSBuild layout. A `refswitch.toml` next to the
//! solution (or the file given with `--config`) can override any field:
//!
//! ```toml
//! [scan]
//! exclude_dirs = ["bin", "obj", ".git", "legacy"]
//!
//! [cache]
//! persist = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name looked up next to the solution when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "refswitch.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub files: FilesConfig,
    pub cache: CacheConfig,
    pub packages: PackagesConfig,
}

/// Candidate discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Project file extensions (without dot).
    pub project_extensions: Vec<String>,
}

impl ScanConfig {
    pub fn is_project_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.project_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: strings(&["bin", "obj", ".git", ".vs", "packages", "node_modules"]),
            project_extensions: strings(&["csproj", "vbproj", "fsproj"]),
        }
    }
}

/// File hygiene settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Build output and metadata directories skipped by `scan-files`.
    pub exclude_dirs: Vec<String>,
    /// Extensions of per-user metadata files skipped by `scan-files`.
    pub exclude_extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: strings(&["bin", "obj", ".vs", ".git", "packages", "node_modules"]),
            exclude_extensions: strings(&["user", "suo", "vspscc", "vssscc"]),
        }
    }
}

/// Reversal cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep the cache on disk between runs.
    pub persist: bool,
    /// Explicit cache file; defaults to `<solution>.refswitch.toml`.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

/// Package restore layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Restore folder relative to the solution directory.
    pub folder: String,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            folder: "packages".to_string(),
        }
    }
}

/// Errors returned when loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path.display().to_string())
    }

    fn parse(raw: &str, path: String) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Cache file for a solution, honoring the configured override.
    pub fn cache_path(&self, solution_path: &Path) -> PathBuf {
        if let Some(path) = &self.cache.path {
            return path.clone();
        }
        let mut name = solution_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".refswitch.toml");
        solution_path.with_file_name(name)
    }

    pub fn is_project_file(&self, path: &Path) -> bool {
        self.scan.is_project_file(path)
    }
}

/// Resolve the effective config: explicit file, else `refswitch.toml` in the
/// solution folder, else defaults. Returns the config and where it came from.
pub fn load_config_with_source(
    explicit: Option<&Path>,
    solution_dir: &Path,
) -> Result<(Config, String), ConfigError> {
    if let Some(path) = explicit {
        return Ok((Config::load(path)?, format!("file:{}", path.display())));
    }
    let discovered = solution_dir.join(CONFIG_FILE_NAME);
    if discovered.is_file() {
        return Ok((
            Config::load(&discovered)?,
            format!("file:{}", discovered.display()),
        ));
    }
    Ok((Config::default(), "defaults".to_string()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{load_config_with_source, Config, ConfigError};

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("refswitch.toml");
        fs::write(
            &path,
            r#"
[scan]
exclude_dirs = ["legacy"]

[cache]
persist = false
"#,
        )
        .expect("write config");

        let (config, source) =
            load_config_with_source(None, dir.path()).expect("config should load");
        assert!(source.starts_with("file:"));
        assert_eq!(config.scan.exclude_dirs, vec!["legacy"]);
        assert_eq!(config.scan.project_extensions, vec!["csproj", "vbproj", "fsproj"]);
        assert!(!config.cache.persist);
        assert_eq!(config.packages.folder, "packages");
    }

    #[test]
    fn returns_parse_error_for_invalid_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "scan = [valid").expect("write broken file");

        let err = Config::load(&path).expect_err("should fail parse");
        match err {
            ConfigError::Parse { .. } => {}
            other => panic!("unexpected error variant: {other}"),
        }
    }

    #[test]
    fn defaults_when_no_file_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (config, source) = load_config_with_source(None, dir.path()).expect("defaults");
        assert_eq!(config, Config::default());
        assert_eq!(source, "defaults");
    }

    #[test]
    fn cache_path_sits_next_to_solution() {
        let config = Config::default();
        assert_eq!(
            config.cache_path(Path::new("/work/Legacy.sln")),
            Path::new("/work/Legacy.sln.refswitch.toml")
        );
        assert!(config.is_project_file(Path::new("Foo.CSPROJ")));
        assert!(!config.is_project_file(Path::new("Foo.sln")));
    }
}
