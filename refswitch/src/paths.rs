//! Path handling for manifest-relative paths.
//!
//! Manifests store paths with `\` separators relative to the solution or
//! project folder. These helpers resolve them lexically (no symlink
//! resolution, the files may not exist yet) and render them back.

use std::path::{Component, Path, PathBuf};

/// Resolve a manifest path (either separator) against `base`.
pub fn resolve(base: &Path, manifest_path: &str) -> PathBuf {
    normalize(&base.join(to_native(manifest_path)))
}

/// Convert a manifest path to a native relative path.
pub fn to_native(manifest_path: &str) -> PathBuf {
    PathBuf::from(manifest_path.trim().replace('\\', "/"))
}

/// Render a relative path the way solution and project manifests store it.
pub fn to_manifest(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("\\")
}

/// Make `path` absolute against the current directory and normalize it.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    Ok(normalize(&std::env::current_dir()?.join(path)))
}

/// Lexically remove `.` and resolve `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    _ => false,
                };
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Relative path from directory `from` to `to`. Both should be absolute.
pub fn relative_to(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts = from.components().collect::<Vec<_>>();
    let to_parts = to.components().collect::<Vec<_>>();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| components_equal(a, b))
        .count();

    let mut out = PathBuf::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// Manifests are usually authored on case-insensitive file systems, so path
/// identity ignores ASCII case.
pub fn same_path(a: &Path, b: &Path) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    a.to_string_lossy()
        .eq_ignore_ascii_case(b.to_string_lossy().as_ref())
}

fn components_equal(a: &Component<'_>, b: &Component<'_>) -> bool {
    a.as_os_str()
        .to_string_lossy()
        .eq_ignore_ascii_case(b.as_os_str().to_string_lossy().as_ref())
}
