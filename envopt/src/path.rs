//! Where the program lives and where its settings file is.

use std::path::{Path, PathBuf};

/// Extension of the settings file.
pub const EXTENSION: &str = "ini";

/// Executable suffixes stripped from the image name. `.exe` is always
/// recognized so a Windows-style path names the same program everywhere.
fn image_suffixes() -> impl Iterator<Item = &'static str> {
    [std::env::consts::EXE_SUFFIX, ".exe"]
        .into_iter()
        .filter(|s| !s.is_empty())
}

/// Program name from the process image path: the last path component with
/// any leading `.`/`/` characters and executable suffix removed.
///
/// `./bin/myapp.exe` → `myapp`
pub fn program_name(image: &str) -> &str {
    let base = image.rsplit(&['/', '\\'][..]).next().unwrap_or(image);
    let base = base.trim_start_matches(&['.', '/'][..]);
    for suffix in image_suffixes() {
        if let Some(stem) = base.strip_suffix(suffix) {
            if !stem.is_empty() {
                return stem;
            }
        }
    }
    base
}

/// `<program>.ini`
pub fn file_name(program: &str) -> String {
    format!("{}.{}", program, EXTENSION)
}

/// Default directories searched for the settings file, in order: the user
/// configuration directory, then each entry of `path_var` (a `PATH`-style
/// list).
pub fn default_dirs(path_var: Option<&str>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(config) = dirs::config_dir() {
        dirs.push(config);
    }
    if let Some(list) = path_var {
        dirs.extend(std::env::split_paths(list).filter(|p| !p.as_os_str().is_empty()));
    }
    dirs
}

/// First directory of `dirs` that holds a file called `name`.
pub fn find_dir(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let found = dirs.iter().find(|d| d.join(name).is_file()).cloned();
    if let Some(ref dir) = found {
        tracing::debug!(dir = %dir.display(), name, "settings directory");
    }
    found
}

/// Settings file path: `name` inside `dir`, or bare `name` (relative to the
/// working directory) when no directory was found.
pub fn initials(dir: Option<&Path>, name: &str) -> PathBuf {
    match dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
