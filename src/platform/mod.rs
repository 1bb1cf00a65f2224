use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole data directory.
pub const DATA_DIR_ENV: &str = "WORKBENCH_DATA_DIR";

/// Platform-specific operations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Build a **tokio** `Command` that runs an inline shell string.
    fn shell_inline(command: &str) -> tokio::process::Command;

    /// File names a bare executable name may have on disk (`"claude"` / `"claude.exe"`).
    fn executable_names(name: &str) -> Vec<String>;

    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Root data directory.
    /// Unix: `~/.workbench`, Windows: `%APPDATA%\workbench`.
    fn data_dir() -> PathBuf;
}

/// Honor `WORKBENCH_DATA_DIR` when set, else use the platform default.
pub(crate) fn resolve_data_dir(default: PathBuf) -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => default,
    }
}

/// Locate an executable the way a shell would: names containing a path
/// separator are checked directly, bare names are searched on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for file_name in NativePlatform::executable_names(name) {
            let full = dir.join(file_name);
            if full.is_file() {
                return Some(full);
            }
        }
    }
    None
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_executable_rejects_missing_binary() {
        assert!(find_executable("workbench-definitely-missing-binary").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_locates_sh_on_path() {
        let found = find_executable("sh").expect("sh should be on PATH");
        assert!(found.is_absolute());
    }

    #[test]
    fn find_executable_checks_explicit_paths_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "").unwrap();
        assert_eq!(find_executable(file.to_str().unwrap()), Some(file.clone()));
        assert!(find_executable(dir.path().join("nope").to_str().unwrap()).is_none());
    }
}
