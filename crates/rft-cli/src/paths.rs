//! Derived output path handling, matching the reference receiver's
//! filename convention: the transmitted name (which may carry a directory
//! component) gets a literal `.recv` suffix appended, and that directory is
//! created (mode 0700 on Unix) if it doesn't already exist.

use std::path::{Path, PathBuf};

/// Append `.recv` to the transmitted name, preserving any directory
/// component it carries.
pub fn derive_recv_path(transmitted_name: &str) -> PathBuf {
    let mut os = Path::new(transmitted_name).as_os_str().to_owned();
    os.push(".recv");
    PathBuf::from(os)
}

/// Create `path`'s parent directory if it's named and absent. Single-level,
/// matching the reference receiver's one-shot `mkdir`, not a recursive
/// `mkdir -p`.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    if parent.exists() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new().mode(0o700).create(parent)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir(parent)
    }
}
