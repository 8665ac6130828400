//! Miscellaneous helper utilities.
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Search PATH for the first matching binary name.
#[must_use]
pub fn get_binary_path(names: &[&str]) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    let paths = env::split_paths(&path_var);

    for dir in paths {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }

            if cfg!(windows) {
                let candidate = dir.join(format!("{}.exe", name));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

/// `configured` if it points at a file, else the first `name` found in PATH,
/// else `configured` unchanged so the spawn error names it.
#[must_use]
pub fn locate_tool(configured: &Path, name: &str) -> PathBuf {
    if configured.is_file() {
        return configured.to_path_buf();
    }
    get_binary_path(&[name]).unwrap_or_else(|| configured.to_path_buf())
}

/// Ensure a file path's parent directory exists.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Move a file, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if from.is_file() => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_creates_nothing_extra() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("a.aac");
        let to = dir.path().join("out").join("b.aac");
        std::fs::write(&from, b"audio").expect("write");

        ensure_parent_dir(&to).expect("parent");
        move_file(&from, &to).expect("move");

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).expect("read"), b"audio");
    }

    #[test]
    fn bare_file_name_has_no_parent_to_create() {
        ensure_parent_dir(Path::new("video.mp4")).expect("no-op");
    }

    #[test]
    fn existing_tool_path_is_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = dir.path().join("mp4decrypt");
        std::fs::write(&tool, b"").expect("write");
        assert_eq!(locate_tool(&tool, "mp4decrypt"), tool);
    }
}
