//! Scoped temporary directory for one download.
use std::io;
use std::path::{Path, PathBuf};

/// Directory holding every intermediate file of a download.
///
/// The directory and everything in it is removed when the value is dropped,
/// whether the download finished, failed, or was interrupted.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Create `path` as the workspace directory.
    ///
    /// A directory that already exists at `path` is never taken over: the
    /// workspace becomes a private subdirectory of it instead, so dropping
    /// the workspace leaves the existing contents alone.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut path = path.into();
        if path.exists() {
            path.push(format!("kinescope-dl-{}", std::process::id()));
        }
        std::fs::create_dir_all(&path)?;
        trace!("Created workspace {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => trace!("Removed workspace {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove temporary directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
