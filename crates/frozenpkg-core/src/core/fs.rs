use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Best-effort recursive chmod so staged trees copied from read-only
/// installs (system stdlib, packed eggs) can be removed again.
#[cfg(unix)]
pub(crate) fn make_writable_recursive(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mode = meta.permissions().mode() | if meta.is_dir() { 0o700 } else { 0o600 };
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn make_writable_recursive(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
    if meta.is_dir() {
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                make_writable_recursive(&entry.path());
            }
        }
    }
}

pub(crate) fn remove_dir_all_writable(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.file_type().is_symlink() || !meta.is_dir() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
        return Ok(());
    }
    make_writable_recursive(path);
    fs::remove_dir_all(path).with_context(|| format!("failed to remove {}", path.display()))?;
    Ok(())
}

/// Marks `path` as executable (0755).
#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Per-run scratch directory.
///
/// Removed on drop, which covers both the success path and every early
/// return on failure, unless [`ScratchDir::retain`] was called.
#[derive(Debug)]
pub struct ScratchDir {
    inner: Option<tempfile::TempDir>,
    path: PathBuf,
    retain: bool,
}

impl ScratchDir {
    pub(crate) fn new_in(root: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)
                    .with_context(|| format!("failed to create {}", root.display()))?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("failed to create scratch dir under {}", root.display()))?
            }
            None => builder
                .tempdir()
                .context("failed to create scratch dir")?,
        };
        let path = dir.path().to_path_buf();
        Ok(Self {
            inner: Some(dir),
            path,
            retain: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the directory on disk after the run, for inspection.
    pub(crate) fn retain(&mut self) {
        self.retain = true;
    }

    pub(crate) fn is_retained(&self) -> bool {
        self.retain
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.inner.take() else {
            return;
        };
        let path = dir.keep();
        if self.retain {
            tracing::info!(path = %path.display(), "keeping scratch directory (debug)");
            return;
        }
        if let Err(err) = remove_dir_all_writable(&path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove scratch directory");
        }
    }
}
