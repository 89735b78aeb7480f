use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What a single [`collect`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination already existed; nothing was touched.
    AlreadyPresent,
    /// The source is missing or a dangling link.
    MissingSource,
}

/// Copies a file or directory tree from `src` to `dest`.
///
/// Parent directories of `dest` are created. An existing destination wins
/// (the call is a no-op), so collecting the same pair twice is idempotent.
/// Regular files are copied with their content, following links; links to
/// directories inside a tree are recreated as links; dangling links are
/// skipped with a warning.
///
/// # Errors
///
/// Returns an error when a directory cannot be created or a file cannot be
/// copied.
pub fn collect(src: &Path, dest: &Path) -> Result<CopyOutcome> {
    if !src.exists() {
        warn!(path = %src.display(), "cannot find source (bad symlink?), skipping");
        return Ok(CopyOutcome::MissingSource);
    }
    if fs::symlink_metadata(dest).is_ok() {
        debug!(path = %dest.display(), "destination already exists");
        return Ok(CopyOutcome::AlreadyPresent);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if src.is_dir() {
        copy_tree(src, dest)?;
    } else {
        fs::copy(src, dest)
            .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
    }
    Ok(CopyOutcome::Copied)
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_link(path, &target)?;
        } else {
            fs::copy(path, &target)
                .with_context(|| format!("copying {} to {}", path.display(), target.display()))?;
        }
    }
    Ok(())
}

fn copy_link(path: &Path, target: &Path) -> Result<()> {
    let Ok(meta) = fs::metadata(path) else {
        warn!(path = %path.display(), "skipping dangling symlink");
        return Ok(());
    };
    if meta.is_dir() {
        let link = fs::read_link(path)
            .with_context(|| format!("failed to read link {}", path.display()))?;
        symlink_dir(&link, target)
            .with_context(|| format!("failed to link {}", target.display()))?;
    } else {
        fs::copy(path, target)
            .with_context(|| format!("copying {} to {}", path.display(), target.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(link: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn symlink_dir(link: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(link, target)
}
