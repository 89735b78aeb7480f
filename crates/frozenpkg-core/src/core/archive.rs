use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::{write::GzEncoder, Compression};
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::errors::FreezeError;

/// Writes the staging root into a tar archive at `dest` (with `.gz`
/// appended when `compress` is set) and returns the archive path.
///
/// Entry names are relative to `root`, so extracting at `/` reproduces the
/// staged tree. Links are followed; links that cannot be followed (dangling
/// or looping) are stored as links.
pub fn build_archive(root: &Path, dest: &Path, compress: bool) -> Result<PathBuf, FreezeError> {
    let path = if compress {
        let mut name = OsString::from(dest.as_os_str());
        name.push(".gz");
        PathBuf::from(name)
    } else {
        dest.to_path_buf()
    };
    let fail = |source: io::Error| FreezeError::Archive {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    let file = File::create(&path).map_err(fail)?;
    if compress {
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        append_tree(&mut builder, root).map_err(fail)?;
        let encoder = builder.into_inner().map_err(fail)?;
        encoder.finish().map_err(fail)?;
    } else {
        let mut builder = Builder::new(file);
        append_tree(&mut builder, root).map_err(fail)?;
        builder.into_inner().and_then(|mut file| file.flush()).map_err(fail)?;
    }
    debug!(archive = %path.display(), "archive written");
    Ok(path)
}

fn append_tree<W: Write>(builder: &mut Builder<W>, root: &Path) -> io::Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    children.sort();
    for child in children {
        let walker = WalkDir::new(&child)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let name = archive_name(root, entry.path())?;
                    append_entry(builder, &name, entry.path(), entry.file_type().is_dir())?;
                }
                Err(err) => {
                    let Some(path) = err.path().map(Path::to_path_buf) else {
                        return Err(io::Error::other(err.to_string()));
                    };
                    if !is_symlink(&path) {
                        return Err(io::Error::other(err.to_string()));
                    }
                    warn!(path = %path.display(), "cannot follow link, storing it as a link");
                    let name = archive_name(root, &path)?;
                    append_link(builder, &name, &path)?;
                }
            }
        }
    }
    Ok(())
}

fn archive_name(root: &Path, path: &Path) -> io::Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| io::Error::other(format!("{} is outside {}", path.display(), root.display())))
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    name: &Path,
    path: &Path,
    is_dir: bool,
) -> io::Result<()> {
    if is_dir {
        builder.append_dir(name, path)
    } else {
        let mut file = File::open(path)?;
        builder.append_file(name, &mut file)
    }
}

fn append_link<W: Write>(builder: &mut Builder<W>, name: &Path, path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    let target = fs::read_link(path)?;
    let mut header = Header::new_gnu();
    header.set_metadata(&metadata);
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    builder.append_link(&mut header, name, &target)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}
