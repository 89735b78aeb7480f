use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::core::errors::FreezeError;
use crate::core::process::run_command;

pub const DEFAULT_SEARCH_DIRS: [&str; 2] = ["/usr/local/bin", "/usr/bin"];

const VERSION_PROBE: &str = "import sys; print('%d.%d' % sys.version_info[:2])";
const STDLIB_PROBE: &str = "import sysconfig; print(sysconfig.get_path('stdlib'))";

/// Executable names to try, most specific first.
pub fn candidate_names(version: Option<&str>) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(version) = version {
        names.push(format!("python{version}"));
        if let Some((major, _)) = version.split_once('.') {
            names.push(format!("python{major}"));
        }
    }
    for fallback in ["python3", "python"] {
        if !names.iter().any(|name| name == fallback) {
            names.push(fallback.to_string());
        }
    }
    names
}

/// Finds the interpreter to freeze.
///
/// An explicit path wins. Otherwise each directory of `search_dirs` is
/// tried in order with every candidate name; the first executable match is
/// returned.
pub fn locate_interpreter(
    explicit: Option<&Path>,
    version: Option<&str>,
    search_dirs: &[PathBuf],
) -> Result<PathBuf, FreezeError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            debug!(interpreter = %path.display(), "using configured interpreter");
            Ok(path.to_path_buf())
        } else {
            Err(FreezeError::InterpreterNotFound {
                searched: vec![path.to_path_buf()],
            })
        };
    }
    let names = candidate_names(version);
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    for dir in search_dirs {
        for name in &names {
            trace!(dir = %dir.display(), name = %name, "looking for interpreter");
            if let Ok(found) = which::which_in(name, Some(dir), &cwd) {
                debug!(interpreter = %found.display(), "found interpreter");
                return Ok(found);
            }
        }
    }
    Err(FreezeError::InterpreterNotFound {
        searched: search_dirs.to_vec(),
    })
}

/// Returns `configured` when set, otherwise asks the interpreter for its
/// `major.minor` version.
pub fn python_version(interpreter: &Path, configured: Option<&str>) -> Result<String, FreezeError> {
    if let Some(version) = configured {
        return if is_version(version) {
            Ok(version.to_string())
        } else {
            Err(FreezeError::InterpreterVersion {
                interpreter: interpreter.to_path_buf(),
                reason: format!("`python-version` must look like X.Y, got `{version}`"),
            })
        };
    }
    let version = probe(interpreter, VERSION_PROBE).map_err(|reason| {
        FreezeError::InterpreterVersion {
            interpreter: interpreter.to_path_buf(),
            reason,
        }
    })?;
    if is_version(&version) {
        Ok(version)
    } else {
        Err(FreezeError::InterpreterVersion {
            interpreter: interpreter.to_path_buf(),
            reason: format!("unexpected version output `{version}`"),
        })
    }
}

/// The interpreter's standard library directory as reported by
/// `sysconfig`, if it can be queried.
pub fn query_stdlib(interpreter: &Path) -> Option<PathBuf> {
    match probe(interpreter, STDLIB_PROBE) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        Ok(_) => None,
        Err(reason) => {
            debug!(interpreter = %interpreter.display(), %reason, "stdlib query failed");
            None
        }
    }
}

fn probe(interpreter: &Path, code: &str) -> Result<String, String> {
    let cwd = interpreter.parent().unwrap_or(Path::new("/"));
    let output = run_command(interpreter, &["-c".to_string(), code.to_string()], &[], cwd)
        .map_err(|err| format!("{err:#}"))?;
    if !output.success() {
        return Err(output.combined().trim().to_string());
    }
    Ok(output.stdout.trim().to_string())
}

fn is_version(raw: &str) -> bool {
    let mut parts = raw.split('.');
    let valid = |part: Option<&str>| {
        part.is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    };
    valid(parts.next()) && valid(parts.next()) && parts.next().is_none()
}
