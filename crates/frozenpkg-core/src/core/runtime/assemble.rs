use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use frozenpkg_domain::{BuildEnvironment, PartOptions};

use super::interpreter::{locate_interpreter, python_version, query_stdlib, DEFAULT_SEARCH_DIRS};
use crate::core::collect::collect;
use crate::core::errors::FreezeError;
use crate::core::fs::make_executable;
use crate::core::relocate::{KnownRoots, SubstitutionList};
use crate::core::stage::StagingLayout;

/// Standard library entries never copied; the package area is assembled
/// separately.
const STDLIB_DENY_LIST: [&str; 2] = ["site-packages", "dist-packages"];

/// Literal the generated scripts open their search-path list with.
pub const BOOTSTRAP_MARKER: &str = "sys.path[0:0] = [";

/// Interpreter and library options of a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSpec {
    pub sys_python: Option<PathBuf>,
    pub python_version: Option<String>,
    pub sys_lib: Option<PathBuf>,
    pub skip_sys: bool,
    pub search_dirs: Vec<PathBuf>,
}

impl RuntimeSpec {
    pub fn from_options(options: &PartOptions, env: &BuildEnvironment) -> Self {
        let search_dirs = if options.contains("interpreter-search-dirs") {
            options
                .list("interpreter-search-dirs")
                .into_iter()
                .map(PathBuf::from)
                .collect()
        } else {
            DEFAULT_SEARCH_DIRS.iter().map(PathBuf::from).collect()
        };
        Self {
            sys_python: options.get("sys-python").map(|p| env.resolve(Path::new(p))),
            python_version: options.get("python-version").map(ToOwned::to_owned),
            sys_lib: options.get("sys-lib").map(|p| env.resolve(Path::new(p))),
            skip_sys: options.flag("skip-sys"),
            search_dirs,
        }
    }
}

/// What the runtime assembly produced.
#[derive(Debug)]
pub struct AssembledRuntime {
    pub interpreter: PathBuf,
    pub python_version: String,
    /// Library directory relative to the install prefix (`lib/python3.9`).
    pub lib_rel: PathBuf,
    /// Staged package area, destination of third-party packages.
    pub site_packages: PathBuf,
    pub target_lib: PathBuf,
    pub target_site_packages: PathBuf,
    pub substitutions: SubstitutionList,
}

/// Copies the interpreter, the standard library and the environment's
/// package area below the staged prefix, and returns the substitutions
/// that relocate references to them.
pub fn assemble(
    layout: &StagingLayout,
    env: &BuildEnvironment,
    spec: &RuntimeSpec,
) -> Result<AssembledRuntime, FreezeError> {
    let mut search_dirs = vec![env.bin_directory.clone()];
    search_dirs.extend(spec.search_dirs.iter().cloned());
    let interpreter = locate_interpreter(
        spec.sys_python.as_deref(),
        spec.python_version.as_deref(),
        &search_dirs,
    )?;
    let version = python_version(&interpreter, spec.python_version.as_deref())?;
    info!(interpreter = %interpreter.display(), version = %version, "freezing interpreter");

    let bin_dir = layout.bin_dir();
    let staged_python = bin_dir.join("python");
    copy_interpreter(&interpreter, &staged_python)?;
    copy_interpreter(&interpreter, &bin_dir.join(format!("python{version}")))?;

    let stdlib = stdlib_source(env, spec, &interpreter, &version);
    if !stdlib.is_dir() {
        return Err(FreezeError::LibraryNotFound { path: stdlib });
    }
    let lib_rel = KnownRoots::for_build(&env.directory, &version)
        .relativize(&stdlib)
        .unwrap_or_else(|| Path::new("lib").join(format!("python{version}")));
    let staged_lib = layout.prefix_dir().join(&lib_rel);
    copy_stdlib(&stdlib, &staged_lib)?;

    let site_source = env.site_packages(&version);
    let site_packages = staged_lib.join("site-packages");
    if site_source.is_dir() {
        collect(&site_source, &site_packages).map_err(|err| {
            FreezeError::staging(format!("copying {}", site_source.display()), err)
        })?;
    } else {
        debug!(path = %site_source.display(), "no package area in the build environment");
    }
    fs::create_dir_all(&site_packages).map_err(|source| FreezeError::Layout {
        path: site_packages.clone(),
        source,
    })?;

    let target_python = layout.target_prefix().join("bin").join("python");
    let target_lib = layout.target_prefix().join(&lib_rel);
    let target_site_packages = target_lib.join("site-packages");

    let mut substitutions = SubstitutionList::new();
    let interpreter_paths = interpreter_aliases(&interpreter, &version);
    for path in &interpreter_paths {
        substitutions.push_path(path, &target_python);
    }
    substitutions.push_path(&env.python(), &target_python);
    substitutions.push_path(&stdlib, &target_lib);
    if site_source.is_dir() {
        substitutions.push_path(&site_source, &target_site_packages);
    }
    substitutions.push(BOOTSTRAP_MARKER, bootstrap_insertion(&target_lib));

    Ok(AssembledRuntime {
        interpreter,
        python_version: version,
        lib_rel,
        site_packages,
        target_lib,
        target_site_packages,
        substitutions,
    })
}

/// Every spelling of the interpreter a script may carry: the found path,
/// its canonical target, and the versioned names next to each. Longest
/// first, since a shorter name is a prefix of the longer one (`python3`,
/// `python3.9`).
fn interpreter_aliases(interpreter: &Path, version: &str) -> Vec<PathBuf> {
    let mut found = vec![interpreter.to_path_buf()];
    if let Ok(canonical) = fs::canonicalize(interpreter) {
        if canonical != interpreter {
            found.push(canonical);
        }
    }
    let major = version.split_once('.').map_or(version, |(major, _)| major);
    let mut aliases = Vec::new();
    for path in found {
        if let Some(dir) = path.parent() {
            for name in [format!("python{version}"), format!("python{major}")] {
                let alias = dir.join(name);
                if !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
        }
        if !aliases.contains(&path) {
            aliases.push(path);
        }
    }
    aliases.sort_by_key(|path| std::cmp::Reverse(path.as_os_str().len()));
    aliases
}

/// `sys.path[0:0] = [` followed by the relocated package area and
/// `lib-dynload`, so they are searched before anything else.
pub fn bootstrap_insertion(target_lib: &Path) -> String {
    format!(
        "{BOOTSTRAP_MARKER}\n  '{}',\n  '{}',",
        target_lib.join("site-packages").display(),
        target_lib.join("lib-dynload").display()
    )
}

fn stdlib_source(
    env: &BuildEnvironment,
    spec: &RuntimeSpec,
    interpreter: &Path,
    version: &str,
) -> PathBuf {
    if let Some(path) = &spec.sys_lib {
        return path.clone();
    }
    if spec.skip_sys {
        return env.lib_dir(version);
    }
    query_stdlib(interpreter).unwrap_or_else(|| {
        let guess = interpreter
            .parent()
            .and_then(Path::parent)
            .unwrap_or(Path::new("/usr"))
            .join("lib")
            .join(format!("python{version}"));
        warn!(guess = %guess.display(), "could not query the standard library location");
        guess
    })
}

fn copy_interpreter(src: &Path, dest: &Path) -> Result<(), FreezeError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| FreezeError::Layout {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::copy(src, dest)
        .and_then(|_| make_executable(dest))
        .map_err(|err| FreezeError::staging(format!("copying interpreter to {}", dest.display()), err))
}

fn copy_stdlib(stdlib: &Path, dest: &Path) -> Result<(), FreezeError> {
    let context = || format!("copying standard library {}", stdlib.display());
    let mut entries: Vec<_> = fs::read_dir(stdlib)
        .map_err(|err| FreezeError::staging(context(), err))?
        .filter_map(Result::ok)
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);
    for entry in entries {
        let name = entry.file_name();
        if STDLIB_DENY_LIST.iter().any(|deny| name == *deny) {
            continue;
        }
        collect(&entry.path(), &dest.join(&name)).map_err(|err| FreezeError::staging(context(), err))?;
    }
    Ok(())
}
