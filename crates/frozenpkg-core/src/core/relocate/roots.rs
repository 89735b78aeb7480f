use std::path::{Path, PathBuf};

/// Install roots a library path can be relativized against.
///
/// Matching is component-wise and the longest root wins, so `/usr/local`
/// takes precedence over `/usr` and the build directory over `/opt` when
/// the build happens below `/opt`.
#[derive(Clone, Debug, Default)]
pub struct KnownRoots {
    roots: Vec<PathBuf>,
}

impl KnownRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut roots: Vec<PathBuf> = roots
            .into_iter()
            .map(Into::into)
            .filter(|root| root.is_absolute())
            .collect();
        roots.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        roots.dedup();
        Self { roots }
    }

    /// Roots of a build: the build directory itself, the usual system
    /// prefixes and the macOS framework locations for `python_version`.
    pub fn for_build(build_dir: &Path, python_version: &str) -> Self {
        let framework = format!("Python.framework/Versions/{python_version}");
        Self::new([
            build_dir.to_path_buf(),
            PathBuf::from("/usr/local"),
            PathBuf::from("/usr"),
            PathBuf::from("/opt"),
            Path::new("/Library/Frameworks").join(&framework),
            Path::new("/System/Library/Frameworks").join(&framework),
        ])
    }

    /// Strips the longest matching root from `path`. Returns `None` when no
    /// root matches or when `path` is a root itself.
    pub fn relativize(&self, path: &Path) -> Option<PathBuf> {
        self.roots.iter().find_map(|root| {
            path.strip_prefix(root)
                .ok()
                .filter(|rest| !rest.as_os_str().is_empty())
                .map(Path::to_path_buf)
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}
