use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The assembled build environment a packaging run reads from.
///
/// Mirrors the directories of a buildout tree: interpreter and generated
/// scripts under `bin/`, packed eggs under `eggs/`, development egg links
/// under `develop-eggs/` and the environment's own `lib/pythonX.Y`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub directory: PathBuf,
    pub bin_directory: PathBuf,
    pub eggs_directory: PathBuf,
    pub develop_eggs_directory: PathBuf,
}

impl BuildEnvironment {
    /// Builds the default layout rooted at `directory`.
    pub fn rooted_at(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            bin_directory: directory.join("bin"),
            eggs_directory: directory.join("eggs"),
            develop_eggs_directory: directory.join("develop-eggs"),
            directory,
        }
    }

    /// The environment's own interpreter entry (often a symlink or a
    /// generated interpreter script).
    pub fn python(&self) -> PathBuf {
        self.bin_directory.join("python")
    }

    /// `lib/python<version>` inside the environment.
    pub fn lib_dir(&self, python_version: &str) -> PathBuf {
        self.directory
            .join("lib")
            .join(format!("python{python_version}"))
    }

    /// The environment's own package area.
    pub fn site_packages(&self, python_version: &str) -> PathBuf {
        self.lib_dir(python_version).join("site-packages")
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.bin_directory.join(name)
    }

    /// Resolves `path` against the environment directory unless absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.directory.join(path)
        }
    }
}
