use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::options::PartOptions;

pub const DEFAULT_VERSION: &str = "0.1";
pub const DEFAULT_RELEASE: &str = "0";
pub const UNKNOWN: &str = "unknown";

/// Relative directory under which the frozen runtime lives once installed.
///
/// Stored without a leading separator (`opt/app`); [`InstallPrefix::target`]
/// gives the absolute path on the target machine (`/opt/app`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPrefix(PathBuf);

impl InstallPrefix {
    /// Parses a configured prefix.
    ///
    /// # Errors
    ///
    /// Returns an error when the prefix is empty once leading separators are
    /// removed, or when it climbs out of the root with `..`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches('/');
        let mut relative = PathBuf::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => bail!("install prefix `{raw}` must not contain `..`"),
                Component::RootDir | Component::Prefix(_) => {}
            }
        }
        if relative.as_os_str().is_empty() {
            bail!("install prefix `{raw}` is empty");
        }
        Ok(Self(relative))
    }

    pub fn for_package(name: &str) -> Self {
        Self(Path::new("opt").join(name))
    }

    pub fn relative(&self) -> &Path {
        &self.0
    }

    /// Absolute location on the target machine.
    pub fn target(&self) -> PathBuf {
        Path::new("/").join(&self.0)
    }

    /// Location of the prefix inside a staging root.
    pub fn staged_under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for InstallPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Everything the package descriptor and artifact names are made of.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub release: String,
    pub vendor: String,
    pub packager: String,
    pub url: String,
    pub license: String,
    pub group: String,
    pub autodeps: bool,
    pub requires: Vec<String>,
    pub install_prefix: InstallPrefix,
    pub pre_install: Option<String>,
    pub post_install: Option<String>,
}

impl PackageMetadata {
    /// Reads package metadata from a part, applying the documented defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when `pkg-name` is missing or the install prefix is
    /// invalid.
    pub fn from_options(options: &PartOptions) -> Result<Self> {
        let name = options
            .get("pkg-name")
            .ok_or_else(|| anyhow!("part [{}] is missing the required `pkg-name` option", options.name()))?
            .to_string();
        if name.contains('/') || name.chars().any(char::is_whitespace) {
            bail!("pkg-name `{name}` must not contain `/` or whitespace");
        }
        let install_prefix = match options.get_any(&["install-prefix", "pkg-prefix"]) {
            Some(raw) => InstallPrefix::parse(raw)?,
            None => InstallPrefix::for_package(&name),
        };
        let snippet = |key: &str| {
            options
                .raw(key)
                .map(|text| text.trim_matches('\n').to_string())
                .filter(|text| !text.trim().is_empty())
        };
        Ok(Self {
            version: options.get_or("pkg-version", DEFAULT_VERSION).to_string(),
            release: options.get_or("pkg-release", DEFAULT_RELEASE).to_string(),
            vendor: options.get_or("pkg-vendor", UNKNOWN).to_string(),
            packager: options.get_or("pkg-packager", UNKNOWN).to_string(),
            url: options.get_or("pkg-url", UNKNOWN).to_string(),
            license: options.get_or("pkg-license", UNKNOWN).to_string(),
            group: options.get_or("pkg-group", UNKNOWN).to_string(),
            autodeps: options.flag("pkg-autodeps"),
            requires: options.list("pkg-deps"),
            install_prefix,
            pre_install: snippet("pkg-pre-install"),
            post_install: snippet("pkg-post-install"),
            name,
        })
    }

    /// `<name>-<version>`, the stem of tarball artifacts.
    pub fn artifact_stem(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}
