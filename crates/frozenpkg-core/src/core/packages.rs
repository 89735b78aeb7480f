use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use frozenpkg_domain::{BuildEnvironment, PartOptions};

use super::collect::{collect, CopyOutcome};
use super::namespace;
use super::relocate::SubstitutionList;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    /// An expanded `<name>-<version>.egg` directory.
    Egg,
    /// A `.egg` zip archive; its content cannot be reconstructed.
    ZippedEgg,
    /// A source checkout referenced from a `develop-eggs/<name>.egg-link`.
    Develop,
}

/// A configured package resolved against the build environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageSpec {
    pub name: String,
    pub kind: PackageKind,
    pub location: PathBuf,
    pub metadata_dir: Option<PathBuf>,
    pub namespace_packages: Vec<String>,
    pub top_level: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum PackageOutcome {
    Copied { entries: usize },
    AlreadyPresent,
    Skipped(String),
}

/// Result of copying every resolved package into the staged package area.
#[derive(Debug, Default)]
pub struct InstalledPackages {
    pub substitutions: SubstitutionList,
    pub outcomes: Vec<(String, PackageOutcome)>,
}

/// Names listed in `eggs`, minus `eggs-skip` / `ignores`.
pub fn configured_packages(options: &PartOptions) -> Vec<String> {
    let skipped = options.list_any(&["eggs-skip", "ignores"]);
    options
        .list("eggs")
        .into_iter()
        .filter(|name| {
            let keep = !skipped.contains(name);
            if !keep {
                debug!(package = %name, "skipping package");
            }
            keep
        })
        .collect()
}

/// Resolves `name`, preferring a develop egg over an installed one.
///
/// # Errors
///
/// Returns an error when neither a develop-egg link nor an egg exists, or
/// when an egg link cannot be read.
pub fn resolve(env: &BuildEnvironment, name: &str) -> Result<PackageSpec> {
    if let Some(link) = find_egg_link(&env.develop_eggs_directory, name) {
        let location = read_egg_link(&link)?;
        let metadata_dir = find_egg_info(&location, name);
        return Ok(with_metadata(name, PackageKind::Develop, location, metadata_dir));
    }
    let egg = find_egg(&env.eggs_directory, name).ok_or_else(|| {
        anyhow!(
            "no egg for `{name}` in {} or {}",
            env.eggs_directory.display(),
            env.develop_eggs_directory.display()
        )
    })?;
    if egg.is_dir() {
        let info = egg.join("EGG-INFO");
        let metadata_dir = info.is_dir().then_some(info);
        Ok(with_metadata(name, PackageKind::Egg, egg, metadata_dir))
    } else {
        Ok(with_metadata(name, PackageKind::ZippedEgg, egg, None))
    }
}

/// Resolves every configured package. Unresolvable packages are logged and
/// left out.
pub fn resolve_all(env: &BuildEnvironment, options: &PartOptions) -> Vec<PackageSpec> {
    configured_packages(options)
        .iter()
        .filter_map(|name| match resolve(env, name) {
            Ok(spec) => {
                debug!(package = %name, kind = ?spec.kind, location = %spec.location.display(), "resolved package");
                Some(spec)
            }
            Err(err) => {
                warn!(package = %name, error = %err, "cannot resolve package, skipping");
                None
            }
        })
        .collect()
}

/// Copies each package into `site_packages` (staged) and records where its
/// source location ends up under `target_site_packages`.
///
/// A package that fails to copy is logged and reported as skipped; the
/// others still go through.
pub fn install_packages(
    specs: &[PackageSpec],
    site_packages: &Path,
    target_site_packages: &Path,
) -> InstalledPackages {
    let mut installed = InstalledPackages::default();
    for spec in specs {
        let outcome = match install_one(spec, site_packages) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(package = %spec.name, error = %format!("{err:#}"), "failed to copy package");
                PackageOutcome::Skipped(format!("{err:#}"))
            }
        };
        if !matches!(outcome, PackageOutcome::Skipped(_)) {
            let target = match spec.kind {
                PackageKind::ZippedEgg => spec
                    .location
                    .file_name()
                    .map_or_else(|| target_site_packages.to_path_buf(), |name| {
                        target_site_packages.join(name)
                    }),
                PackageKind::Egg | PackageKind::Develop => target_site_packages.to_path_buf(),
            };
            installed.substitutions.push_path(&spec.location, &target);
        }
        info!(package = %spec.name, outcome = ?outcome, "package staged");
        installed.outcomes.push((spec.name.clone(), outcome));
    }
    installed
}

fn install_one(spec: &PackageSpec, site_packages: &Path) -> Result<PackageOutcome> {
    fs::create_dir_all(site_packages)
        .with_context(|| format!("failed to create {}", site_packages.display()))?;
    let outcome = if spec.kind == PackageKind::ZippedEgg {
        warn!(package = %spec.name, "zipped egg copied as is; namespaces are not merged");
        let Some(file_name) = spec.location.file_name() else {
            return Ok(PackageOutcome::Skipped("egg has no file name".into()));
        };
        match collect(&spec.location, &site_packages.join(file_name))? {
            CopyOutcome::Copied => PackageOutcome::Copied { entries: 1 },
            CopyOutcome::AlreadyPresent => PackageOutcome::AlreadyPresent,
            CopyOutcome::MissingSource => PackageOutcome::Skipped("egg vanished".into()),
        }
    } else {
        namespace::reconstruct(spec, site_packages)?
    };
    copy_metadata(spec, site_packages)?;
    Ok(outcome)
}

/// Copies the package metadata next to the packages so `pkg_resources`
/// can still find the distribution.
fn copy_metadata(spec: &PackageSpec, site_packages: &Path) -> Result<()> {
    let Some(metadata_dir) = spec.metadata_dir.as_deref() else {
        return Ok(());
    };
    let dest_name = match spec.kind {
        PackageKind::Egg => spec
            .location
            .file_stem()
            .map(|stem| format!("{}.egg-info", stem.to_string_lossy())),
        PackageKind::Develop | PackageKind::ZippedEgg => metadata_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    };
    let Some(dest_name) = dest_name else {
        return Ok(());
    };
    collect(metadata_dir, &site_packages.join(dest_name))?;
    Ok(())
}

fn with_metadata(
    name: &str,
    kind: PackageKind,
    location: PathBuf,
    metadata_dir: Option<PathBuf>,
) -> PackageSpec {
    let read = |file: &str| {
        metadata_dir
            .as_deref()
            .map(|dir| read_lines(&dir.join(file)))
            .unwrap_or_default()
    };
    let namespace_packages = read("namespace_packages.txt");
    let mut top_level = read("top_level.txt");
    if top_level.is_empty() {
        top_level.push(module_name(name));
    }
    PackageSpec {
        name: name.to_string(),
        kind,
        location,
        metadata_dir,
        namespace_packages,
        top_level,
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|text| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn module_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Spellings an egg file name may use for `name`.
fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    let underscored = module_name(name);
    if underscored != name {
        variants.push(underscored);
    }
    variants
}

fn find_egg_link(dir: &Path, name: &str) -> Option<PathBuf> {
    name_variants(name)
        .into_iter()
        .map(|variant| dir.join(format!("{variant}.egg-link")))
        .find(|path| path.is_file())
}

fn read_egg_link(link: &Path) -> Result<PathBuf> {
    let text = fs::read_to_string(link)
        .with_context(|| format!("failed to read {}", link.display()))?;
    let first = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("egg link {} is empty", link.display()))?;
    let location = PathBuf::from(first);
    if location.is_absolute() {
        Ok(location)
    } else {
        Ok(link.parent().unwrap_or(Path::new(".")).join(location))
    }
}

fn find_egg_info(location: &Path, name: &str) -> Option<PathBuf> {
    name_variants(name)
        .into_iter()
        .map(|variant| location.join(format!("{variant}.egg-info")))
        .find(|path| path.is_dir())
}

/// Picks the `<name>-*.egg` in `dir` with the highest version.
fn find_egg(dir: &Path, name: &str) -> Option<PathBuf> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    name_variants(name)
        .iter()
        .map(|variant| format!("{escaped_dir}/{}-*.egg", glob::Pattern::escape(variant)))
        .filter_map(|pattern| glob::glob(&pattern).ok())
        .flat_map(|paths| paths.filter_map(Result::ok))
        .max_by(|a, b| {
            egg_version(a)
                .cmp(&egg_version(b))
                .then_with(|| a.cmp(b))
        })
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart {
    Number(u64),
    Text(String),
}

/// Version segments of `<name>-<version>[-<tag>].egg`, numeric where they
/// parse so `1.10` ranks above `1.9`.
fn egg_version(path: &Path) -> Vec<VersionPart> {
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = stem.strip_suffix(".egg").unwrap_or(&stem);
    let version = stem.split('-').nth(1).unwrap_or_default();
    version
        .split('.')
        .map(|part| match part.parse::<u64>() {
            Ok(number) => VersionPart::Number(number),
            Err(_) => VersionPart::Text(part.to_string()),
        })
        .collect()
}
