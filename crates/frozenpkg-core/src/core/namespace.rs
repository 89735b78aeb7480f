//! Namespace package reconstruction.
//!
//! Packages that share a namespace (`corp.auth`, `corp.billing`) each ship
//! their own copy of the namespace directories. Copying them naively would
//! let the first package shadow the others, so the namespace skeleton is
//! rebuilt at the destination with one marker `__init__.py` per node and
//! only the real subpackages are copied into it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::collect::{collect, CopyOutcome};
use super::packages::{PackageKind, PackageOutcome, PackageSpec};

/// Body of every namespace marker. Prefers `pkg_resources` and falls back
/// to `pkgutil` path extension.
pub const NAMESPACE_MARKER: &str = "\
try:
    __import__('pkg_resources').declare_namespace(__name__)
except ImportError:
    from pkgutil import extend_path
    __path__ = extend_path(__path__, __name__)
";

/// Extensions tried, in order, for a top-level name that is not a
/// directory.
const MODULE_SUFFIXES: [&str; 3] = [".py", ".so", ".dll"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamespaceNode {
    Internal(BTreeMap<String, NamespaceNode>),
    /// Real package content lives below this namespace.
    Leaf,
}

/// The declared namespaces of one package, as a tree of dotted names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceTree {
    roots: BTreeMap<String, NamespaceNode>,
}

impl NamespaceTree {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for path in paths {
            let parts: Vec<&str> = path
                .as_ref()
                .split('.')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect();
            if !parts.is_empty() {
                insert(&mut tree.roots, &parts);
            }
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains_root(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Every node as (relative directory, node), parents before children.
    pub fn nodes(&self) -> Vec<(PathBuf, &NamespaceNode)> {
        let mut out = Vec::new();
        flatten(&self.roots, &PathBuf::new(), &mut out);
        out
    }
}

fn insert(level: &mut BTreeMap<String, NamespaceNode>, parts: &[&str]) {
    let Some((head, rest)) = parts.split_first() else {
        return;
    };
    let node = level
        .entry((*head).to_string())
        .or_insert(NamespaceNode::Leaf);
    if rest.is_empty() {
        return;
    }
    if matches!(node, NamespaceNode::Leaf) {
        *node = NamespaceNode::Internal(BTreeMap::new());
    }
    if let NamespaceNode::Internal(children) = node {
        insert(children, rest);
    }
}

fn flatten<'a>(
    level: &'a BTreeMap<String, NamespaceNode>,
    base: &Path,
    out: &mut Vec<(PathBuf, &'a NamespaceNode)>,
) {
    for (name, node) in level {
        let path = base.join(name);
        out.push((path.clone(), node));
        if let NamespaceNode::Internal(children) = node {
            flatten(children, &path, out);
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    copied: usize,
    present: usize,
    skipped: Vec<String>,
}

impl Tally {
    fn record(&mut self, outcome: CopyOutcome, what: &Path) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::AlreadyPresent => self.present += 1,
            CopyOutcome::MissingSource => self.skipped.push(what.display().to_string()),
        }
    }

    fn into_outcome(self) -> PackageOutcome {
        if self.copied > 0 {
            PackageOutcome::Copied {
                entries: self.copied,
            }
        } else if self.present > 0 {
            PackageOutcome::AlreadyPresent
        } else if self.skipped.is_empty() {
            PackageOutcome::Skipped("nothing to copy".to_string())
        } else {
            PackageOutcome::Skipped(format!("not found: {}", self.skipped.join(", ")))
        }
    }
}

/// Copies `package` into `destination_root` (the staged package area),
/// merging its namespaces with whatever earlier packages put there.
///
/// # Errors
///
/// Returns an error when a directory, marker or subpackage cannot be
/// written; missing sources and layout conflicts are logged and skipped.
pub fn reconstruct(package: &PackageSpec, destination_root: &Path) -> Result<PackageOutcome> {
    let tree = NamespaceTree::from_paths(&package.namespace_packages);
    let mut tally = Tally::default();
    let mut blocked: Vec<PathBuf> = Vec::new();

    for (rel, node) in tree.nodes() {
        if blocked.iter().any(|prefix| rel.starts_with(prefix)) {
            continue;
        }
        let dest = destination_root.join(&rel);
        if dest.exists() && !dest.is_dir() {
            warn!(
                package = %package.name,
                path = %dest.display(),
                "a file is in the way of namespace directory, skipping branch"
            );
            blocked.push(rel);
            continue;
        }
        fs::create_dir_all(&dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
        write_marker(&dest)?;

        if matches!(node, NamespaceNode::Leaf) {
            copy_leaf(package, &rel, &dest, &mut tally)?;
        }
    }

    for name in &package.top_level {
        if tree.contains_root(name) {
            continue;
        }
        copy_top_level(package, name, destination_root, &mut tally)?;
    }
    Ok(tally.into_outcome())
}

fn write_marker(dir: &Path) -> Result<()> {
    let marker = dir.join("__init__.py");
    if fs::symlink_metadata(&marker).is_ok() {
        return Ok(());
    }
    fs::write(&marker, NAMESPACE_MARKER)
        .with_context(|| format!("failed to write {}", marker.display()))
}

fn copy_leaf(package: &PackageSpec, rel: &Path, dest: &Path, tally: &mut Tally) -> Result<()> {
    let src = package.location.join(rel);
    if package.kind == PackageKind::ZippedEgg || !src.is_dir() {
        warn!(
            package = %package.name,
            namespace = %rel.display(),
            "namespace not found in package (zipped egg?), skipping"
        );
        tally.skipped.push(rel.display().to_string());
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(&src)
        .with_context(|| format!("failed to read {}", src.display()))?
        .filter_map(Result::ok)
        .collect();
    entries.sort_by_key(fs::DirEntry::file_name);
    for entry in entries {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        let target = dest.join(&name);
        let outcome = collect(&entry.path(), &target)?;
        if outcome == CopyOutcome::AlreadyPresent {
            debug!(path = %target.display(), "subpackage already provided by another package");
        }
        tally.record(outcome, &entry.path());
    }
    Ok(())
}

fn copy_top_level(
    package: &PackageSpec,
    name: &str,
    destination_root: &Path,
    tally: &mut Tally,
) -> Result<()> {
    let dir = package.location.join(name);
    let mut candidates = std::iter::once(dir).chain(
        MODULE_SUFFIXES
            .iter()
            .map(|suffix| package.location.join(format!("{name}{suffix}"))),
    );
    let Some(src) = candidates.find(|path| path.exists()) else {
        warn!(
            package = %package.name,
            name,
            location = %package.location.display(),
            "top-level module not found, skipping"
        );
        tally.skipped.push(name.to_string());
        return Ok(());
    };
    let Some(file_name) = src.file_name() else {
        return Ok(());
    };
    let dest = destination_root.join(file_name);
    let outcome = collect(&src, &dest)?;
    if outcome == CopyOutcome::AlreadyPresent {
        info!(path = %dest.display(), "already installed, skipping");
    }
    tally.record(outcome, &src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(location: &Path, name: &str, namespaces: &[&str], top: &[&str]) -> PackageSpec {
        PackageSpec {
            name: name.to_string(),
            kind: PackageKind::Egg,
            location: location.to_path_buf(),
            metadata_dir: None,
            namespace_packages: namespaces.iter().map(ToString::to_string).collect(),
            top_level: top.iter().map(ToString::to_string).collect(),
        }
    }

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, body).expect("write");
    }

    #[test]
    fn tree_marks_deepest_namespaces_as_leaves() {
        let tree = NamespaceTree::from_paths(["corp", "corp.web", "corp.web.auth", "other"]);
        let nodes: Vec<_> = tree
            .nodes()
            .into_iter()
            .map(|(path, node)| (path, matches!(node, NamespaceNode::Leaf)))
            .collect();
        assert_eq!(
            nodes,
            vec![
                (PathBuf::from("corp"), false),
                (PathBuf::from("corp/web"), false),
                (PathBuf::from("corp/web/auth"), true),
                (PathBuf::from("other"), true),
            ]
        );
    }

    #[test]
    fn declaration_order_does_not_matter() {
        assert_eq!(
            NamespaceTree::from_paths(["a.b", "a"]),
            NamespaceTree::from_paths(["a", "a.b"])
        );
    }

    #[test]
    fn packages_sharing_a_namespace_merge() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("corp.auth-1.0.egg");
        write(&first.join("corp/__init__.py"), "original marker one");
        write(&first.join("corp/auth/__init__.py"), "");
        let second = temp.path().join("corp.billing-2.0.egg");
        write(&second.join("corp/__init__.py"), "original marker two");
        write(&second.join("corp/billing/__init__.py"), "");
        write(&second.join("corp/.svn/entries"), "");
        let site = temp.path().join("site-packages");

        let outcome = reconstruct(&package(&first, "corp.auth", &["corp"], &["corp"]), &site)
            .expect("first");
        assert_eq!(outcome, PackageOutcome::Copied { entries: 1 });
        reconstruct(&package(&second, "corp.billing", &["corp"], &["corp"]), &site)
            .expect("second");

        assert!(site.join("corp/auth/__init__.py").is_file());
        assert!(site.join("corp/billing/__init__.py").is_file());
        assert!(!site.join("corp/.svn").exists());
        let marker = fs::read_to_string(site.join("corp/__init__.py")).expect("marker");
        assert_eq!(marker, NAMESPACE_MARKER);
        let markers = walkdir::WalkDir::new(site.join("corp"))
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() == "__init__.py")
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn existing_marker_is_not_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let egg = temp.path().join("ns.a-1.0.egg");
        write(&egg.join("ns/a/__init__.py"), "");
        let site = temp.path().join("site");
        write(&site.join("ns/__init__.py"), "# custom\n");

        reconstruct(&package(&egg, "ns.a", &["ns"], &[]), &site).expect("reconstruct");
        assert_eq!(
            fs::read_to_string(site.join("ns/__init__.py")).expect("read"),
            "# custom\n"
        );
    }

    #[test]
    fn file_in_the_way_skips_the_branch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let egg = temp.path().join("ns.a-1.0.egg");
        write(&egg.join("ns/a/__init__.py"), "");
        let site = temp.path().join("site");
        write(&site.join("ns"), "not a directory");

        let outcome =
            reconstruct(&package(&egg, "ns.a", &["ns"], &[]), &site).expect("reconstruct");
        assert!(matches!(outcome, PackageOutcome::Skipped(_)));
        assert!(site.join("ns").is_file());
    }

    #[test]
    fn top_level_modules_try_directory_then_suffixes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let egg = temp.path().join("mix-1.0.egg");
        write(&egg.join("pkgdir/__init__.py"), "");
        write(&egg.join("single.py"), "x = 1\n");
        write(&egg.join("_speedups.so"), "\x7fELF");
        let site = temp.path().join("site");

        let outcome = reconstruct(
            &package(&egg, "mix", &[], &["pkgdir", "single", "_speedups", "absent"]),
            &site,
        )
        .expect("reconstruct");
        assert_eq!(outcome, PackageOutcome::Copied { entries: 3 });
        assert!(site.join("pkgdir/__init__.py").is_file());
        assert!(site.join("single.py").is_file());
        assert!(site.join("_speedups.so").is_file());
    }

    #[test]
    fn reinstalling_reports_already_present() {
        let temp = tempfile::tempdir().expect("tempdir");
        let egg = temp.path().join("mylib-1.0.egg");
        write(&egg.join("mylib/__init__.py"), "");
        let site = temp.path().join("site");
        let spec = package(&egg, "mylib", &[], &["mylib"]);
        reconstruct(&spec, &site).expect("first");
        assert_eq!(
            reconstruct(&spec, &site).expect("second"),
            PackageOutcome::AlreadyPresent
        );
    }
}
