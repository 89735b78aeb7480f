use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use frozenpkg_domain::{BuildEnvironment, PartOptions};

use super::collect::collect;
use super::fs::remove_dir_all_writable;
use super::relocate::SubstitutionList;
use super::stage::StagingLayout;

/// One `src -> dest` line of `extra-copies`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraCopy {
    pub source: String,
    pub destination: String,
}

impl ExtraCopy {
    /// Parses `src -> dest`. Both sides must be non-empty.
    pub fn parse(line: &str) -> Option<Self> {
        let (source, destination) = line.split_once("->")?;
        let (source, destination) = (source.trim(), destination.trim());
        if source.is_empty() || destination.is_empty() || destination.contains("->") {
            return None;
        }
        Some(Self {
            source: source.to_string(),
            destination: destination.to_string(),
        })
    }

    /// A destination ending in `/` names a directory receiving the source
    /// under its own file name.
    pub fn targets_directory(&self) -> bool {
        self.destination.ends_with('/')
    }
}

/// Summary of the extras step.
#[derive(Debug, Default)]
pub struct ExtrasReport {
    pub copied: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub malformed: Option<String>,
    /// Sources that could not be copied, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    pub substitutions: SubstitutionList,
}

/// Applies `extra-copies` then `extra-dirs` below the staged prefix.
///
/// A malformed copy line is reported and stops the remaining copy lines;
/// the directories are still created. A source that fails to copy is
/// recorded in the report and the next one is tried.
///
/// # Errors
///
/// Returns an error when an `extra-dirs` directory cannot be created.
pub fn copy_extras(
    options: &PartOptions,
    env: &BuildEnvironment,
    layout: &StagingLayout,
) -> Result<ExtrasReport> {
    let mut report = ExtrasReport::default();
    let prefix_dir = layout.prefix_dir();

    for line in options.list("extra-copies") {
        let Some(copy) = ExtraCopy::parse(&line) else {
            error!(line = %line, "malformed copy specification, ignoring remaining extra copies");
            report.malformed = Some(line);
            break;
        };
        copy_one(&copy, env, layout, &prefix_dir, &mut report);
    }

    for dir in options.list("extra-dirs") {
        let path = prefix_dir.join(dir.trim_start_matches('/'));
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        debug!(path = %path.display(), "created extra directory");
        report.directories.push(path);
    }
    Ok(report)
}

fn copy_one(
    copy: &ExtraCopy,
    env: &BuildEnvironment,
    layout: &StagingLayout,
    prefix_dir: &Path,
    report: &mut ExtrasReport,
) {
    let pattern = if Path::new(&copy.source).is_absolute() {
        copy.source.clone()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(&env.directory.to_string_lossy()),
            copy.source
        )
    };
    let sources: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(err) => {
            warn!(pattern = %copy.source, error = %err, "invalid extra-copies pattern");
            return;
        }
    };
    if sources.is_empty() {
        warn!(pattern = %pattern, "extra-copies source matched nothing");
    }
    let dest_base = prefix_dir.join(copy.destination.trim_start_matches('/'));
    for source in sources {
        let dest = if copy.targets_directory() {
            match source.file_name() {
                Some(name) => dest_base.join(name),
                None => continue,
            }
        } else {
            dest_base.clone()
        };
        info!(source = %source.display(), dest = %dest.display(), "copying extra");
        let copied = if copy.targets_directory() {
            fs::create_dir_all(&dest_base)
                .with_context(|| format!("failed to create {}", dest_base.display()))
                .and_then(|()| collect(&source, &dest))
        } else {
            collect(&source, &dest)
        };
        if let Err(err) = copied {
            warn!(source = %source.display(), error = %format!("{err:#}"), "failed to copy extra");
            report.failed.push((source, format!("{err:#}")));
            continue;
        }
        if let Some(target) = layout.target_of(&dest) {
            report.substitutions.push_path(&source, &target);
        }
        report.copied.push(dest);
    }
}

/// Removes whatever matches `extra-cleanups` below the staged prefix.
/// Returns the removed paths.
///
/// # Errors
///
/// Returns an error when a matched path cannot be removed.
pub fn apply_cleanups(options: &PartOptions, layout: &StagingLayout) -> Result<Vec<PathBuf>> {
    let prefix_dir = layout.prefix_dir();
    let escaped = glob::Pattern::escape(&prefix_dir.to_string_lossy());
    let mut removed = Vec::new();
    for raw in options.list("extra-cleanups") {
        let pattern = format!("{escaped}/{}", raw.trim_start_matches('/'));
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(pattern = %raw, error = %err, "invalid extra-cleanups pattern");
                continue;
            }
        };
        for path in paths.filter_map(Result::ok) {
            if !path.starts_with(&prefix_dir) || fs::symlink_metadata(&path).is_err() {
                continue;
            }
            remove_dir_all_writable(&path)?;
            debug!(path = %path.display(), "removed");
            removed.push(path);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frozenpkg_domain::InstallPrefix;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, body).expect("write");
    }

    fn setup(root: &Path) -> (BuildEnvironment, StagingLayout) {
        let env = BuildEnvironment::rooted_at(root.join("build"));
        let layout = StagingLayout::new(
            root.join("stage"),
            InstallPrefix::parse("opt/app").expect("prefix"),
        );
        (env, layout)
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        assert_eq!(
            ExtraCopy::parse("etc/*.conf -> etc/"),
            Some(ExtraCopy {
                source: "etc/*.conf".into(),
                destination: "etc/".into()
            })
        );
        assert_eq!(ExtraCopy::parse("etc/app.conf"), None);
        assert_eq!(ExtraCopy::parse(" -> etc/"), None);
        assert_eq!(ExtraCopy::parse("a -> b -> c"), None);
    }

    #[test]
    fn copies_into_directories_and_full_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (env, layout) = setup(temp.path());
        write(&env.directory.join("etc/a.conf"), "a");
        write(&env.directory.join("etc/b.conf"), "b");
        write(&env.directory.join("README"), "readme");
        let mut options = PartOptions::new("package");
        options.insert("extra-copies", "etc/*.conf -> etc/\nREADME -> share/doc/README.txt");
        options.insert("extra-dirs", "var/log\n/var/run");

        let report = copy_extras(&options, &env, &layout).expect("extras");

        let prefix = layout.prefix_dir();
        assert!(prefix.join("etc/a.conf").is_file());
        assert!(prefix.join("etc/b.conf").is_file());
        assert_eq!(
            fs::read_to_string(prefix.join("share/doc/README.txt")).expect("read"),
            "readme"
        );
        assert!(prefix.join("var/log").is_dir());
        assert!(prefix.join("var/run").is_dir());
        assert_eq!(report.copied.len(), 3);
        let readme = report
            .substitutions
            .iter()
            .find(|s| s.from.ends_with("README"))
            .expect("substitution");
        assert_eq!(readme.to, "/opt/app/share/doc/README.txt");
    }

    #[test]
    fn malformed_line_stops_remaining_copies() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (env, layout) = setup(temp.path());
        write(&env.directory.join("one"), "1");
        write(&env.directory.join("two"), "2");
        let mut options = PartOptions::new("package");
        options.insert("extra-copies", "one -> one\nbroken line\ntwo -> two");
        options.insert("extra-dirs", "data");

        let report = copy_extras(&options, &env, &layout).expect("extras");
        assert_eq!(report.malformed.as_deref(), Some("broken line"));
        assert!(layout.prefix_dir().join("one").is_file());
        assert!(!layout.prefix_dir().join("two").exists());
        assert!(layout.prefix_dir().join("data").is_dir());
    }

    #[test]
    fn failed_copy_does_not_stop_later_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (env, layout) = setup(temp.path());
        write(&env.directory.join("one"), "1");
        write(&env.directory.join("two"), "2");
        write(&env.directory.join("three"), "3");
        let mut options = PartOptions::new("package");
        // `conf` is a file once `one` lands, so `conf/two` cannot be created
        options.insert("extra-copies", "one -> conf\ntwo -> conf/two\nthree -> three");

        let report = copy_extras(&options, &env, &layout).expect("extras");

        let prefix = layout.prefix_dir();
        assert!(prefix.join("conf").is_file());
        assert_eq!(fs::read_to_string(prefix.join("three")).expect("read"), "3");
        assert_eq!(report.copied.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, env.directory.join("two"));
        assert!(report.malformed.is_none());
    }

    #[test]
    fn cleanups_remove_matches_below_the_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (_, layout) = setup(temp.path());
        let prefix = layout.prefix_dir();
        write(&prefix.join("lib/python3.9/test/test_os.py"), "");
        write(&prefix.join("lib/python3.9/os.pyc"), "");
        write(&prefix.join("lib/python3.9/os.py"), "");
        let mut options = PartOptions::new("package");
        options.insert("extra-cleanups", "lib/python3.9/test\nlib/python3.9/*.pyc");

        let removed = apply_cleanups(&options, &layout).expect("cleanups");
        assert_eq!(removed.len(), 2);
        assert!(!prefix.join("lib/python3.9/test").exists());
        assert!(!prefix.join("lib/python3.9/os.pyc").exists());
        assert!(prefix.join("lib/python3.9/os.py").exists());
    }
}
