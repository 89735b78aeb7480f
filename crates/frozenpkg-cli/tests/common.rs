#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use assert_cmd::assert::Assert;
use flate2::read::GzDecoder;
use serde_json::Value;
use tempfile::TempDir;

/// Stand-in interpreter: answers the version and stdlib probes, and
/// otherwise reports what it was asked to run.
const STUB_PYTHON: &str = r#"#!/bin/sh
if [ "$1" = "-c" ]; then
  case "$2" in
    *version_info*) echo 3.9 ;;
    *sysconfig*) here=$(cd "$(dirname "$0")/.." && pwd); echo "$here/lib/python3.9" ;;
  esac
  exit 0
fi
echo "script=$1"
shift
echo "args=$*"
"#;

/// Stand-in `rpmbuild`: logs its arguments and turns the source tar into
/// `RPMS/x86_64/<name>-1.0-0.x86_64.rpm`.
const FAKE_RPMBUILD: &str = r#"#!/bin/sh
if [ -n "$FAKE_RPMBUILD_LOG" ]; then
  printf '%s\n' "$@" > "$FAKE_RPMBUILD_LOG"
fi
if [ -n "$FAKE_RPMBUILD_FAIL" ]; then
  echo "error: Failed build dependencies" >&2
  exit 1
fi
top=""
tarball=""
while [ $# -gt 0 ]; do
  case "$1" in
    --define) top="${2#_topdir }"; shift 2 ;;
    -ta) tarball="$2"; shift 2 ;;
    *) shift ;;
  esac
done
name=$(basename "$tarball" .tar)
mkdir -p "$top/RPMS/x86_64"
cp "$tarball" "$top/RPMS/x86_64/$name-1.0-0.x86_64.rpm"
"#;

pub const PKG_NAME: &str = "testapp";

/// A temporary buildout-style environment with a config file at its root.
pub struct BuildFixture {
    pub temp: TempDir,
    pub build: PathBuf,
    pub work: PathBuf,
    pub out: PathBuf,
}

impl BuildFixture {
    /// Build directory with a stub interpreter, a standard library, one
    /// packed egg (`mylib`) and one generated script (`run`).
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("frozenpkg-fixture")
            .tempdir()
            .expect("tempdir");
        let build = temp.path().join("build");
        let work = temp.path().join("work");
        let out = temp.path().join("out");
        fs::create_dir_all(&work).expect("work dir");

        write_executable(&build.join("bin/python"), STUB_PYTHON);
        write(&build.join("lib/python3.9/os.py"), "# stdlib\n");
        write(&build.join("lib/python3.9/lib-dynload/.keep"), "");
        write(&build.join("lib/python3.9/site-packages/README.txt"), "site\n");

        let egg = build.join("eggs/mylib-1.0-py3.9.egg");
        write(&egg.join("mylib/__init__.py"), "VALUE = 1\n");
        write(&egg.join("EGG-INFO/top_level.txt"), "mylib\n");
        write(&egg.join("EGG-INFO/PKG-INFO"), "Name: mylib\nVersion: 1.0\n");

        let script = format!(
            "#!{python}\n\nimport sys\nsys.path[0:0] = [\n  '{egg}',\n  ]\n\nimport mylib\n",
            python = build.join("bin/python").display(),
            egg = egg.display(),
        );
        write_executable(&build.join("bin/run"), &script);

        let fixture = Self {
            temp,
            build,
            work,
            out,
        };
        fixture.write_config("");
        fixture
    }

    pub fn config_path(&self) -> PathBuf {
        self.build.join("frozenpkg.toml")
    }

    /// Rewrites the config with the base part plus `extra` lines.
    pub fn write_config(&self, extra: &str) {
        let body = format!(
            "[package]\npkg-name = \"{PKG_NAME}\"\npkg-version = \"1.0\"\n\
             interpreter-search-dirs = \"\"\neggs = [\"mylib\"]\nscripts = [\"run\"]\n{extra}"
        );
        fs::write(self.config_path(), body).expect("write config");
    }

    /// Adds a namespace egg `<ns>.<leaf>` declaring `ns` as namespace.
    pub fn add_namespace_egg(&self, ns: &str, leaf: &str) {
        let egg = self.build.join(format!("eggs/{ns}.{leaf}-1.0-py3.9.egg"));
        write(
            &egg.join(ns).join("__init__.py"),
            "__import__('pkg_resources').declare_namespace(__name__)\n",
        );
        write(&egg.join(ns).join(leaf).join("__init__.py"), "");
        write(&egg.join("EGG-INFO/namespace_packages.txt"), &format!("{ns}\n"));
        write(&egg.join("EGG-INFO/top_level.txt"), &format!("{ns}\n"));
    }

    pub fn install_fake_rpmbuild(&self) -> PathBuf {
        let path = self.temp.path().join("tools/rpmbuild");
        write_executable(&path, FAKE_RPMBUILD);
        path
    }

    pub fn scratch_entries(&self) -> usize {
        fs::read_dir(&self.work).map(Iterator::count).unwrap_or(0)
    }
}

pub fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, body).expect("write");
}

pub fn write_executable(path: &Path, body: &str) {
    write(path, body);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

/// Reads every regular entry of a tar archive (gzip when `gz`), keyed by
/// entry name.
pub fn archive_files(path: &Path, gz: bool) -> BTreeMap<String, Vec<u8>> {
    let file = File::open(path).expect("open archive");
    let reader: Box<dyn Read> = if gz {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = tar::Archive::new(reader);
    let mut files = BTreeMap::new();
    for entry in archive.entries().expect("entries") {
        let mut entry = entry.expect("entry");
        if entry.header().entry_type() != tar::EntryType::Regular {
            continue;
        }
        let name = entry.path().expect("path").display().to_string();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).expect("read entry");
        files.insert(name, body);
    }
    files
}
