use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use frozenpkg_domain::PackageMetadata;

use crate::core::errors::FreezeError;

/// RPM descriptor template. `@NAME@` placeholders are filled by
/// [`render_descriptor`].
pub const DESCRIPTOR_TEMPLATE: &str = "\
%define _topdir         @TOP_DIR@
%define _name           @PKG_NAME@

%define _rpmtopdir      @TOP_DIR@/%{_name}
%define _sourcedir      @TOP_DIR@/SOURCES
%define _specdir        @TOP_DIR@/SPECS
%define _rpmdir         @TOP_DIR@/RPMS
%define _srcrpmdir      @TOP_DIR@/SRPMS

%define _unpackaged_files_terminate_build   0
%define __prelink_undo_cmd %{nil}
%define __os_install_post %{nil}

Name:                 @PKG_NAME@
Version:              @PKG_VERSION@
Release:              @PKG_RELEASE@
Summary:              @PKG_NAME@
URL:                  @PKG_URL@
License:              @PKG_LICENSE@
Vendor:               @PKG_VENDOR@
Packager:             @PKG_PACKAGER@
Group:                @PKG_GROUP@
AutoReqProv:          @PKG_AUTODEPS@
Prefix:               @PKG_PREFIX@
BuildRoot:            @BUILD_ROOT@

@ADDITIONAL_OPS@

%description

The @PKG_NAME@ package.
@PKG_LICENSE@

@SCRIPTS@

%files

%defattr(-, nobody, nobody, 0755)

@INSTALL_PREFIX@
";

/// Fills the descriptor template for `metadata`.
pub fn render_descriptor(metadata: &PackageMetadata, top_dir: &Path, build_root: &Path) -> String {
    let install_prefix = metadata.install_prefix.target().display().to_string();
    let autodeps = if metadata.autodeps { "yes" } else { "no" };
    let replacements = [
        ("@TOP_DIR@", top_dir.display().to_string()),
        ("@PKG_NAME@", metadata.name.clone()),
        ("@PKG_VERSION@", metadata.version.clone()),
        ("@PKG_RELEASE@", metadata.release.clone()),
        ("@PKG_VENDOR@", metadata.vendor.clone()),
        ("@PKG_PACKAGER@", metadata.packager.clone()),
        ("@PKG_URL@", metadata.url.clone()),
        ("@PKG_LICENSE@", metadata.license.clone()),
        ("@PKG_GROUP@", metadata.group.clone()),
        ("@PKG_AUTODEPS@", autodeps.to_string()),
        ("@PKG_PREFIX@", install_prefix.clone()),
        ("@INSTALL_PREFIX@", install_prefix),
        ("@BUILD_ROOT@", build_root.display().to_string()),
        ("@ADDITIONAL_OPS@", additional_ops(metadata)),
        ("@SCRIPTS@", scriptlets(metadata)),
    ];
    replacements
        .iter()
        .fold(DESCRIPTOR_TEMPLATE.to_string(), |text, (placeholder, value)| {
            text.replace(placeholder, value)
        })
}

fn additional_ops(metadata: &PackageMetadata) -> String {
    metadata
        .requires
        .iter()
        .map(|dep| format!("Requires: {dep}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn scriptlets(metadata: &PackageMetadata) -> String {
    let mut out = String::new();
    for (section, body) in [("%pre", &metadata.pre_install), ("%post", &metadata.post_install)] {
        if let Some(body) = body {
            let _ = write!(out, "{section}\n{body}\n\n");
        }
    }
    out.trim_end().to_string()
}

/// Writes the descriptor to `path`.
pub fn write_descriptor(path: &Path, contents: &str) -> Result<(), FreezeError> {
    fs::write(path, contents).map_err(|source| FreezeError::Descriptor {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use frozenpkg_domain::PartOptions;

    fn metadata(pairs: &[(&str, &str)]) -> PackageMetadata {
        let mut options = PartOptions::new("package");
        for (key, value) in pairs {
            options.insert(*key, *value);
        }
        PackageMetadata::from_options(&options).expect("metadata")
    }

    #[test]
    fn every_placeholder_is_filled() {
        let meta = metadata(&[
            ("pkg-name", "testapp"),
            ("pkg-version", "1.0"),
            ("pkg-deps", "openssl\nzlib"),
            ("pkg-pre-install", "echo pre"),
            ("pkg-post-install", "echo post"),
        ]);
        let text = render_descriptor(
            &meta,
            Path::new("/tmp/rpmbuild-x"),
            Path::new("/tmp/rpmbuild-x/BUILDROOT/testapp"),
        );
        assert!(!text.contains('@'), "unfilled placeholder in:\n{text}");
        assert!(text.contains("%define _topdir         /tmp/rpmbuild-x\n"));
        assert!(text.contains("Version:              1.0\n"));
        assert!(text.contains("Release:              0\n"));
        assert!(text.contains("AutoReqProv:          no\n"));
        assert!(text.contains("Requires: openssl\nRequires: zlib\n"));
        assert!(text.contains("%pre\necho pre\n\n%post\necho post\n"));
        assert!(text.contains("%defattr(-, nobody, nobody, 0755)\n\n/opt/testapp\n"));
        assert!(text.contains("BuildRoot:            /tmp/rpmbuild-x/BUILDROOT/testapp\n"));
    }

    #[test]
    fn custom_prefix_and_autodeps() {
        let meta = metadata(&[
            ("pkg-name", "svc"),
            ("install-prefix", "/srv/svc"),
            ("pkg-autodeps", "yes"),
        ]);
        let text = render_descriptor(&meta, Path::new("/t"), Path::new("/t/BUILDROOT/svc"));
        assert!(text.contains("AutoReqProv:          yes\n"));
        assert!(text.contains("Prefix:               /srv/svc\n"));
        assert!(text.trim_end().ends_with("/srv/svc"));
    }

    #[test]
    fn descriptor_write_failure_is_typed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = write_descriptor(&temp.path().join("missing/dir/app.spec"), "x")
            .expect_err("write should fail");
        assert_eq!(err.code(), "FZ111");
    }
}
