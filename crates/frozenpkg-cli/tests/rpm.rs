#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;

mod common;

use common::{archive_files, parse_json, BuildFixture};

#[test]
fn rpm_hands_a_tar_with_descriptor_to_rpmbuild() {
    let fixture = BuildFixture::new();
    let rpmbuild = fixture.install_fake_rpmbuild();
    let log = fixture.temp.path().join("rpmbuild.args");

    let assert = cargo_bin_cmd!("frozenpkg")
        .arg("--json")
        .arg("rpm")
        .arg("--config")
        .arg(fixture.config_path())
        .arg("--set")
        .arg("pkg-deps=openssl")
        .arg("--work-dir")
        .arg(&fixture.work)
        .arg("--output-dir")
        .arg(&fixture.out)
        .env("FROZENPKG_RPMBUILD", &rpmbuild)
        .env("FAKE_RPMBUILD_LOG", &log)
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["command"], "rpm");
    assert_eq!(payload["details"]["state"], "CleanedUp");

    let args: Vec<String> = fs::read_to_string(&log)
        .expect("rpmbuild log")
        .lines()
        .map(ToOwned::to_owned)
        .collect();
    assert_eq!(args.len(), 6, "{args:?}");
    assert_eq!(args[0], "--buildroot");
    assert!(args[1].ends_with("BUILDROOT/testapp"), "{args:?}");
    assert_eq!(args[2], "--define");
    assert!(args[3].starts_with("_topdir "), "{args:?}");
    assert!(args[3].contains("rpmbuild-"), "{args:?}");
    assert_eq!(args[4], "-ta");
    assert!(args[5].ends_with("SOURCES/testapp.tar"), "{args:?}");

    let rpm = fixture.out.join("testapp-1.0-0.x86_64.rpm");
    assert!(rpm.is_file(), "missing {}", rpm.display());
    assert_eq!(payload["details"]["artifacts"][0], rpm.display().to_string());

    // the fake tool ships the source tar itself
    let files = archive_files(&rpm, false);
    let descriptor = String::from_utf8(files["testapp.spec"].clone()).expect("utf8");
    assert!(descriptor.contains("Name:                 testapp\n"));
    assert!(descriptor.contains("Version:              1.0\n"));
    assert!(descriptor.contains("Requires: openssl\n"));
    assert!(descriptor.trim_end().ends_with("/opt/testapp"));
    assert!(files.contains_key("opt/testapp/bin/run.real"));
    assert!(files.contains_key("opt/testapp/lib/python3.9/site-packages/mylib/__init__.py"));

    assert_eq!(fixture.scratch_entries(), 0, "scratch directory left behind");
}

#[test]
fn rpmbuild_failure_surfaces_its_output() {
    let fixture = BuildFixture::new();
    let rpmbuild = fixture.install_fake_rpmbuild();

    let assert = cargo_bin_cmd!("frozenpkg")
        .arg("--json")
        .arg("rpm")
        .arg("--config")
        .arg(fixture.config_path())
        .arg("--work-dir")
        .arg(&fixture.work)
        .arg("--output-dir")
        .arg(&fixture.out)
        .env("FROZENPKG_RPMBUILD", &rpmbuild)
        .env("FAKE_RPMBUILD_FAIL", "1")
        .assert()
        .code(2);
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "failure");
    assert_eq!(payload["details"]["code"], "FZ130");
    assert_eq!(payload["details"]["state"], "Archived");
    assert!(payload["details"]["output"]
        .as_str()
        .is_some_and(|out| out.contains("Failed build dependencies")));

    let stderr = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(stderr.contains("Failed build dependencies"), "{stderr}");
    assert_eq!(fixture.scratch_entries(), 0, "scratch directory left behind");
    assert!(!fixture.out.exists());
}

#[test]
fn rpm_option_overrides_environment_tool() {
    let fixture = BuildFixture::new();
    let rpmbuild = fixture.install_fake_rpmbuild();

    cargo_bin_cmd!("frozenpkg")
        .arg("rpm")
        .arg("--config")
        .arg(fixture.config_path())
        .arg("--set")
        .arg(format!("rpmbuild={}", rpmbuild.display()))
        .arg("--work-dir")
        .arg(&fixture.work)
        .arg("--output-dir")
        .arg(&fixture.out)
        .env("FROZENPKG_RPMBUILD", "/nonexistent/rpmbuild")
        .assert()
        .success();
    assert!(fixture.out.join("testapp-1.0-0.x86_64.rpm").is_file());
}
