use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use frozenpkg_domain::InstallPrefix;

use super::errors::FreezeError;

/// Progress of one packaging run. The tarball driver skips the descriptor
/// and native-tool states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BuildState {
    Init,
    DirsCreated,
    RuntimeAssembled,
    PackagesCopied,
    ExtrasCopied,
    ScriptsFixed,
    SpecWritten,
    Archived,
    NativeToolInvoked,
    ArtifactsCollected,
    CleanedUp,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A fatal error together with the last state the run reached.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct StageFailure {
    pub state: BuildState,
    #[source]
    pub error: FreezeError,
}

impl StageFailure {
    pub fn details(&self) -> serde_json::Value {
        self.error.details(Some(self.state))
    }
}

/// Tracks and logs state transitions of a driver.
#[derive(Debug)]
pub(crate) struct StateTracker {
    driver: &'static str,
    state: BuildState,
}

impl StateTracker {
    pub(crate) fn new(driver: &'static str) -> Self {
        debug!(driver, state = %BuildState::Init, "packaging run started");
        Self {
            driver,
            state: BuildState::Init,
        }
    }

    pub(crate) fn state(&self) -> BuildState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: BuildState) {
        debug!(driver = self.driver, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Attaches the current state to `error`.
    pub(crate) fn fail(&self, error: FreezeError) -> StageFailure {
        info!(driver = self.driver, state = %self.state, code = error.code(), "packaging failed");
        StageFailure {
            state: self.state,
            error,
        }
    }
}

/// Where the payload is assembled: a staging root with the install prefix
/// below it. Extracting the root at `/` on the target reproduces the
/// installed tree.
#[derive(Clone, Debug)]
pub struct StagingLayout {
    root: PathBuf,
    prefix: InstallPrefix,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>, prefix: InstallPrefix) -> Self {
        Self {
            root: root.into(),
            prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &InstallPrefix {
        &self.prefix
    }

    /// The staged install prefix, `<root>/<prefix>`.
    pub fn prefix_dir(&self) -> PathBuf {
        self.prefix.staged_under(&self.root)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix_dir().join("bin")
    }

    /// The install prefix as an absolute path on the target machine.
    pub fn target_prefix(&self) -> PathBuf {
        self.prefix.target()
    }

    /// Maps a staged path to its installed location; `None` for paths
    /// outside the staging root.
    pub fn target_of(&self, staged: &Path) -> Option<PathBuf> {
        staged
            .strip_prefix(&self.root)
            .ok()
            .map(|rel| Path::new("/").join(rel))
    }

    /// Creates the staged prefix and its `bin/` directory.
    pub(crate) fn create(&self) -> Result<(), FreezeError> {
        let bin = self.bin_dir();
        fs::create_dir_all(&bin).map_err(|source| FreezeError::Layout { path: bin, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_paths_map_to_target_paths() {
        let layout = StagingLayout::new(
            "/tmp/rpmbuild-x/BUILDROOT/app",
            InstallPrefix::parse("/opt/app").expect("prefix"),
        );
        assert_eq!(
            layout.prefix_dir(),
            PathBuf::from("/tmp/rpmbuild-x/BUILDROOT/app/opt/app")
        );
        assert_eq!(layout.target_prefix(), PathBuf::from("/opt/app"));
        assert_eq!(
            layout.target_of(&layout.bin_dir().join("python")),
            Some(PathBuf::from("/opt/app/bin/python"))
        );
        assert_eq!(layout.target_of(Path::new("/elsewhere")), None);
    }

    #[test]
    fn failure_records_the_state_reached() {
        let mut tracker = StateTracker::new("tgz");
        tracker.advance(BuildState::DirsCreated);
        let failure = tracker.fail(FreezeError::InterpreterNotFound { searched: vec![] });
        assert_eq!(failure.state, BuildState::DirsCreated);
        assert_eq!(failure.details()["state"], "DirsCreated");
        assert_eq!(failure.details()["code"], "FZ101");
    }
}
