//! Staging steps shared by the RPM and tarball drivers.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use frozenpkg_domain::{FreezeConfig, PackageMetadata};

use super::errors::FreezeError;
use super::extras::{apply_cleanups, copy_extras};
use super::fs::ScratchDir;
use super::packages::{install_packages, resolve_all, PackageOutcome};
use super::relocate::SubstitutionList;
use super::runtime::{assemble, RuntimeSpec};
use super::scripts::{relocate, ScriptOutcome};
use super::settings::EnvSnapshot;
use super::stage::{BuildState, StagingLayout, StateTracker};

/// Everything one packaging run works from. Immutable once built.
#[derive(Debug)]
pub struct FreezeContext {
    pub config: FreezeConfig,
    pub metadata: PackageMetadata,
    pub output_dir: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub debug: bool,
    pub env: EnvSnapshot,
}

impl FreezeContext {
    /// Validates the part options and settles output locations.
    ///
    /// `debug` is on when requested here or by the part's `debug` option.
    /// The output directory defaults to the build directory.
    pub fn new(
        config: FreezeConfig,
        output_dir: Option<PathBuf>,
        work_dir: Option<PathBuf>,
        debug: bool,
        env: EnvSnapshot,
    ) -> Result<Self, FreezeError> {
        let metadata = PackageMetadata::from_options(&config.options)
            .map_err(|err| FreezeError::Config(format!("{err:#}")))?;
        let debug = debug || config.options.flag("debug");
        let output_dir = output_dir.unwrap_or_else(|| config.environment.directory.clone());
        Ok(Self {
            config,
            metadata,
            output_dir,
            work_dir,
            debug,
            env,
        })
    }

    /// Creates the run's scratch directory, retained when debugging.
    pub(crate) fn scratch(&self, prefix: &str) -> Result<ScratchDir, FreezeError> {
        let mut scratch = ScratchDir::new_in(self.work_dir.as_deref(), prefix).map_err(|err| {
            FreezeError::Layout {
                path: self.work_dir.clone().unwrap_or_else(std::env::temp_dir),
                source: std::io::Error::other(format!("{err:#}")),
            }
        })?;
        if self.debug {
            scratch.retain();
        }
        info!(path = %scratch.path().display(), debug = self.debug, "scratch directory");
        Ok(scratch)
    }
}

/// Per-step results of staging, reported back to the caller.
#[derive(Debug, Default, Serialize)]
pub struct StagingReport {
    pub python_version: String,
    pub interpreter: PathBuf,
    pub packages: Vec<(String, PackageOutcome)>,
    pub scripts: Vec<(String, ScriptOutcome)>,
    pub extras: Vec<PathBuf>,
    pub failed_extras: Vec<(PathBuf, String)>,
    pub cleaned: Vec<PathBuf>,
    pub malformed_extra: Option<String>,
    pub substitutions: SubstitutionList,
}

/// What a successful run leaves behind.
#[derive(Debug, Serialize)]
pub struct FreezeOutput {
    pub artifacts: Vec<PathBuf>,
    /// Scratch directory kept for inspection (`debug`).
    pub retained_scratch: Option<PathBuf>,
    pub state: BuildState,
    pub report: StagingReport,
}

/// Stages the runtime, packages, extras and scripts under `layout`,
/// advancing `tracker` from `RuntimeAssembled` to `ScriptsFixed`.
pub(crate) fn stage_payload(
    ctx: &FreezeContext,
    layout: &StagingLayout,
    tracker: &mut StateTracker,
) -> Result<StagingReport, FreezeError> {
    let env = &ctx.config.environment;
    let options = &ctx.config.options;
    layout.create()?;

    let runtime = assemble(layout, env, &RuntimeSpec::from_options(options, env))?;
    let mut substitutions = runtime.substitutions.clone();
    tracker.advance(BuildState::RuntimeAssembled);

    let specs = resolve_all(env, options);
    let installed = install_packages(&specs, &runtime.site_packages, &runtime.target_site_packages);
    substitutions.extend(installed.substitutions);
    tracker.advance(BuildState::PackagesCopied);

    let extras = copy_extras(options, env, layout)
        .map_err(|err| FreezeError::staging("copying extra files", err))?;
    substitutions.extend(extras.substitutions);
    tracker.advance(BuildState::ExtrasCopied);

    // anything still pointing into the build directory belongs under the prefix
    substitutions.push_path(&env.directory, &layout.target_prefix());
    debug!(count = substitutions.len(), "substitutions collected");

    let scripts = relocate(
        &options.list("scripts"),
        &substitutions,
        env,
        layout,
        &runtime.target_lib,
    );
    let cleaned = apply_cleanups(options, layout)
        .map_err(|err| FreezeError::staging("applying extra cleanups", err))?;
    tracker.advance(BuildState::ScriptsFixed);

    Ok(StagingReport {
        python_version: runtime.python_version,
        interpreter: runtime.interpreter,
        packages: installed.outcomes,
        scripts,
        extras: extras.copied,
        failed_extras: extras.failed,
        cleaned,
        malformed_extra: extras.malformed,
        substitutions,
    })
}

/// Copies `artifact` into `output_dir` and returns the copy's path.
pub(crate) fn deliver(artifact: &Path, output_dir: &Path) -> Result<PathBuf, FreezeError> {
    let layout_error = |source| FreezeError::Layout {
        path: output_dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(output_dir).map_err(layout_error)?;
    let Some(name) = artifact.file_name() else {
        return Err(FreezeError::staging(
            "collecting artifacts",
            anyhow::anyhow!("{} has no file name", artifact.display()),
        ));
    };
    let dest = output_dir.join(name);
    fs::copy(artifact, &dest).map_err(|err| {
        FreezeError::staging(format!("copying {} to {}", artifact.display(), dest.display()), err)
    })?;
    info!(artifact = %dest.display(), "built");
    Ok(dest)
}
