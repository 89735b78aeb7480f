//! RPM driver: stages the payload below `BUILDROOT/<name>`, writes the
//! descriptor, archives both into `SOURCES/<name>.tar` and hands the
//! archive to `rpmbuild -ta`.

pub mod spec;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::archive::build_archive;
use super::errors::FreezeError;
use super::pipeline::{deliver, stage_payload, FreezeContext, FreezeOutput};
use super::process::run_command_interleaved;
use super::settings::rpmbuild_program;
use super::stage::{BuildState, StageFailure, StagingLayout, StateTracker};

pub use spec::{render_descriptor, write_descriptor, DESCRIPTOR_TEMPLATE};

/// Directories `rpmbuild` expects below its top directory.
pub const TOP_DIRS: [&str; 5] = ["BUILDROOT", "RPMS", "SOURCES", "SPECS", "SRPMS"];

/// Builds the RPM described by `ctx` and copies the produced `.rpm` files
/// into the output directory.
pub fn build_rpm(ctx: &FreezeContext) -> Result<FreezeOutput, StageFailure> {
    let mut tracker = StateTracker::new("rpm");
    let scratch = ctx.scratch("rpmbuild-").map_err(|err| tracker.fail(err))?;
    let result = run(ctx, scratch.path(), &mut tracker);
    let retained = scratch.is_retained().then(|| scratch.path().to_path_buf());
    drop(scratch);
    let (artifacts, report) = result.map_err(|err| tracker.fail(err))?;
    tracker.advance(BuildState::CleanedUp);
    Ok(FreezeOutput {
        artifacts,
        retained_scratch: retained,
        state: tracker.state(),
        report,
    })
}

fn run(
    ctx: &FreezeContext,
    top: &Path,
    tracker: &mut StateTracker,
) -> Result<(Vec<PathBuf>, super::pipeline::StagingReport), FreezeError> {
    let name = &ctx.metadata.name;
    for dir in TOP_DIRS {
        let path = top.join(dir);
        fs::create_dir_all(&path).map_err(|source| FreezeError::Layout { path, source })?;
    }
    let build_root = top.join("BUILDROOT").join(name);
    let layout = StagingLayout::new(&build_root, ctx.metadata.install_prefix.clone());
    tracker.advance(BuildState::DirsCreated);

    let report = stage_payload(ctx, &layout, tracker)?;

    let descriptor = render_descriptor(&ctx.metadata, top, &build_root);
    let spec_name = format!("{name}.spec");
    write_descriptor(&build_root.join(&spec_name), &descriptor)?;
    write_descriptor(&top.join("SPECS").join(&spec_name), &descriptor)?;
    tracker.advance(BuildState::SpecWritten);

    let archive = build_archive(&build_root, &top.join("SOURCES").join(format!("{name}.tar")), false)?;
    tracker.advance(BuildState::Archived);

    invoke_rpmbuild(ctx, top, &build_root, &archive)?;
    tracker.advance(BuildState::NativeToolInvoked);

    let mut artifacts = Vec::new();
    for rpm in find_rpms(&top.join("RPMS")) {
        artifacts.push(deliver(&rpm, &ctx.output_dir)?);
    }
    if artifacts.is_empty() {
        info!("rpmbuild succeeded but produced no packages");
    }
    tracker.advance(BuildState::ArtifactsCollected);
    Ok((artifacts, report))
}

fn invoke_rpmbuild(
    ctx: &FreezeContext,
    top: &Path,
    build_root: &Path,
    archive: &Path,
) -> Result<(), FreezeError> {
    let program = rpmbuild_program(&ctx.config.options, &ctx.env);
    let tool = program.display().to_string();
    let args = vec![
        "--buildroot".to_string(),
        build_root.display().to_string(),
        "--define".to_string(),
        format!("_topdir {}", top.display()),
        "-ta".to_string(),
        archive.display().to_string(),
    ];
    info!(command = %format!("{tool} {}", args.join(" ")), "launching native packaging tool");
    let output = run_command_interleaved(&program, &args, &[], top).map_err(|err| {
        FreezeError::NativeTool {
            tool: tool.clone(),
            code: -1,
            output: format!("{err:#}"),
        }
    })?;
    debug!(code = output.code, "native packaging tool finished");
    if !output.success() {
        error!(tool = %tool, code = output.code, "native packaging tool failed");
        return Err(FreezeError::NativeTool {
            tool,
            code: output.code,
            output: output.combined(),
        });
    }
    Ok(())
}

/// `RPMS/<arch>/*.rpm`, sorted.
fn find_rpms(rpms_dir: &Path) -> Vec<PathBuf> {
    let Ok(arches) = fs::read_dir(rpms_dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = arches
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|arch| fs::read_dir(arch).ok())
        .flat_map(|entries| entries.filter_map(Result::ok).map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "rpm"))
        .collect();
    found.sort();
    found
}
