//! Tarball driver: stages the payload below `PKG/<name>` and writes
//! `<name>-<version>.tar[.gz]` into the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use frozenpkg_domain::is_truthy;

use super::archive::build_archive;
use super::errors::FreezeError;
use super::pipeline::{deliver, stage_payload, FreezeContext, FreezeOutput, StagingReport};
use super::stage::{BuildState, StageFailure, StagingLayout, StateTracker};

const TOP_DIRS: [&str; 2] = ["PKG", "TGZ"];

/// Builds the tarball described by `ctx`.
pub fn build_tarball(ctx: &FreezeContext) -> Result<FreezeOutput, StageFailure> {
    let mut tracker = StateTracker::new("tgz");
    let scratch = ctx.scratch("tgzfreeze-").map_err(|err| tracker.fail(err))?;
    let result = run(ctx, scratch.path(), &mut tracker);
    let retained = scratch.is_retained().then(|| scratch.path().to_path_buf());
    drop(scratch);
    let (artifact, report) = result.map_err(|err| tracker.fail(err))?;
    tracker.advance(BuildState::CleanedUp);
    Ok(FreezeOutput {
        artifacts: vec![artifact],
        retained_scratch: retained,
        state: tracker.state(),
        report,
    })
}

/// Compression is on unless the part's `compress` option says otherwise.
fn compress_enabled(ctx: &FreezeContext) -> bool {
    ctx.config.options.get("compress").is_none_or(is_truthy)
}

fn run(
    ctx: &FreezeContext,
    top: &Path,
    tracker: &mut StateTracker,
) -> Result<(PathBuf, StagingReport), FreezeError> {
    for dir in TOP_DIRS {
        let path = top.join(dir);
        fs::create_dir_all(&path).map_err(|source| FreezeError::Layout { path, source })?;
    }
    let layout = StagingLayout::new(
        top.join("PKG").join(&ctx.metadata.name),
        ctx.metadata.install_prefix.clone(),
    );
    tracker.advance(BuildState::DirsCreated);

    let report = stage_payload(ctx, &layout, tracker)?;

    let dest = top
        .join("TGZ")
        .join(format!("{}.tar", ctx.metadata.artifact_stem()));
    let archive = build_archive(layout.root(), &dest, compress_enabled(ctx))?;
    tracker.advance(BuildState::Archived);

    let delivered = deliver(&archive, &ctx.output_dir)?;
    tracker.advance(BuildState::ArtifactsCollected);
    Ok((delivered, report))
}
