use std::fmt::Write as _;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use frozenpkg_domain::BuildEnvironment;

use super::fs::make_executable;
use super::relocate::{rewrite_file, SubstitutionList};
use super::stage::StagingLayout;

/// Where one configured script comes from and where its two staged files
/// go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptBinding {
    pub name: String,
    pub source: PathBuf,
    pub real: PathBuf,
    pub wrapper: PathBuf,
}

impl ScriptBinding {
    /// `None` unless `name` is a single plain file name, so both staged
    /// files stay inside `bin/`.
    pub fn new(name: &str, env: &BuildEnvironment, layout: &StagingLayout) -> Option<Self> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return None,
        }
        let bin = layout.bin_dir();
        Some(Self {
            name: name.to_string(),
            source: env.script(name),
            real: bin.join(format!("{name}.real")),
            wrapper: bin.join(name),
        })
    }

    /// The staged file this script would overwrite, such as the frozen
    /// interpreter for a script called `python`.
    fn clash(&self) -> Option<&Path> {
        [&self.wrapper, &self.real]
            .into_iter()
            .find(|path| fs::symlink_metadata(path).is_ok())
            .map(PathBuf::as_path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum ScriptOutcome {
    Relocated { replacements: usize },
    Missing,
    InvalidName,
    /// Left out because a staged file already has its name.
    Conflict(PathBuf),
    Failed(String),
}

/// Shell launcher for `<name>.real`: puts the frozen libraries on the
/// loader and import paths, then runs the frozen interpreter.
pub fn render_wrapper(target_prefix: &Path, target_lib: &Path, name: &str) -> String {
    let prefix = target_prefix.display();
    let mut script = String::from("#!/bin/sh\n");
    let _ = writeln!(
        script,
        "LD_LIBRARY_PATH=\"{prefix}/lib:{prefix}/lib64${{LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}}\""
    );
    script.push_str("export LD_LIBRARY_PATH\n");
    let _ = writeln!(script, "PYTHONPATH=\"{}\"", target_lib.display());
    script.push_str("export PYTHONPATH\n");
    let _ = writeln!(
        script,
        "exec \"{prefix}/bin/python\" \"{prefix}/bin/{name}.real\" \"$@\""
    );
    script
}

/// Copies every script into the staged `bin/` as `<name>.real`, rewrites
/// it with `substitutions` and writes its launcher. Best effort: a missing
/// or failing script does not stop the others.
pub fn relocate(
    names: &[String],
    substitutions: &SubstitutionList,
    env: &BuildEnvironment,
    layout: &StagingLayout,
    target_lib: &Path,
) -> Vec<(String, ScriptOutcome)> {
    names
        .iter()
        .map(|name| {
            let outcome = match ScriptBinding::new(name, env, layout) {
                Some(binding) => relocate_one(&binding, substitutions, layout, target_lib),
                None => {
                    warn!(script = %name, "script name must be a plain file name");
                    ScriptOutcome::InvalidName
                }
            };
            (name.clone(), outcome)
        })
        .collect()
}

fn relocate_one(
    binding: &ScriptBinding,
    substitutions: &SubstitutionList,
    layout: &StagingLayout,
    target_lib: &Path,
) -> ScriptOutcome {
    if !binding.source.is_file() {
        warn!(script = %binding.source.display(), "script not found");
        return ScriptOutcome::Missing;
    }
    if let Some(existing) = binding.clash() {
        warn!(
            script = %binding.name,
            existing = %existing.display(),
            "script would overwrite a staged file, leaving it out"
        );
        return ScriptOutcome::Conflict(existing.to_path_buf());
    }
    let wrapper = render_wrapper(&layout.target_prefix(), target_lib, &binding.name);
    let result = stage_script(binding, substitutions, &wrapper);
    match result {
        Ok(replacements) => {
            debug!(script = %binding.name, replacements, "relocated script");
            ScriptOutcome::Relocated { replacements }
        }
        Err(err) => {
            warn!(script = %binding.name, error = %err, "failed to relocate script");
            ScriptOutcome::Failed(err.to_string())
        }
    }
}

/// Stages both files of one script. On any failure neither is left
/// behind, so an unrewritten copy never reaches the archive.
fn stage_script(
    binding: &ScriptBinding,
    substitutions: &SubstitutionList,
    wrapper: &str,
) -> std::io::Result<usize> {
    if let Some(parent) = binding.real.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = fs::copy(&binding.source, &binding.real).and_then(|_| {
        let replacements = rewrite_file(&binding.real, substitutions)?;
        make_executable(&binding.real)?;
        fs::write(&binding.wrapper, wrapper)?;
        make_executable(&binding.wrapper)?;
        Ok(replacements)
    });
    if staged.is_err() {
        for path in [&binding.real, &binding.wrapper] {
            if fs::symlink_metadata(path).is_ok_and(|meta| !meta.is_dir()) {
                let _ = fs::remove_file(path);
            }
        }
    }
    staged
}
