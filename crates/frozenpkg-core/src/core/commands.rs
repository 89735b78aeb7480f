//! Entry points the CLI dispatches to: load configuration, run one driver,
//! and shape the result into an [`ExecutionOutcome`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use frozenpkg_domain::FreezeConfig;

use super::errors::FreezeError;
use super::pipeline::{FreezeContext, FreezeOutput};
use super::rpm::build_rpm;
use super::settings::EnvSnapshot;
use super::stage::StageFailure;
use super::tarball::build_tarball;
use super::tooling::outcome::ExecutionOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreezeFormat {
    Rpm,
    Tarball,
}

impl FreezeFormat {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Tarball => "tgz",
        }
    }
}

/// One packaging request as parsed from the command line.
#[derive(Clone, Debug)]
pub struct FreezeCommand {
    pub format: FreezeFormat,
    pub config_path: PathBuf,
    pub part: String,
    /// `key=value` overrides applied on top of the part options.
    pub overrides: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub debug: bool,
}

/// Runs `command` to completion and reports the outcome.
pub fn execute(command: &FreezeCommand, env: &EnvSnapshot) -> ExecutionOutcome {
    let ctx = match prepare(command, env) {
        Ok(ctx) => ctx,
        Err(err) => return config_failure(&err),
    };
    let result = match command.format {
        FreezeFormat::Rpm => build_rpm(&ctx),
        FreezeFormat::Tarball => build_tarball(&ctx),
    };
    match result {
        Ok(output) => success(command.format, &ctx, &output),
        Err(failure) => stage_failure(command.format, &failure),
    }
}

fn prepare(command: &FreezeCommand, env: &EnvSnapshot) -> Result<FreezeContext, FreezeError> {
    let mut config = FreezeConfig::load(&command.config_path, &command.part)
        .map_err(|err| FreezeError::Config(format!("{err:#}")))?;
    for raw in &command.overrides {
        config
            .apply_override(raw)
            .map_err(|err| FreezeError::Config(format!("{err:#}")))?;
    }
    FreezeContext::new(
        config,
        command.output_dir.clone(),
        command.work_dir.clone(),
        command.debug,
        env.clone(),
    )
}

fn config_failure(err: &FreezeError) -> ExecutionOutcome {
    error!(code = err.code(), "{err}");
    let details = err.details(None);
    if err.is_user_error() {
        ExecutionOutcome::user_error(err.to_string(), details)
    } else {
        ExecutionOutcome::failure(err.to_string(), details)
    }
}

fn stage_failure(format: FreezeFormat, failure: &StageFailure) -> ExecutionOutcome {
    error!(
        driver = format.label(),
        state = %failure.state,
        code = failure.error.code(),
        "{}",
        failure.error
    );
    if let Some(output) = failure.error.captured_output() {
        eprintln!("{output}");
    }
    let mut details = failure.details();
    if let Value::Object(ref mut map) = details {
        map.insert("format".into(), Value::String(format.label().to_string()));
    }
    let message = format!("{} packaging failed: {}", format.label(), failure.error);
    if failure.error.is_user_error() {
        ExecutionOutcome::user_error(message, details)
    } else {
        ExecutionOutcome::failure(message, details)
    }
}

fn success(format: FreezeFormat, ctx: &FreezeContext, output: &FreezeOutput) -> ExecutionOutcome {
    if let Some(bad) = &output.report.malformed_extra {
        warn!(line = %bad, "extra-copies processing stopped at a malformed line");
    }
    let artifacts: Vec<String> = output
        .artifacts
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    let message = match artifacts.as_slice() {
        [] => format!("{} built no artifacts for {}", format.label(), ctx.metadata.name),
        [one] => format!("built {one}"),
        many => format!("built {} artifacts for {}", many.len(), ctx.metadata.name),
    };
    let details = json!({
        "format": format.label(),
        "package": ctx.metadata.name,
        "version": ctx.metadata.version,
        "install_prefix": ctx.metadata.install_prefix.target().display().to_string(),
        "artifacts": artifacts,
        "state": output.state,
        "scratch": output.retained_scratch.as_ref().map(|path| path.display().to_string()),
        "report": serde_json::to_value(&output.report).unwrap_or(Value::Null),
    });
    ExecutionOutcome::success(message, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tooling::outcome::CommandStatus;
    use std::fs;

    fn command(config_path: PathBuf, format: FreezeFormat) -> FreezeCommand {
        FreezeCommand {
            format,
            config_path,
            part: "package".into(),
            overrides: Vec::new(),
            output_dir: None,
            work_dir: None,
            debug: false,
        }
    }

    #[test]
    fn missing_config_file_is_a_user_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = command(temp.path().join("absent.toml"), FreezeFormat::Tarball);
        let outcome = execute(&cmd, &EnvSnapshot::default());
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert_eq!(outcome.details["code"], "FZ100");
    }

    #[test]
    fn missing_pkg_name_is_a_user_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("frozenpkg.toml");
        fs::write(&path, "[package]\npkg-version = \"1.0\"\n").expect("write");
        let outcome = execute(&command(path, FreezeFormat::Rpm), &EnvSnapshot::default());
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.message.contains("pkg-name"));
    }

    #[test]
    fn malformed_override_is_a_user_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("frozenpkg.toml");
        fs::write(&path, "[package]\npkg-name = \"app\"\n").expect("write");
        let mut cmd = command(path, FreezeFormat::Tarball);
        cmd.overrides.push("no-equals-sign".into());
        let outcome = execute(&cmd, &EnvSnapshot::default());
        assert_eq!(outcome.status, CommandStatus::UserError);
    }

    #[cfg(unix)]
    #[test]
    fn missing_interpreter_fails_and_cleans_scratch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let work = temp.path().join("work");
        fs::create_dir_all(&work).expect("mkdir");
        let path = temp.path().join("frozenpkg.toml");
        fs::write(
            &path,
            "[package]\npkg-name = \"app\"\ninterpreter-search-dirs = \"\"\n",
        )
        .expect("write");
        let mut cmd = command(path, FreezeFormat::Tarball);
        cmd.work_dir = Some(work.clone());
        let outcome = execute(&cmd, &EnvSnapshot::default());
        assert_eq!(outcome.status, CommandStatus::Failure);
        assert_eq!(outcome.details["code"], "FZ101");
        assert_eq!(outcome.details["format"], "tgz");
        assert_eq!(fs::read_dir(&work).expect("read work").count(), 0);
    }
}
