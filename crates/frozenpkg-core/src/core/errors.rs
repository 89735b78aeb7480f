use std::io;
use std::path::PathBuf;

use serde_json::{json, Value};

use super::stage::BuildState;

/// Conditions that abort a packaging run.
///
/// Recoverable problems (a missing script, one package that cannot be
/// reconstructed, a malformed extra-copy line) never surface here; they are
/// logged and reported in the step outcomes instead.
#[derive(thiserror::Error, Debug)]
pub enum FreezeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no python interpreter found")]
    InterpreterNotFound { searched: Vec<PathBuf> },
    #[error("could not determine the python version of {}", .interpreter.display())]
    InterpreterVersion { interpreter: PathBuf, reason: String },
    #[error("standard library directory {} does not exist", .path.display())]
    LibraryNotFound { path: PathBuf },
    #[error("failed to create build layout at {}", .path.display())]
    Layout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write package descriptor {}", .path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write archive {}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{tool} failed with exit code {code}")]
    NativeTool {
        tool: String,
        code: i32,
        output: String,
    },
    #[error("{context}")]
    Staging {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FreezeError {
    pub(crate) fn staging(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Staging {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Stable diagnostic code, reported in JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "FZ100",
            Self::InterpreterNotFound { .. } => "FZ101",
            Self::InterpreterVersion { .. } => "FZ102",
            Self::LibraryNotFound { .. } => "FZ103",
            Self::Layout { .. } => "FZ110",
            Self::Descriptor { .. } => "FZ111",
            Self::Archive { .. } => "FZ112",
            Self::Staging { .. } => "FZ120",
            Self::NativeTool { .. } => "FZ130",
        }
    }

    /// Whether the failure is the caller's to fix (configuration) rather
    /// than an environment or tooling failure.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Captured output of a failed subprocess, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::NativeTool { output, .. } => Some(output),
            Self::InterpreterVersion { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn details(&self, state: Option<BuildState>) -> Value {
        let mut details = match self {
            Self::Config(reason) => json!({ "reason": reason }),
            Self::InterpreterNotFound { searched } => json!({
                "searched": searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "hint": "set `sys-python` or install python in one of the searched directories",
            }),
            Self::InterpreterVersion { interpreter, reason } => json!({
                "interpreter": interpreter.display().to_string(),
                "reason": reason,
                "hint": "set `python-version` explicitly",
            }),
            Self::LibraryNotFound { path } => json!({
                "path": path.display().to_string(),
                "hint": "set `sys-lib` to the interpreter's standard library directory",
            }),
            Self::Layout { path, source }
            | Self::Descriptor { path, source }
            | Self::Archive { path, source } => json!({
                "path": path.display().to_string(),
                "error": source.to_string(),
            }),
            Self::NativeTool { tool, code, output } => json!({
                "tool": tool,
                "exit_code": code,
                "output": output,
            }),
            Self::Staging { source, .. } => json!({ "error": format!("{source:#}") }),
        };
        if let Value::Object(ref mut map) = details {
            map.insert("code".into(), Value::String(self.code().to_string()));
            if let Some(state) = state {
                map.insert("state".into(), Value::String(format!("{state:?}")));
            }
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_carry_code_and_state() {
        let err = FreezeError::LibraryNotFound {
            path: PathBuf::from("/nope/lib/python3.9"),
        };
        let details = err.details(Some(BuildState::DirsCreated));
        assert_eq!(details["code"], "FZ103");
        assert_eq!(details["state"], "DirsCreated");
        assert_eq!(details["path"], "/nope/lib/python3.9");
        assert!(!err.is_user_error());
    }

    #[test]
    fn native_tool_output_is_exposed() {
        let err = FreezeError::NativeTool {
            tool: "rpmbuild".into(),
            code: 1,
            output: "error: bad spec".into(),
        };
        assert_eq!(err.captured_output(), Some("error: bad spec"));
        assert_eq!(err.to_string(), "rpmbuild failed with exit code 1");
    }
}
