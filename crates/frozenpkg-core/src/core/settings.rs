use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use frozenpkg_domain::PartOptions;

/// Overrides the native packaging tool.
pub const RPMBUILD_ENV: &str = "FROZENPKG_RPMBUILD";
pub const DEFAULT_RPMBUILD: &str = "rpmbuild";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// The native packaging tool: the `rpmbuild` option, then
/// `FROZENPKG_RPMBUILD`, then `rpmbuild` from `PATH`.
pub fn rpmbuild_program(options: &PartOptions, env: &EnvSnapshot) -> PathBuf {
    options
        .get("rpmbuild")
        .or_else(|| env.var(RPMBUILD_ENV))
        .map_or_else(|| PathBuf::from(DEFAULT_RPMBUILD), PathBuf::from)
}
