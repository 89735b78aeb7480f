use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use toml_edit::{DocumentMut, Item, Value as TomlValue};
use tracing::debug;

use crate::environment::BuildEnvironment;
use crate::options::PartOptions;

pub const DEFAULT_CONFIG_FILE: &str = "frozenpkg.toml";
pub const DEFAULT_PART: &str = "package";
const BUILDOUT_TABLE: &str = "buildout";

/// A loaded configuration: where the build environment lives and the
/// options of the selected packaging part.
#[derive(Clone, Debug)]
pub struct FreezeConfig {
    pub path: PathBuf,
    pub environment: BuildEnvironment,
    pub options: PartOptions,
}

impl FreezeConfig {
    /// Loads `path` and selects the `part` table.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, or when the
    /// part table does not exist.
    pub fn load(path: &Path, part: &str) -> Result<Self> {
        let path = absolutize(path)?;
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let base = path
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        let mut config = Self::parse_str(&contents, &base, part)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.path = path;
        Ok(config)
    }

    /// Parses configuration text; relative directories resolve against `base`.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not valid TOML or the part is missing.
    pub fn parse_str(contents: &str, base: &Path, part: &str) -> Result<Self> {
        let doc: DocumentMut = contents.parse()?;
        let environment = read_environment(&doc, base);
        let table = doc
            .get(part)
            .and_then(Item::as_table_like)
            .ok_or_else(|| anyhow!("configuration has no [{part}] table"))?;
        let mut options = PartOptions::new(part);
        for (key, item) in table.iter() {
            match item.as_value().map(option_text) {
                Some(Some(text)) => options.insert(key, text),
                _ => bail!("option `{key}` in [{part}] must be a string, number, boolean or array"),
            }
        }
        debug!(part, directory = %environment.directory.display(), "loaded configuration");
        Ok(Self {
            path: base.join(DEFAULT_CONFIG_FILE),
            environment,
            options,
        })
    }

    /// Applies a `key=value` override from the command line.
    ///
    /// # Errors
    ///
    /// Returns an error when the override has no `=`.
    pub fn apply_override(&mut self, raw: &str) -> Result<()> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("override `{raw}` must look like key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("override `{raw}` has an empty key");
        }
        // literal "\n" lets list options be overridden from a shell
        self.options.insert(key, value.replace("\\n", "\n"));
        Ok(())
    }
}

fn read_environment(doc: &DocumentMut, base: &Path) -> BuildEnvironment {
    let table = doc.get(BUILDOUT_TABLE).and_then(Item::as_table_like);
    let lookup = |key: &str| -> Option<String> {
        table
            .and_then(|t| t.get(key))
            .and_then(Item::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };
    let directory = lookup("directory").map_or_else(|| base.to_path_buf(), |raw| base.join(raw));
    let mut environment = BuildEnvironment::rooted_at(&directory);
    if let Some(raw) = lookup("bin-directory") {
        environment.bin_directory = directory.join(raw);
    }
    if let Some(raw) = lookup("eggs-directory") {
        environment.eggs_directory = directory.join(raw);
    }
    if let Some(raw) = lookup("develop-eggs-directory") {
        environment.develop_eggs_directory = directory.join(raw);
    }
    environment
}

fn option_text(value: &TomlValue) -> Option<String> {
    match value {
        TomlValue::String(s) => Some(s.value().clone()),
        TomlValue::Integer(i) => Some(i.value().to_string()),
        TomlValue::Float(f) => Some(f.value().to_string()),
        TomlValue::Boolean(b) => Some(b.value().to_string()),
        TomlValue::Array(items) => {
            let mut lines = Vec::new();
            for item in items {
                lines.push(item.as_str()?.to_string());
            }
            Some(lines.join("\n"))
        }
        TomlValue::Datetime(_) | TomlValue::InlineTable(_) => None,
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(env::current_dir()?.join(path))
}
