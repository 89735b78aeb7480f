use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Values accepted as "on" for boolean options such as `debug` or `skip-sys`.
pub const TRUTHY_VALUES: [&str; 5] = ["yes", "true", "on", "1", "sure"];

#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    TRUTHY_VALUES.contains(&lowered.as_str())
}

/// The option table of one packaging part.
///
/// Values are kept as raw strings, the way a buildout section stores them;
/// list options are newline separated and read through [`PartOptions::list`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartOptions {
    name: String,
    values: BTreeMap<String, String>,
}

impl PartOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the trimmed value of `key`, treating blank values as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Returns the first key of `keys` that holds a value.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Splits a newline list option into its non-blank, trimmed lines.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .map(|raw| split_lines(raw))
            .unwrap_or_default()
    }

    /// Like [`PartOptions::list`] but merges several aliases in order.
    pub fn list_any(&self, keys: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        for key in keys {
            for item in self.list(key) {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
        }
        merged
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// Raw (untrimmed) value, used for shell snippets where indentation matters.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

pub(crate) fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
