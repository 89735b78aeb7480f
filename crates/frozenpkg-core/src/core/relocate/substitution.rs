use std::path::Path;

use serde::Serialize;
use tracing::{trace, warn};

use super::rewrite::replace_literal;

/// One literal rewrite: every occurrence of `from` becomes `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

impl Substitution {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Ordered, append-only list of substitutions.
///
/// Order is part of the contract: each assembly step appends its pairs and
/// the relocator applies them front to back. A pair whose `from` occurs in
/// an earlier pair's `to` would rewrite already-relocated text, so `push`
/// reports such pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubstitutionList(Vec<Substitution>);

impl SubstitutionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair. Empty, identity and duplicate pairs are dropped and
    /// `false` is returned.
    pub fn push(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        let substitution = Substitution::new(from, to);
        if substitution.from.is_empty() || substitution.from == substitution.to {
            return false;
        }
        if self.0.iter().any(|existing| existing.from == substitution.from) {
            trace!(from = %substitution.from, "substitution already recorded");
            return false;
        }
        if let Some(earlier) = self
            .0
            .iter()
            .find(|existing| existing.to.contains(&substitution.from))
        {
            warn!(
                from = %substitution.from,
                earlier_to = %earlier.to,
                "substitution matches text produced by an earlier one"
            );
        }
        self.0.push(substitution);
        true
    }

    pub fn push_path(&mut self, from: &Path, to: &Path) -> bool {
        self.push(
            from.to_string_lossy().into_owned(),
            to.to_string_lossy().into_owned(),
        )
    }

    /// Appends every pair of `other`, keeping its order.
    pub fn extend(&mut self, other: SubstitutionList) {
        for Substitution { from, to } in other.0 {
            self.push(from, to);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Substitution> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies every pair in order; returns the new bytes and the total
    /// number of replacements.
    pub fn apply(&self, content: &[u8]) -> (Vec<u8>, usize) {
        let mut current = content.to_vec();
        let mut total = 0;
        for substitution in &self.0 {
            let (next, count) = replace_literal(
                &current,
                substitution.from.as_bytes(),
                substitution.to.as_bytes(),
            );
            if count > 0 {
                current = next;
                total += count;
            }
        }
        (current, total)
    }
}

impl<'a> IntoIterator for &'a SubstitutionList {
    type Item = &'a Substitution;
    type IntoIter = std::slice::Iter<'a, Substitution>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
