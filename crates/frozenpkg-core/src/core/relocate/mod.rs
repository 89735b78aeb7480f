//! Literal path relocation: substitution lists, the in-place file rewriter
//! and root relativization. Nothing here knows about packaging formats.

pub mod rewrite;
pub mod roots;
pub mod substitution;

pub use rewrite::{replace_literal, rewrite_file};
pub use roots::KnownRoots;
pub use substitution::{Substitution, SubstitutionList};
