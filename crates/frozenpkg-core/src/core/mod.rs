//! Internal implementation modules for `frozenpkg-core`.
//!
//! Most callers should go through the crate root re-exports rather than
//! importing these modules directly.

pub mod archive;
pub mod collect;
pub mod commands;
pub mod errors;
pub mod extras;
pub mod fs;
pub mod namespace;
pub mod packages;
pub mod pipeline;
pub mod process;
pub mod relocate;
pub mod rpm;
pub mod runtime;
pub mod scripts;
pub mod settings;
pub mod stage;
pub mod tarball;
pub mod tooling;
