#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod config;
pub mod environment;
pub mod metadata;
pub mod options;

pub use config::{FreezeConfig, DEFAULT_CONFIG_FILE, DEFAULT_PART};
pub use environment::BuildEnvironment;
pub use metadata::{InstallPrefix, PackageMetadata};
pub use options::{is_truthy, PartOptions, TRUTHY_VALUES};
