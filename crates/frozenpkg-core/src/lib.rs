#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod core;

pub mod relocate {
    pub use crate::core::relocate::*;
}

pub mod runtime {
    pub use crate::core::runtime::*;
}

pub use crate::core::archive::build_archive;
pub use crate::core::collect::{collect, CopyOutcome};
pub use crate::core::commands::{execute, FreezeCommand, FreezeFormat};
pub use crate::core::errors::FreezeError;
pub use crate::core::extras::{apply_cleanups, copy_extras, ExtraCopy, ExtrasReport};
pub use crate::core::namespace::{reconstruct, NamespaceNode, NamespaceTree, NAMESPACE_MARKER};
pub use crate::core::packages::{
    configured_packages, install_packages, resolve, resolve_all, InstalledPackages, PackageKind,
    PackageOutcome, PackageSpec,
};
pub use crate::core::pipeline::{FreezeContext, FreezeOutput, StagingReport};
pub use crate::core::process::{run_command, run_command_interleaved, RunOutput};
pub use crate::core::rpm::{build_rpm, render_descriptor, write_descriptor, DESCRIPTOR_TEMPLATE};
pub use crate::core::scripts::{relocate as relocate_scripts, render_wrapper, ScriptBinding, ScriptOutcome};
pub use crate::core::settings::{rpmbuild_program, EnvSnapshot, GlobalOptions, RPMBUILD_ENV};
pub use crate::core::stage::{BuildState, StageFailure, StagingLayout};
pub use crate::core::tarball::build_tarball;
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};

pub use frozenpkg_domain::{FreezeConfig, PackageMetadata, PartOptions, DEFAULT_CONFIG_FILE, DEFAULT_PART};

pub const FROZENPKG_VERSION: &str = env!("CARGO_PKG_VERSION");
