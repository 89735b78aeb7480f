//! Interpreter discovery and runtime assembly.

pub mod assemble;
pub mod interpreter;

pub use assemble::{assemble, bootstrap_insertion, AssembledRuntime, RuntimeSpec, BOOTSTRAP_MARKER};
pub use interpreter::{candidate_names, locate_interpreter, python_version, DEFAULT_SEARCH_DIRS};
