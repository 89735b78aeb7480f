//! Outcome shaping for the CLI.

pub mod outcome;
