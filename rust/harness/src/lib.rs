#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation
)]

//! Bamboo regression harness
//!
//! Finds the trainer builds for this cluster, runs them under the job
//! scheduler and turns their exit codes into pass/fail.

pub mod command;
pub mod config;
pub mod runner;
pub mod session;
pub mod suite;
pub mod sweep;

pub use command::{ShellCommand, build_command};
pub use config::HarnessConfig;
pub use runner::{Execute, RunResult, Runner};
pub use session::{Executables, Session, SessionOverrides};
pub use suite::{LayerTest, MEAN_ABSOLUTE_ERROR, Outcome};
pub use sweep::{ModelSweep, SweepReport};
