//! Per-compiler layer tests.
//!
//! Each test runs one small model through the trainer for every compiler
//! build and passes iff the trainer exits with status 0.

use std::path::{Path, PathBuf};

use bamboo_config::{Cluster, Compiler, Invocation, SchedulerSettings};

use crate::{
    command::build_command,
    runner::{Execute, RunError},
    session::Session,
};

/// A cluster/compiler pair that is skipped unconditionally.
#[derive(Debug, Clone, Copy)]
pub struct KnownFailure {
    pub cluster: &'static str,
    pub compiler: Compiler,
    pub note: &'static str,
}

/// One layer test, run once per compiler.
#[derive(Debug, Clone, Copy)]
pub struct LayerTest {
    /// Prefix of the output and error file names.
    pub name: &'static str,
    pub model_folder: &'static str,
    pub model_name: &'static str,
    pub data_reader: &'static str,
    pub optimizer: &'static str,
    pub num_nodes: u32,
    pub num_processes: u32,
    pub known_failures: &'static [KnownFailure],
}

pub const MEAN_ABSOLUTE_ERROR: LayerTest = LayerTest {
    name: "layer_mean_absolute_error",
    model_folder: "tests/layer_tests",
    model_name: "mean_absolute_error",
    data_reader: "synthetic",
    optimizer: "sgd",
    num_nodes: 1,
    num_processes: 2,
    known_failures: &[KnownFailure {
        cluster: "surface",
        compiler: Compiler::Gcc4,
        // FIXME: exits with status 34304 on surface, not investigated yet
        note: "FIXME",
    }],
};

/// Outcome of one layer test for one compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed { exit_code: Option<i32> },
    Skipped(String),
}

impl Outcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed { .. } => "FAILED",
            Self::Skipped(_) => "SKIPPED",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed {
                exit_code: Some(code),
            } => write!(f, "FAILED (exit code {code})"),
            Self::Failed { exit_code: None } => write!(f, "FAILED (killed by signal)"),
            Self::Skipped(reason) => write!(f, "SKIPPED ({reason})"),
        }
    }
}

impl LayerTest {
    /// Test id for `compiler`, e.g. `layer_mean_absolute_error_gcc7`.
    #[must_use]
    pub fn id(&self, compiler: Compiler) -> String {
        format!("{}_{compiler}", self.name)
    }

    /// Why `compiler` is skipped on `cluster`, if it is a known failure.
    #[must_use]
    pub fn known_failure(&self, cluster: &Cluster, compiler: Compiler) -> Option<&'static str> {
        self.known_failures
            .iter()
            .find(|k| k.cluster == cluster.as_str() && k.compiler == compiler)
            .map(|k| k.note)
    }

    #[must_use]
    pub fn output_file(&self, dirname: &Path, compiler: Compiler) -> PathBuf {
        dirname
            .join("bamboo/unit_tests/output")
            .join(format!("{}_{compiler}_output.txt", self.name))
    }

    #[must_use]
    pub fn error_file(&self, dirname: &Path, compiler: Compiler) -> PathBuf {
        dirname
            .join("bamboo/unit_tests/error")
            .join(format!("{}_{compiler}_error.txt", self.name))
    }

    /// The invocation for `compiler`, or the reason it is skipped.
    pub fn invocation(&self, session: &Session, compiler: Compiler) -> Result<Invocation, String> {
        if let Some(note) = self.known_failure(&session.cluster, compiler) {
            return Err(note.to_string());
        }
        let executable = session.executable_for(compiler).ok_or_else(|| match compiler {
            Compiler::Exe => "Non-local testing".to_string(),
            _ => format!("default_exes[{compiler}] does not exist"),
        })?;

        Ok(Invocation {
            cluster: session.cluster.clone(),
            executable: executable.to_path_buf(),
            num_nodes: self.num_nodes,
            num_processes: self.num_processes,
            dir_name: session.dirname.clone(),
            data_reader: self.data_reader.to_string(),
            model_folder: self.model_folder.to_string(),
            model_name: self.model_name.to_string(),
            optimizer: self.optimizer.to_string(),
            output_file: self.output_file(&session.dirname, compiler),
            error_file: self.error_file(&session.dirname, compiler),
            data_filedir: None,
        })
    }

    /// Run the test for `compiler`. Exactly one process is spawned unless the
    /// test is skipped.
    pub async fn run<E: Execute>(
        &self,
        executor: &E,
        session: &Session,
        settings: &SchedulerSettings,
        compiler: Compiler,
    ) -> Result<Outcome, RunError> {
        let invocation = match self.invocation(session, compiler) {
            Ok(invocation) => invocation,
            Err(reason) => {
                tracing::info!("Skipping {}: {}", self.id(compiler), reason);
                return Ok(Outcome::Skipped(reason));
            }
        };

        for file in [&invocation.output_file, &invocation.error_file] {
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RunError::Io(parent.to_path_buf(), e))?;
            }
        }

        let command = build_command(&invocation, settings);
        tracing::info!("Running {}", self.id(compiler));
        let result = executor.execute(&command).await?;

        if result.success {
            Ok(Outcome::Passed)
        } else {
            tracing::error!(
                "{} failed: {}",
                self.id(compiler),
                result.error.as_deref().unwrap_or("unknown")
            );
            Ok(Outcome::Failed {
                exit_code: result.exit_code,
            })
        }
    }
}
