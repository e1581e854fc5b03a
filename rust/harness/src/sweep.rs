//! Exit-after-setup smoke test over every model in the model zoo.
//!
//! Each model file is paired with a data reader by name, then run once with
//! `--exit_after_setup`. Models the trainer rejects end up on the defective
//! list; models with no known data reader are reported and left out.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use bamboo_config::{Cluster, ModelCategory, SchedulerSettings, reader_path};
use indicatif::ProgressBar;

use crate::{
    command::{ShellCommand, allocation},
    config::SweepSettings,
    runner::Execute,
    session::Session,
};

const MODEL_EXTENSION: &str = ".prototext";

/// A model file found by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEntry {
    Classified {
        file_name: String,
        path: PathBuf,
        category: ModelCategory,
    },
    Unclassified {
        file_name: String,
        path: PathBuf,
    },
}

impl SweepEntry {
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Classified { file_name, .. } | Self::Unclassified { file_name, .. } => file_name,
        }
    }
}

/// Whether `file_name` is a model configuration the sweep should look at.
#[must_use]
pub fn is_model_file(file_name: &str) -> bool {
    file_name.ends_with(MODEL_EXTENSION) && file_name.contains("model")
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Models that were run.
    pub attempted: usize,
    /// Models with no known data reader; not run.
    pub unclassified: Vec<String>,
    /// Models whose setup check exited non-zero.
    pub defective: Vec<String>,
}

impl SweepReport {
    /// Print the defective models, if any, and fail when there are some.
    pub fn finish(&self, out: &mut impl Write) -> Result<(), SweepError> {
        if self.defective.is_empty() {
            return Ok(());
        }
        writeln!(out, "The following models exited with errors")?;
        for name in &self.defective {
            writeln!(out, "{name}")?;
        }
        out.flush()?;
        Err(SweepError::Defective(self.defective.clone()))
    }
}

/// The model sweep for one trainer executable.
#[derive(Debug, Clone)]
pub struct ModelSweep {
    pub cluster: Cluster,
    pub exe: PathBuf,
    pub models_dir: PathBuf,
    pub data_readers_dir: PathBuf,
    pub optimizer: PathBuf,
    pub contact: String,
    pub scheduler: SchedulerSettings,
}

impl ModelSweep {
    /// Build a sweep for `session`, resolving relative paths against its root.
    #[must_use]
    pub fn new(session: &Session, sweep: &SweepSettings, scheduler: &SchedulerSettings) -> Self {
        Self {
            cluster: session.cluster.clone(),
            exe: session.trainer_exe(),
            models_dir: session.dirname.join(&sweep.models_dir),
            data_readers_dir: session.dirname.join(&sweep.data_readers_dir),
            optimizer: session.dirname.join(&sweep.optimizer),
            contact: sweep.contact.clone(),
            scheduler: scheduler.clone(),
        }
    }

    /// Walk the models directory and classify every model file, in path order.
    ///
    /// A missing models directory gives an empty plan.
    pub fn plan(&self) -> Result<Vec<SweepEntry>, SweepError> {
        let mut paths = Vec::new();
        if self.models_dir.is_dir() {
            collect_files(&self.models_dir, &mut paths)?;
        } else {
            tracing::warn!(
                "Models directory {} does not exist",
                self.models_dir.display()
            );
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?.to_string_lossy().into_owned();
                if !is_model_file(&file_name) {
                    return None;
                }
                Some(match ModelCategory::classify(&file_name) {
                    Some(category) => SweepEntry::Classified {
                        file_name,
                        path,
                        category,
                    },
                    None => SweepEntry::Unclassified { file_name, path },
                })
            })
            .collect())
    }

    /// The setup-only trainer command for one model.
    #[must_use]
    pub fn setup_command(&self, model: &Path, category: ModelCategory) -> ShellCommand {
        let alloc = allocation(
            &self.scheduler,
            1,
            self.scheduler.partition_for(&self.cluster),
            self.scheduler.setup_time_limit_minutes,
        );
        ShellCommand::new(format!(
            "{alloc} {} {} --model={} --reader={} --optimizer={} --exit_after_setup",
            self.scheduler.launcher,
            self.exe.display(),
            model.display(),
            reader_path(&self.data_readers_dir, category.reader_name()).display(),
            self.optimizer.display(),
        ))
    }

    /// Run the setup check for every classified model, one at a time.
    pub async fn run<E: Execute>(
        &self,
        executor: &E,
        progress: &ProgressBar,
    ) -> Result<SweepReport, SweepError> {
        let entries = self.plan()?;
        let mut report = SweepReport::default();
        progress.set_length(entries.len() as u64);

        for entry in entries {
            progress.set_message(entry.file_name().to_string());
            tracing::info!("Attempting model setup for: {}", entry.file_name());

            match entry {
                SweepEntry::Unclassified { file_name, .. } => {
                    tracing::warn!("Tell {} which data reader this model needs", self.contact);
                    report.unclassified.push(file_name);
                }
                SweepEntry::Classified {
                    file_name,
                    path,
                    category,
                } => {
                    report.attempted += 1;
                    let command = self.setup_command(&path, category);
                    let passed = match executor.execute(&command).await {
                        Ok(result) => result.success,
                        Err(e) => {
                            tracing::error!("{e}");
                            false
                        }
                    };
                    if !passed {
                        tracing::error!("Error detected in {}", path.display());
                        report.defective.push(file_name);
                    }
                }
            }
            progress.inc(1);
        }

        progress.finish_with_message(format!(
            "{} models checked, {} defective",
            report.attempted,
            report.defective.len()
        ));
        Ok(report)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SweepError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SweepError::Io(dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SweepError::Io(dir.to_path_buf(), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SweepError::Io(path.clone(), e))?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            // Linked directories are not descended into.
            tracing::debug!("Not following directory link {}", path.display());
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Errors that can occur during a sweep.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
    #[error("{} models exited with errors: {}", .0.len(), .0.join(", "))]
    Defective(Vec<String>),
}
