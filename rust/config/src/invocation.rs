//! Scheduler settings and the trainer invocation description.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::types::Cluster;

/// How jobs are allocated and launched on the cluster.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Allocation program (`salloc`).
    #[serde(default = "default_allocator")]
    pub allocator: String,
    /// Parallel launch program (`srun`).
    #[serde(default = "default_launcher")]
    pub launcher: String,
    /// Partition used unless the cluster has an entry in `partitions`.
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Time limit for full test runs, in minutes.
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: u32,
    /// Time limit for exit-after-setup checks, in minutes.
    #[serde(default = "default_setup_time_limit")]
    pub setup_time_limit_minutes: u32,
    /// Per-cluster partition overrides.
    #[serde(default)]
    pub partitions: BTreeMap<String, String>,
}

fn default_allocator() -> String {
    "salloc".into()
}
fn default_launcher() -> String {
    "srun".into()
}
fn default_partition() -> String {
    "pdebug".into()
}
fn default_time_limit() -> u32 {
    60
}
fn default_setup_time_limit() -> u32 {
    1
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            allocator: default_allocator(),
            launcher: default_launcher(),
            partition: default_partition(),
            time_limit_minutes: default_time_limit(),
            setup_time_limit_minutes: default_setup_time_limit(),
            partitions: BTreeMap::new(),
        }
    }
}

impl SchedulerSettings {
    /// Partition to request on `cluster`.
    #[must_use]
    pub fn partition_for(&self, cluster: &Cluster) -> &str {
        self.partitions
            .get(cluster.as_str())
            .map_or(self.partition.as_str(), String::as_str)
    }
}

/// Everything needed to run the trainer once under the scheduler.
///
/// There are no defaults here: callers fill in every field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub cluster: Cluster,
    pub executable: PathBuf,
    pub num_nodes: u32,
    pub num_processes: u32,
    /// Repository root containing `model_zoo/`.
    pub dir_name: PathBuf,
    /// Data reader selector, as in `data_reader_<name>.prototext`.
    pub data_reader: String,
    /// Folder under `model_zoo/` holding the model file.
    pub model_folder: String,
    pub model_name: String,
    pub optimizer: String,
    pub output_file: PathBuf,
    pub error_file: PathBuf,
    /// Data directory handed to the trainer, if the reader needs one.
    pub data_filedir: Option<PathBuf>,
}

impl Invocation {
    fn model_zoo(&self) -> PathBuf {
        self.dir_name.join("model_zoo")
    }

    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.model_zoo()
            .join(&self.model_folder)
            .join(format!("model_{}.prototext", self.model_name))
    }

    #[must_use]
    pub fn reader_path(&self) -> PathBuf {
        reader_path(&self.model_zoo().join("data_readers"), &self.data_reader)
    }

    #[must_use]
    pub fn optimizer_path(&self) -> PathBuf {
        self.model_zoo()
            .join("optimizers")
            .join(format!("opt_{}.prototext", self.optimizer))
    }

    /// Trainer flags, in the order the trainer expects them.
    #[must_use]
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--model={}", self.model_path().display()),
            format!("--reader={}", self.reader_path().display()),
            format!("--optimizer={}", self.optimizer_path().display()),
        ];
        if let Some(ref dir) = self.data_filedir {
            args.push(format!("--data_filedir={}", dir.display()));
        }
        args
    }
}

/// Path of the data reader configuration `name` inside `readers_dir`.
#[must_use]
pub fn reader_path(readers_dir: &Path, name: &str) -> PathBuf {
    readers_dir.join(format!("data_reader_{name}.prototext"))
}
