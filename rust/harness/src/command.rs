//! Scheduler command lines for trainer runs.

use bamboo_config::{Invocation, SchedulerSettings};

/// A complete command line, run through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShellCommand(String);

impl ShellCommand {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self(command.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `salloc -N<nodes> -p<partition> -t<minutes>`. Flag order is fixed.
#[must_use]
pub fn allocation(
    settings: &SchedulerSettings,
    num_nodes: u32,
    partition: &str,
    minutes: u32,
) -> String {
    format!(
        "{} -N{num_nodes} -p{partition} -t{minutes}",
        settings.allocator
    )
}

/// Build the scheduler command for a full trainer run.
///
/// Paths are not checked; a bad path shows up as a failing run.
#[must_use]
pub fn build_command(invocation: &Invocation, settings: &SchedulerSettings) -> ShellCommand {
    let alloc = allocation(
        settings,
        invocation.num_nodes,
        settings.partition_for(&invocation.cluster),
        settings.time_limit_minutes,
    );
    let mut parts = vec![
        alloc,
        settings.launcher.clone(),
        format!("-n{}", invocation.num_processes),
        invocation.executable.display().to_string(),
    ];
    parts.extend(invocation.to_cli_args());
    parts.push(format!("> {}", invocation.output_file.display()));
    parts.push(format!("2> {}", invocation.error_file.display()));
    ShellCommand(parts.join(" "))
}
