//! Mock scheduler and trainer scripts for end-to-end runs without a cluster.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use bamboo_config::SchedulerSettings;

/// Drops leading `-x` options, then runs the rest of the command line.
const MOCK_LAUNCHER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
    case "$1" in
        -*) shift ;;
        *) break ;;
    esac
done
exec "$@"
"#;

/// Write an executable script to `path`.
pub fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Scheduler settings whose `salloc`/`srun` are pass-through scripts in `dir`.
pub fn mock_scheduler(dir: &Path) -> SchedulerSettings {
    let salloc = dir.join("salloc");
    let srun = dir.join("srun");
    write_script(&salloc, MOCK_LAUNCHER);
    write_script(&srun, MOCK_LAUNCHER);
    SchedulerSettings {
        allocator: salloc.display().to_string(),
        launcher: srun.display().to_string(),
        ..SchedulerSettings::default()
    }
}

/// A trainer that appends its arguments to `args.log` in `dir` and fails when
/// any argument mentions "broken".
pub fn mock_trainer(dir: &Path) -> (PathBuf, PathBuf) {
    let trainer = dir.join("lbann");
    let log = dir.join("args.log");
    let script = format!(
        r#"#!/bin/sh
echo "$@" >> "{}"
echo "trainer setup done"
case "$*" in
    *broken*) echo "error: bad layer" >&2; exit 1 ;;
esac
exit 0
"#,
        log.display()
    );
    write_script(&trainer, &script);
    (trainer, log)
}

/// Create an empty file and its parent directories.
pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

/// Lines the mock trainer logged, empty if it never ran.
pub fn logged_args(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .map(|s| s.lines().map(String::from).collect())
        .unwrap_or_default()
}
