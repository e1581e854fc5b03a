//! Session-wide values injected into every test: repository root, cluster and
//! trainer executables.
//!
//! Resolution shells out to `hostname` and `git`. If either lookup fails the
//! whole session fails; there is no per-test fallback.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
    sync::OnceLock,
};

use bamboo_config::{Cluster, Compiler};

/// Trainer binary name inside a build tree.
const TRAINER_BINARY: &str = "lbann";

/// Command-line overrides for the session values.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SessionOverrides {
    /// Trainer executable to test instead of the nightly build
    #[arg(long, global = true)]
    pub exe: Option<PathBuf>,

    /// Top-level repository directory (default: `git rev-parse --show-toplevel`)
    #[arg(long, global = true)]
    pub dirname: Option<PathBuf>,
}

/// Environment variable read by [`Session::shared`] in place of `--exe`.
pub const EXE_ENV: &str = "BAMBOO_EXE";
/// Environment variable read by [`Session::shared`] in place of `--dirname`.
pub const DIRNAME_ENV: &str = "BAMBOO_DIRNAME";

impl SessionOverrides {
    /// Overrides taken from `BAMBOO_EXE` and `BAMBOO_DIRNAME`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            exe: path(EXE_ENV),
            dirname: path(DIRNAME_ENV),
        }
    }
}

/// Trainer executables keyed by the compiler that built them.
///
/// Only binaries that exist are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Executables(BTreeMap<Compiler, PathBuf>);

impl Executables {
    /// Probe the per-compiler build trees under `dirname`.
    #[must_use]
    pub fn discover(dirname: &Path, cluster: &Cluster) -> Self {
        let mut exes = Self::default();
        for compiler in Compiler::BUILDS {
            let path = dirname
                .join("bamboo/compiler_tests/builds")
                .join(format!("{cluster}_{compiler}"))
                .join("build/model_zoo")
                .join(TRAINER_BINARY);
            if path.is_file() {
                tracing::debug!("Found {} build at {}", compiler, path.display());
                exes.insert(compiler, path);
            } else {
                tracing::debug!("No {} build at {}", compiler, path.display());
            }
        }
        exes
    }

    pub fn insert(&mut self, compiler: Compiler, path: impl Into<PathBuf>) {
        self.0.insert(compiler, path.into());
    }

    #[must_use]
    pub fn get(&self, compiler: Compiler) -> Option<&Path> {
        self.0.get(&compiler).map(PathBuf::as_path)
    }

    #[must_use]
    pub fn contains(&self, compiler: Compiler) -> bool {
        self.0.contains_key(&compiler)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Compiler, &Path)> {
        self.0.iter().map(|(c, p)| (*c, p.as_path()))
    }
}

impl FromIterator<(Compiler, PathBuf)> for Executables {
    fn from_iter<T: IntoIterator<Item = (Compiler, PathBuf)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolved session values.
#[derive(Debug, Clone)]
pub struct Session {
    pub cluster: Cluster,
    pub dirname: PathBuf,
    /// Executable from `--exe`, if one was given.
    pub exe: Option<PathBuf>,
    pub exes: Executables,
}

static SHARED: OnceLock<Result<Session, SessionError>> = OnceLock::new();

impl Session {
    /// Resolve the session from the host, applying `overrides`.
    pub fn resolve(overrides: &SessionOverrides) -> Result<Self, SessionError> {
        let cluster = Cluster::from_hostname(&query("hostname", &[])?);
        let dirname = match overrides.dirname {
            Some(ref dir) => dir.clone(),
            None => PathBuf::from(query("git", &["rev-parse", "--show-toplevel"])?),
        };
        let exes = Executables::discover(&dirname, &cluster);

        tracing::info!(
            "Session: cluster={} dirname={} builds={}",
            cluster,
            dirname.display(),
            exes.iter()
                .map(|(c, _)| c.key())
                .collect::<Vec<_>>()
                .join(",")
        );

        Ok(Self {
            cluster,
            dirname,
            exe: overrides.exe.clone(),
            exes,
        })
    }

    /// Resolve once per process and hand out the same values to every caller.
    ///
    /// Overrides come from the environment, see [`SessionOverrides::from_env`].
    pub fn shared() -> Result<&'static Self, &'static SessionError> {
        SHARED
            .get_or_init(|| Self::resolve(&SessionOverrides::from_env()))
            .as_ref()
    }

    /// Executable to test for `compiler`, if there is one.
    #[must_use]
    pub fn executable_for(&self, compiler: Compiler) -> Option<&Path> {
        match compiler {
            Compiler::Exe => self.exe.as_deref(),
            _ => self.exes.get(compiler),
        }
    }

    /// Location of the nightly trainer build for this cluster.
    #[must_use]
    pub fn nightly_exe(&self) -> PathBuf {
        self.dirname
            .join("../LBANN-NIGHTD-BDE/build")
            .join(format!("{}.llnl.gov", self.cluster))
            .join("model_zoo")
            .join(TRAINER_BINARY)
    }

    /// The `--exe` override, else the nightly build.
    #[must_use]
    pub fn trainer_exe(&self) -> PathBuf {
        self.exe.clone().unwrap_or_else(|| self.nightly_exe())
    }
}

/// Run a host command and return its trimmed stdout.
fn query(program: &str, args: &[&str]) -> Result<String, SessionError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| SessionError::Spawn(command.clone(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SessionError::Failed(command, stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(SessionError::Empty(command));
    }
    Ok(stdout)
}

/// Errors that can occur while resolving the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to run `{0}`: {1}")]
    Spawn(String, std::io::Error),
    #[error("`{0}` failed: {1}")]
    Failed(String, String),
    #[error("`{0}` printed nothing")]
    Empty(String),
}
