//! Cluster, compiler and model-category identifiers.

use serde::{Deserialize, Serialize};

/// Cluster identifier: the hostname with its node number removed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cluster(String);

impl Cluster {
    /// Derive the cluster from a hostname by dropping every digit.
    ///
    /// `"surface42"` and `"surface123"` both map to `"surface"`.
    #[must_use]
    pub fn from_hostname(hostname: &str) -> Self {
        Self(
            hostname
                .trim()
                .chars()
                .filter(|c| !c.is_ascii_digit())
                .collect(),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cluster {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Compiler a trainer build was produced with.
///
/// `Exe` stands for an executable handed in on the command line rather than
/// one of the nightly compiler builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Clang4,
    Gcc4,
    Gcc7,
    Intel18,
    Exe,
}

impl Compiler {
    /// Every compiler the layer tests are parametrised over.
    pub const ALL: [Self; 5] = [
        Self::Clang4,
        Self::Gcc4,
        Self::Gcc7,
        Self::Intel18,
        Self::Exe,
    ];

    /// Compilers that have a nightly build directory.
    pub const BUILDS: [Self; 4] = [Self::Clang4, Self::Gcc4, Self::Gcc7, Self::Intel18];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Clang4 => "clang4",
            Self::Gcc4 => "gcc4",
            Self::Gcc7 => "gcc7",
            Self::Intel18 => "intel18",
            Self::Exe => "exe",
        }
    }
}

impl std::fmt::Display for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.key())
    }
}

impl std::str::FromStr for Compiler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clang4" => Ok(Self::Clang4),
            "gcc4" => Ok(Self::Gcc4),
            "gcc7" => Ok(Self::Gcc7),
            "intel18" => Ok(Self::Intel18),
            "exe" => Ok(Self::Exe),
            _ => Err(format!(
                "unknown compiler '{s}'. Use: clang4, gcc4, gcc7, intel18, exe"
            )),
        }
    }
}

/// Dataset family a model configuration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Mnist,
    Imagenet,
    Cifar10,
}

/// Filename substrings checked in order; the first hit decides.
pub const CATEGORY_PATTERNS: [(&str, ModelCategory); 3] = [
    ("mnist", ModelCategory::Mnist),
    ("net", ModelCategory::Imagenet),
    ("cifar", ModelCategory::Cifar10),
];

impl ModelCategory {
    /// Classify a model file by name. `None` means no data reader is known.
    #[must_use]
    pub fn classify(file_name: &str) -> Option<Self> {
        CATEGORY_PATTERNS
            .iter()
            .find(|(pattern, _)| file_name.contains(pattern))
            .map(|&(_, category)| category)
    }

    /// Data reader selector, as in `data_reader_<name>.prototext`.
    #[must_use]
    pub fn reader_name(self) -> &'static str {
        match self {
            Self::Mnist => "mnist",
            Self::Imagenet => "imagenet",
            Self::Cifar10 => "cifar10",
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.reader_name())
    }
}
