//! Error taxonomy for manifest acquisition, reconciliation and writing

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Fixed prefix of every conflict report, so hosts can recognise it.
pub const CONFLICT_PREFIX: &str = "Cannot create package.json.";

pub type Result<T> = std::result::Result<T, PackTestError>;

#[derive(Error, Debug)]
pub enum PackTestError {
    #[error("Could not find package.json in '{}' or any parent directory", root.display())]
    NotFound { root: PathBuf },

    #[error(
        "Problem loading package.json, check 'rootDir' option. Tried '{}': {}: {}",
        root.display(),
        path.display(),
        source
    )]
    Parse {
        root: PathBuf,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Problem reading {}: {}", path.display(), source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("Failed to write {}: {}", path.display(), source)]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Two semantically disjoint ranges declared for the same module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub module_name: String,
    /// `[computed, override]`
    pub ranges: [String; 2],
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ('{}' vs '{}')",
            self.module_name, self.ranges[0], self.ranges[1]
        )
    }
}

/// Every conflict found in one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
    pub conflicts: Vec<ConflictRecord>,
}

impl ConflictError {
    pub fn module_names(&self) -> Vec<&str> {
        self.conflicts
            .iter()
            .map(|c| c.module_name.as_str())
            .collect()
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary: Vec<String> = self.conflicts.iter().map(|c| c.to_string()).collect();
        write!(
            f,
            "{} Semver conflicts between the package under test and testPackageJson: {}",
            CONFLICT_PREFIX,
            summary.join(", ")
        )
    }
}

impl std::error::Error for ConflictError {}
