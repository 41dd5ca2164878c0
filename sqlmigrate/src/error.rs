use crate::core::Version;
use std::fmt;

/// The stage of a single script application that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    /// Reading the script content from its [ScriptSource](crate::ScriptSource).
    Read,
    /// Opening the transaction.
    Begin,
    /// Running the `before` callback.
    Before,
    /// Updating the version row or executing the script content.
    Run,
    /// Running the `after` callback.
    After,
    /// Committing the transaction.
    Commit,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            ApplyPhase::Read => "error reading script for version",
            ApplyPhase::Begin => "error beginning transaction for version",
            ApplyPhase::Before => "error in 'before' callback when applying version",
            ApplyPhase::Run => "error running migration",
            ApplyPhase::After => "error in 'after' callback when applying version",
            ApplyPhase::Commit => "error committing migration",
        };
        f.write_str(prefix)
    }
}

/// Error type for the sqlmigrate crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("illegal table name {0}, must match ^[\\w.]+$")]
    InvalidTableName(String),
    #[error("error finding version {0}")]
    VersionNotFound(String),
    #[error("script {0} not found")]
    ScriptNotFound(String),
    #[error("version table {0} has no version row")]
    MissingVersionRow(String),
    /// A script failed to apply. `version` is the version of the script itself.
    #[error("{phase} {version} from {script}: {source}")]
    Apply {
        phase: ApplyPhase,
        script: String,
        version: Version,
        #[source]
        source: Box<Error>,
    },
    /// Rolling back after `original` failed as well.
    #[error("error rolling back transaction after error (transaction error: {rollback}), original error: {original}")]
    Rollback {
        #[source]
        original: Box<Error>,
        rollback: Box<Error>,
    },
    #[error("panic: {0}")]
    Panic(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(#[from] mysql::Error),
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// The phase a failed script application stopped in, if this is an apply error.
    pub fn phase(&self) -> Option<ApplyPhase> {
        match self {
            Error::Apply { phase, .. } => Some(*phase),
            Error::Rollback { original, .. } => original.phase(),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Generic(value.to_string())
    }
}
