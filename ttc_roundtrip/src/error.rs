use std::{io, path::PathBuf, process::ExitStatus};

use fontcoll::verify::VerificationReport;
use thiserror::Error;

use crate::Stage;

#[derive(Debug, Error)]
pub enum Error {
    #[error("stopped at stage '{stage}': {source}")]
    StoppedAt {
        stage: Stage,
        #[source]
        source: StageError,
    },
    #[error("failed to load config '{path}': '{source}'")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no command given for the {0}")]
    EmptyCommand(&'static str),
    #[error("-o/--out names one file but {0} inputs were given; use -d/--output-dir")]
    OutForManyInputs(usize),
    #[error("failed to write json to '{path}': '{source}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to create scratch directory in '{path}': '{source}'")]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("bad artifact pattern: '{0}'")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Collection(#[from] fontcoll::Error),
}

/// Why a single stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to run '{command}': '{source}'")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("'{command}' failed ({status}): '{stderr}'")]
    ExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error(transparent)]
    Collection(#[from] fontcoll::Error),
    #[error("verification found {} problem(s)", .0.findings.len())]
    Verification(VerificationReport),
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    pub(crate) fn file_io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StageError {
        let path = path.into();
        move |source| StageError::FileIo { path, source }
    }
}
