use std::path::PathBuf;

use thiserror::Error;

use crate::report::FileMode;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid report config: {0}")]
    Invalid(String),
    #[error("trajectory backend error: {0}")]
    Backend(String),
    #[error("this operation is only available when the file is open in mode \"{required}\"")]
    WrongMode { required: FileMode },
    #[error("reference file {0} does not exist")]
    MissingResource(PathBuf),
}

pub type ReportResult<T> = Result<T, ReportError>;
