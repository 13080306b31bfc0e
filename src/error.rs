use crate::index::IndexError;
use crate::splice::SpliceError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way an injection run can fail. A run that matches nothing is not an
/// error; see [`crate::Outcome::NoMatch`].
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("parse failure: {0}")]
    Parse(#[from] IndexError),

    #[error("{target} at {file}:{line} has no body to inject into")]
    AnchorNotFound {
        target: String,
        file: PathBuf,
        line: usize,
    },

    #[error("anchor offset {offset} is outside {file} (length {file_len})")]
    OffsetOutOfRange {
        file: PathBuf,
        offset: usize,
        file_len: usize,
    },

    #[error("I/O failure: {0}")]
    Io(#[source] SpliceError),
}

impl InjectError {
    /// True only for a failed write, where the target may be partially replaced.
    pub fn may_have_modified_target(&self) -> bool {
        matches!(self, InjectError::Io(SpliceError::Write { .. }))
    }
}

impl From<SpliceError> for InjectError {
    fn from(error: SpliceError) -> Self {
        match error {
            SpliceError::OffsetOutOfRange {
                file,
                offset,
                file_len,
            } => InjectError::OffsetOutOfRange {
                file,
                offset,
                file_len,
            },
            other => InjectError::Io(other),
        }
    }
}
