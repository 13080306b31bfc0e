use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to set Objective-C language for parser")]
    LanguageSet,

    #[error("failed to parse {path}")]
    ParseFailed { path: PathBuf },

    #[error("{count} syntax error(s) in {path}, first at byte {first}")]
    SyntaxErrors {
        path: PathBuf,
        count: usize,
        first: usize,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
