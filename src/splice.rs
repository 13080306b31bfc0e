use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Insertion of text at a byte offset of a file.
///
/// The file is read fresh on every [`Splice::apply`], split at `offset` into
/// prefix and suffix, and rewritten as `prefix + text + suffix`. Bytes on
/// either side of the offset are copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply() is called"]
pub struct Splice {
    pub file: PathBuf,
    pub offset: usize,
    pub text: String,
    /// xxh3 of the bytes the offset was computed against, if known.
    pub expected_fingerprint: Option<u64>,
}

#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("Offset {offset} is outside {file} (length {file_len})")]
    OffsetOutOfRange {
        file: PathBuf,
        offset: usize,
        file_len: usize,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target may have been partially replaced.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpliceResult {
    pub file: PathBuf,
    pub offset: usize,
    pub bytes_inserted: usize,
    /// False when the file changed between parsing and splicing.
    pub fingerprint_matched: bool,
}

impl Splice {
    pub fn new(file: impl Into<PathBuf>, offset: usize, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            offset,
            text: text.into(),
            expected_fingerprint: None,
        }
    }

    /// Warn if the file no longer hashes to `fingerprint` at splice time.
    pub fn with_fingerprint(mut self, fingerprint: Option<u64>) -> Self {
        self.expected_fingerprint = fingerprint;
        self
    }

    /// Build the spliced content without touching the file system.
    pub fn render(&self, source: &[u8]) -> Result<Vec<u8>, SpliceError> {
        if self.offset > source.len() {
            return Err(SpliceError::OffsetOutOfRange {
                file: self.file.clone(),
                offset: self.offset,
                file_len: source.len(),
            });
        }

        let (prefix, suffix) = source.split_at(self.offset);
        let mut out = Vec::with_capacity(source.len() + self.text.len());
        out.extend_from_slice(prefix);
        out.extend_from_slice(self.text.as_bytes());
        out.extend_from_slice(suffix);
        Ok(out)
    }

    /// Read the file, splice, and write the result back in full.
    ///
    /// Nothing is written when the offset is out of range.
    pub fn apply(&self) -> Result<SpliceResult, SpliceError> {
        let source = self.read()?;
        let fingerprint_matched = self.check_fingerprint(&source);
        let spliced = self.render(&source)?;

        write_replacing(&self.file, &spliced).map_err(|source| SpliceError::Write {
            path: self.file.clone(),
            source,
        })?;

        debug!(
            file = %self.file.display(),
            offset = self.offset,
            bytes = self.text.len(),
            "spliced"
        );

        Ok(SpliceResult {
            file: self.file.clone(),
            offset: self.offset,
            bytes_inserted: self.text.len(),
            fingerprint_matched,
        })
    }

    /// Read the current file content and return `(before, after)` without writing.
    pub fn preview(&self) -> Result<(Vec<u8>, Vec<u8>), SpliceError> {
        let source = self.read()?;
        self.check_fingerprint(&source);
        let spliced = self.render(&source)?;
        Ok((source, spliced))
    }

    fn read(&self) -> Result<Vec<u8>, SpliceError> {
        fs::read(&self.file).map_err(|source| SpliceError::Read {
            path: self.file.clone(),
            source,
        })
    }

    fn check_fingerprint(&self, source: &[u8]) -> bool {
        match self.expected_fingerprint {
            Some(expected) if expected != xxh3_64(source) => {
                warn!(
                    file = %self.file.display(),
                    "file changed since it was parsed; offset may be stale"
                );
                false
            }
            _ => true,
        }
    }
}

/// Replace `path` with `content`: tempfile in the same directory, fsync,
/// rename. The original file's permissions carry over.
fn write_replacing(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = fs::metadata(path)?.permissions();
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
