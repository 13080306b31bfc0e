use crate::config::schema::{RequestConfig, ValidationError};
use crate::driver::InjectionRequest;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    CodeFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read request file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse request TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse request TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid request ({}): {}", path.display(), source),
                None => write!(f, "invalid request: {}", source),
            },
            ConfigError::CodeFile { path, source } => {
                write!(f, "failed to read code_file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::CodeFile { source, .. } => Some(source),
        }
    }
}

/// A validated request plus the indexer settings it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRequest {
    pub request: InjectionRequest,
    pub strict: bool,
}

/// Parse and validate a request. Relative `file` and `code_file` paths are
/// resolved against `base_dir`.
pub fn load_from_str(input: &str, base_dir: &Path) -> Result<LoadedRequest, ConfigError> {
    let config: RequestConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    into_request(config, base_dir)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<LoadedRequest, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_from_str(&contents, base_dir).map_err(|error| error.with_path(path))
}

fn into_request(config: RequestConfig, base_dir: &Path) -> Result<LoadedRequest, ConfigError> {
    // Already validated, so the selector parses and one of code/code_file is set.
    let target = config.target().map_err(|e| ConfigError::Validation {
        path: None,
        source: ValidationError {
            issues: vec![crate::config::ValidationIssue::InvalidSelector {
                message: e.to_string(),
            }],
        },
    })?;

    let code = match (config.code, config.code_file) {
        (Some(code), _) => code,
        (None, Some(code_file)) => {
            let path = base_dir.join(code_file);
            fs::read_to_string(&path).map_err(|source| ConfigError::CodeFile { path, source })?
        }
        (None, None) => String::new(),
    };

    let request = InjectionRequest::new(base_dir.join(&config.file), target, code)
        .with_args(config.args)
        .definitions_only(config.definitions_only);

    Ok(LoadedRequest {
        request,
        strict: config.strict,
    })
}
