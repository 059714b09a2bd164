use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    Toml { path: PathBuf, source: toml::de::Error },
    InvalidConfig(String),
    Task(tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for I/O errors caused by a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            StoreError::Json { path, source } => {
                write!(f, "invalid frame JSON in {}: {source}", path.display())
            }
            StoreError::Toml { path, source } => {
                write!(f, "invalid config in {}: {source}", path.display())
            }
            StoreError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            StoreError::Task(e) => write!(f, "background task failed: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Json { source, .. } => Some(source),
            StoreError::Toml { source, .. } => Some(source),
            StoreError::Task(source) => Some(source),
            StoreError::InvalidConfig(_) => None,
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
