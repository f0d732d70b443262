use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No free file name left for {0}")]
    CollisionExhausted(PathBuf),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Maps an IO error on `path`, turning `NotFound` into [`IndexError::NotFound`].
    pub fn from_io_at(path: &Path, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io(error)
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
