use std::path::PathBuf;

use fat83fs::FsError;

#[derive(thiserror::Error, Debug)]
pub enum CtlError {
    #[error("{path}: {source}")]
    Fs {
        path: String,
        #[source]
        source: FsError,
    },
    #[error("image {0} not found, run `fatctl format` first")]
    ImageNotFound(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Figment(#[from] figment::Error),
    #[error(transparent)]
    Other(#[from] FsError),
}

impl CtlError {
    /// Process exit status: the errno of a filesystem error, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CtlError::Fs { source, .. } | CtlError::Other(source) => source.errno(),
            _ => 1,
        }
    }
}

pub type CtlResult<T> = Result<T, CtlError>;

/// Attaches the path an operation was addressed to.
pub trait WithPath<T> {
    fn at(self, path: &str) -> CtlResult<T>;
}

impl<T> WithPath<T> for Result<T, FsError> {
    fn at(self, path: &str) -> CtlResult<T> {
        self.map_err(|source| CtlError::Fs {
            path: path.to_string(),
            source,
        })
    }
}
