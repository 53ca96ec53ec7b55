use std::io;
use std::path::PathBuf;

/// Errors raised while building or watching cached resources
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' is outside the resource root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("change source is already attached to a watcher")]
    SourceInUse,
}

impl ResourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;
