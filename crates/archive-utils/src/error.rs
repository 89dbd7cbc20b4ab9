/// Base error type for ambient archive-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("unable to create temp file in '{dir}': {source}")]
    TempCreate {
        dir: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to persist temp file to '{path}': {source}")]
    Persist {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("another pack is already in progress in '{dir}'")]
    AlreadyLocked { dir: std::path::PathBuf },
}
