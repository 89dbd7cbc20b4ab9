pub mod error;
pub mod lockfile;
pub mod tempfile;

pub use error::UtilError;
pub use lockfile::PackLock;
pub use tempfile::AtomicFile;

pub type Result<T> = std::result::Result<T, UtilError>;
