/// Errors produced by hash and blob-identity operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("unsupported hash format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hash length for format '{format}': expected {expected} bytes, got {actual}")]
    InvalidLength {
        format: String,
        expected: usize,
        actual: usize,
    },

    #[error("hash format id length {0} exceeds the maximum of 255 bytes")]
    FormatIdTooLong(usize),
}
