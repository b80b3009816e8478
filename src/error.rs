//! Error type shared by every part of the loader.

/// Convenience alias used throughout the crate.
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Transport error fetching {url}: {message}")]
    Transport { url: String, message: String },
    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("Invalid base64 payload in data URL: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to compile module: {0}")]
    Compile(String),
    #[error("Failed to instantiate module: {0}")]
    Instantiate(String),
    #[error("Missing export: {0}")]
    MissingExport(String),
    #[error("WASM not loaded")]
    NotReady,
    #[error("Memory access out of bounds: offset {offset} + length {len} exceeds size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("Missing terminator: no zero byte between {ptr} and end of memory ({size} bytes)")]
    MissingTerminator { ptr: u32, size: u64 },
    #[error("Guest call to {export} failed: {message}")]
    Call { export: String, message: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LoaderError {
    /// Wrap an I/O error with the path it came from.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        LoaderError::Io { path: path.into(), source }
    }
}
