//! Error types for kinescope-dl.

use thiserror::Error;

use crate::http::TransportError;

/// Main error type for download operations.
///
/// Every variant is fatal for the current download; the only retry in the
/// crate lives inside the segment fetcher.
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest could not be retrieved.
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    /// The manifest document is structurally invalid.
    #[error("Invalid manifest: {0}")]
    ManifestParse(String),

    /// The requested quality tier is not present in the manifest.
    #[error("Invalid resolution specified: {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// The license endpoint did not answer with a ClearKey key set.
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// A segment kept failing until the retry budget ran out.
    #[error("Failed to download segment {url} after {attempts} attempts")]
    SegmentDownload { url: String, attempts: u32 },

    /// An external executable could not be started.
    #[error("{tool} binary was not found at {path}")]
    ToolNotFound { tool: String, path: String },

    /// The decryption tool exited unsuccessfully.
    #[error("Decryption failed (exit code {code:?})")]
    DecryptionFailed { code: Option<i32> },

    /// The multiplexer exited unsuccessfully.
    #[error("Merging tracks failed (exit code {code:?})")]
    MuxFailed { code: Option<i32> },

    /// The input URL is not an absolute http(s) URL.
    #[error("Expected valid url. Got {0}")]
    InvalidUrl(String),

    /// The embed page does not exist or carries no video id.
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    /// The download was cancelled from outside.
    #[error("Download interrupted")]
    Interrupted,

    /// HTTP transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// Hex decode error.
    #[error("Hex decode error: {0}")]
    HexDecodeError(#[from] hex::FromHexError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for kinescope-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
