use thiserror::Error;

/// Error type covering every failure surface of the crate.
#[derive(Error, Debug)]
pub enum VidError {
    /// I/O failure while reading or writing media buffers
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bitstream or NAL-unit level parsing failure
    #[error("codec error: {0}")]
    Codec(String),

    /// Structurally invalid input (empty unit list, empty sample list, ...)
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Missing or inconsistent caller-supplied configuration (e.g. SPS/PPS)
    #[error("config error: {0}")]
    Config(String),

    /// Failure surfaced by the underlying media element
    #[error("media error: {0}")]
    Media(String),

    /// A bounded wait on the media element expired
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Convenience alias used by every fallible API in the crate.
pub type Result<T> = std::result::Result<T, VidError>;
