/// Error kinds shared by every cipher in the crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipherError {
    /// Channel count the cipher cannot process
    #[error("Unsupported pixel format: {channels} channel(s)")]
    UnsupportedFormat { channels: u8 },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The chaotic map left its chaotic regime. Ciphers only log this; the
    /// output is still deterministic.
    #[error("Degenerate chaotic sequence: {0}")]
    DegenerateSequence(String),

    #[error("Invalid image dimensions: {width}x{height}x{channels} does not hold {len} bytes")]
    InvalidDimensions {
        width: u32,
        height: u32,
        channels: u8,
        len: usize,
    },

    /// Raised only when the codec runs with `BlockFailurePolicy::Abort`
    #[error("Block {index} failed asymmetric decryption")]
    BlockFailure { index: usize },

    #[error("Asymmetric backend error: {0}")]
    Backend(String),
}

impl From<rsa::Error> for CipherError {
    fn from(err: rsa::Error) -> Self {
        CipherError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CipherError>;
