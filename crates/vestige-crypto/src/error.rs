//! Error types for cryptographic operations.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key missing or wrong length at startup.
    #[error("Key configuration error: {0}")]
    Config(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Envelope shorter than the fixed nonce + tag prefix.
    #[error("Envelope truncated: {0} bytes, need at least 28")]
    Truncated(usize),

    /// Authentication failed - data may be tampered or corrupted.
    /// Never returns partial plaintext.
    #[error("Authentication failed - data may be tampered")]
    Authentication,
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
