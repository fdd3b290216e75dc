//! # vestige-crypto
//!
//! Authenticated encryption for vestige artifacts at rest.
//!
//! Every artifact blob is sealed with AES-256-GCM under a single symmetric
//! key fixed for the process lifetime. The sealed envelope uses the binary
//! layout `nonce(12) ‖ tag(16) ‖ ciphertext(N)` with no version byte;
//! envelopes are bit-exact with already-stored data, so any future format
//! change requires re-encrypting all stored artifacts.

pub mod envelope;
pub mod error;

pub use envelope::{open, seal, EnvelopeKey, MIN_ENVELOPE_LEN, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, CryptoResult};
