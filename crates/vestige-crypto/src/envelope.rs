//! AES-256-GCM envelope seal and open.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Nonce length in bytes. Fresh random per seal, never reused for the key.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Smallest well-formed envelope: nonce + tag around an empty ciphertext.
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN + TAG_LEN;

/// Environment variable holding the base64-encoded 32-byte key.
pub const ENV_ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";

/// The single symmetric key for a deployment, loaded once at startup.
///
/// No rotation, no per-record derivation; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey([u8; 32]);

impl EnvelopeKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Decode a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Config(format!("invalid base64 key: {}", e)))?;

        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::Config(format!("key is {} bytes, need 32", v.len())))?;

        Ok(Self(bytes))
    }

    /// Load the key from `ENCRYPTION_KEY`. Fails fast when absent or
    /// malformed so a misconfigured deployment never starts.
    pub fn from_env() -> CryptoResult<Self> {
        let encoded = std::env::var(ENV_ENCRYPTION_KEY)
            .map_err(|_| CryptoError::Config(format!("{} not set", ENV_ENCRYPTION_KEY)))?;
        Self::from_base64(&encoded)
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Config(format!("invalid key: {}", e)))
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("EnvelopeKey(..)")
    }
}

/// Generate a random 12-byte nonce.
fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Seal plaintext into the envelope layout `nonce(12) ‖ tag(16) ‖ ciphertext`.
pub fn seal(key: &EnvelopeKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = key.cipher()?;
    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the tag to the ciphertext; the envelope layout wants
    // it up front, between nonce and ciphertext.
    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut envelope = Vec::with_capacity(MIN_ENVELOPE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(ciphertext);
    Ok(envelope)
}

/// Open an envelope, verifying the authentication tag during decryption.
///
/// Fails with `Truncated` for envelopes shorter than 28 bytes and with
/// `Authentication` when the tag does not verify. Never returns partial
/// plaintext.
pub fn open(key: &EnvelopeKey, envelope: &[u8]) -> CryptoResult<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::Truncated(envelope.len()));
    }

    let cipher = key.cipher()?;
    let nonce = Nonce::from_slice(&envelope[..NONCE_LEN]);
    let tag = &envelope[NONCE_LEN..MIN_ENVELOPE_LEN];
    let ciphertext = &envelope[MIN_ENVELOPE_LEN..];

    // Reassemble ciphertext ‖ tag, the layout aes-gcm decrypts.
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| CryptoError::Authentication)
}
